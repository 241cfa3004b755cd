//! Builds order line snapshots from cart contents.

use store::{CartEntry, Money, OrderLine};

use crate::DomainError;

/// Order lines and the total computed from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledOrder {
    pub lines: Vec<OrderLine>,
    pub total: Money,
}

/// Turns cart entries into priced order lines.
pub struct OrderAssembler;

impl OrderAssembler {
    /// Snapshots each entry's current product price and sums
    /// `price × quantity` over the lines.
    ///
    /// Lines keep the cart's order. The total is exact; any overflow is
    /// reported rather than wrapped.
    pub fn assemble(entries: &[CartEntry]) -> Result<AssembledOrder, DomainError> {
        if entries.is_empty() {
            return Err(DomainError::EmptyCart);
        }

        let mut lines = Vec::with_capacity(entries.len());
        let mut total = Money::zero();
        for (entry, position) in entries.iter().zip(0u32..) {
            if entry.line.quantity == 0 {
                return Err(DomainError::InvalidQuantity {
                    product_id: entry.product.id,
                    quantity: 0,
                });
            }
            let line = OrderLine::snapshot(&entry.product, entry.line.quantity, position);
            total = line
                .subtotal()
                .and_then(|subtotal| total.checked_add(subtotal))
                .ok_or(DomainError::AmountOverflow)?;
            lines.push(line);
        }

        Ok(AssembledOrder { lines, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::{CartLine, Product, UserId};

    fn entry(price: i64, quantity: u32) -> CartEntry {
        let product = Product::new(UserId::new(), "Item", Money::from_cents(price), 100);
        CartEntry {
            line: CartLine::new(UserId::new(), product.id, quantity),
            product,
        }
    }

    #[test]
    fn total_is_sum_of_line_subtotals() {
        let entries = vec![entry(1000, 3), entry(250, 2)];

        let assembled = OrderAssembler::assemble(&entries).unwrap();

        assert_eq!(assembled.total, Money::from_cents(3500));
        assert_eq!(assembled.lines.len(), 2);
        assert_eq!(assembled.lines[0].price, Money::from_cents(1000));
        assert_eq!(assembled.lines[1].position, 1);
    }

    #[test]
    fn empty_cart_is_rejected() {
        let err = OrderAssembler::assemble(&[]).unwrap_err();
        assert!(matches!(err, DomainError::EmptyCart));
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let err = OrderAssembler::assemble(&[entry(100, 0)]).unwrap_err();
        assert!(matches!(err, DomainError::InvalidQuantity { quantity: 0, .. }));
    }

    #[test]
    fn overflow_is_reported() {
        let entries = vec![entry(i64::MAX, 1), entry(1, 1)];
        let err = OrderAssembler::assemble(&entries).unwrap_err();
        assert!(matches!(err, DomainError::AmountOverflow));

        let err = OrderAssembler::assemble(&[entry(i64::MAX / 2, 3)]).unwrap_err();
        assert!(matches!(err, DomainError::AmountOverflow));
    }

    #[test]
    fn later_price_change_does_not_alter_snapshot() {
        let mut entries = vec![entry(1000, 1)];
        let assembled = OrderAssembler::assemble(&entries).unwrap();
        entries[0].product.price = Money::from_cents(9999);

        assert_eq!(assembled.lines[0].price, Money::from_cents(1000));
        assert_eq!(assembled.total, Money::from_cents(1000));
    }
}
