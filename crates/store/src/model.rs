//! Records held by storage.
//!
//! Every record is fully built (identifier, timestamps, derived fields) by its
//! constructor before it is handed to a [`Transaction`](crate::Transaction);
//! storage backends never fill anything in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CartLineId, Money, OrderId, OrderLineId, OrderStatus, ProductId, UserId};

/// A product listing with its current price and stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub seller_id: UserId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Creates a new active product owned by `seller_id`.
    pub fn new(seller_id: UserId, name: impl Into<String>, price: Money, stock: u32) -> Self {
        let now = Utc::now();
        Self {
            id: ProductId::new(),
            seller_id,
            name: name.into(),
            description: String::new(),
            price,
            stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// A (user, product, quantity) line in a user's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: CartLineId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartLine {
    pub fn new(user_id: UserId, product_id: ProductId, quantity: u32) -> Self {
        let now = Utc::now();
        Self {
            id: CartLineId::new(),
            user_id,
            product_id,
            quantity,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the line with a new quantity and a fresh update timestamp.
    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self.updated_at = Utc::now();
        self
    }
}

/// A cart line together with the product it refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEntry {
    pub line: CartLine,
    pub product: Product,
}

/// Where an order is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingDetails {
    pub address: String,
    pub phone: String,
}

/// Immutable snapshot of a product, quantity and price taken when an order is placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub product_id: ProductId,
    pub quantity: u32,
    /// Unit price frozen at order-creation time.
    pub price: Money,
    /// Zero-based position of the line in the order.
    pub position: u32,
}

impl OrderLine {
    /// Snapshots the product's current price for `quantity` units.
    pub fn snapshot(product: &Product, quantity: u32, position: u32) -> Self {
        Self {
            id: OrderLineId::new(),
            product_id: product.id,
            quantity,
            price: product.price,
            position,
        }
    }

    /// Returns `price × quantity`, or `None` on overflow.
    pub fn subtotal(&self) -> Option<Money> {
        self.price.checked_multiply(self.quantity)
    }
}

/// A persisted order with its line snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub lines: Vec<OrderLine>,
    pub total: Money,
    pub status: OrderStatus,
    pub shipping: ShippingDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new pending order.
    ///
    /// `total` must equal the sum of the line subtotals; callers compute it
    /// with checked arithmetic before constructing the order.
    pub fn place(
        user_id: UserId,
        lines: Vec<OrderLine>,
        total: Money,
        shipping: ShippingDetails,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::new(),
            user_id,
            lines,
            total,
            status: OrderStatus::Pending,
            shipping,
            created_at: now,
            updated_at: now,
        }
    }

    /// Recomputes the total from the line snapshots.
    pub fn line_total(&self) -> Option<Money> {
        self.lines
            .iter()
            .try_fold(Money::zero(), |acc, line| acc.checked_add(line.subtotal()?))
    }

    /// Returns the product identifiers in line order, without duplicates.
    pub fn product_ids(&self) -> Vec<ProductId> {
        let mut ids = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            if !ids.contains(&line.product_id) {
                ids.push(line.product_id);
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shipping() -> ShippingDetails {
        ShippingDetails {
            address: "Jl. Merdeka 1".to_string(),
            phone: "0812".to_string(),
        }
    }

    #[test]
    fn snapshot_copies_current_price() {
        let mut product = Product::new(UserId::new(), "Widget", Money::from_cents(1000), 5);
        let line = OrderLine::snapshot(&product, 3, 0);
        product.price = Money::from_cents(2500);

        assert_eq!(line.price, Money::from_cents(1000));
        assert_eq!(line.subtotal(), Some(Money::from_cents(3000)));
    }

    #[test]
    fn placed_order_starts_pending() {
        let product = Product::new(UserId::new(), "Widget", Money::from_cents(1000), 5);
        let lines = vec![OrderLine::snapshot(&product, 2, 0)];
        let order = Order::place(UserId::new(), lines, Money::from_cents(2000), shipping());

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.line_total(), Some(order.total));
        assert_eq!(order.created_at, order.updated_at);
    }

    #[test]
    fn product_ids_are_deduplicated_in_order() {
        let a = Product::new(UserId::new(), "A", Money::from_cents(100), 5);
        let b = Product::new(UserId::new(), "B", Money::from_cents(100), 5);
        let lines = vec![
            OrderLine::snapshot(&b, 1, 0),
            OrderLine::snapshot(&a, 1, 1),
            OrderLine::snapshot(&b, 1, 2),
        ];
        let order = Order::place(UserId::new(), lines, Money::from_cents(300), shipping());

        assert_eq!(order.product_ids(), vec![b.id, a.id]);
    }

    #[test]
    fn cart_line_with_quantity_touches_timestamp() {
        let line = CartLine::new(UserId::new(), ProductId::new(), 1);
        let updated = line.clone().with_quantity(4);
        assert_eq!(updated.quantity, 4);
        assert_eq!(updated.id, line.id);
        assert!(updated.updated_at >= line.updated_at);
    }
}
