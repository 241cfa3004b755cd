//! Stock verification inside an open transaction.

use std::collections::BTreeMap;

use store::{CartEntry, ProductId, ProductStore};

use crate::DomainError;

/// Total quantity requested for one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Checks requested quantities against current stock.
///
/// The check only guarantees correctness when it runs in the same transaction
/// that later decrements the stock; the decrement itself refuses to go below
/// zero, so a stale read here can never cause an oversell.
pub struct StockGuard;

impl StockGuard {
    /// Sums the cart's quantities per product.
    pub fn requests(entries: &[CartEntry]) -> Vec<StockRequest> {
        Self::aggregate(
            entries
                .iter()
                .map(|entry| (entry.line.product_id, entry.line.quantity)),
        )
    }

    /// Sums quantities per product, sorted by product ID.
    ///
    /// Every stock write walks products in this order, so two transactions
    /// touching the same products lock their rows in the same sequence.
    pub fn aggregate(items: impl IntoIterator<Item = (ProductId, u32)>) -> Vec<StockRequest> {
        let mut totals: BTreeMap<ProductId, u32> = BTreeMap::new();
        for (product_id, quantity) in items {
            let total = totals.entry(product_id).or_insert(0);
            *total = total.saturating_add(quantity);
        }
        totals
            .into_iter()
            .map(|(product_id, quantity)| StockRequest {
                product_id,
                quantity,
            })
            .collect()
    }

    /// Fails on the first request whose product is missing or whose quantity
    /// is zero or above the product's current stock.
    pub async fn verify<P>(store: &mut P, requests: &[StockRequest]) -> Result<(), DomainError>
    where
        P: ProductStore + ?Sized,
    {
        for request in requests {
            if request.quantity == 0 {
                return Err(DomainError::InvalidQuantity {
                    product_id: request.product_id,
                    quantity: 0,
                });
            }

            let product = store
                .get_product(request.product_id)
                .await?
                .ok_or_else(|| DomainError::not_found("Product", request.product_id))?;

            if request.quantity > product.stock {
                return Err(DomainError::InsufficientStock {
                    product_id: product.id,
                    requested: request.quantity,
                    available: product.stock,
                });
            }
        }
        Ok(())
    }
}
