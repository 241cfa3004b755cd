//! Atomic order placement.

use std::time::Instant;

use store::{
    CartStore, Order, OrderStore, ProductStore, ShippingDetails, Storage, Transaction, UserId,
};

use super::assembler::OrderAssembler;
use super::guard::StockGuard;
use super::service::OrderDetails;
use crate::access::{Action, Actor, Resource, can_perform};
use crate::error::{DomainError, ErrorKind};
use crate::transaction::finish;

/// Shipping fields submitted with a new order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceOrder {
    pub address: String,
    pub phone: String,
}

impl PlaceOrder {
    pub fn new(address: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            phone: phone.into(),
        }
    }

    /// Trims both fields and rejects blank ones.
    pub fn shipping_details(&self) -> Result<ShippingDetails, DomainError> {
        let address = self.address.trim();
        if address.is_empty() {
            return Err(DomainError::MissingField { field: "address" });
        }
        let phone = self.phone.trim();
        if phone.is_empty() {
            return Err(DomainError::MissingField { field: "phone" });
        }
        Ok(ShippingDetails {
            address: address.to_string(),
            phone: phone.to_string(),
        })
    }
}

/// Turns a user's cart into an order in one transaction.
///
/// Inside the transaction the coordinator reads the cart, checks stock,
/// snapshots prices, inserts the order, decrements stock per product in
/// product ID order and clears the cart. Any failure rolls all of it back.
#[derive(Debug, Clone)]
pub struct TransactionCoordinator<S> {
    storage: S,
}

impl<S: Storage> TransactionCoordinator<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Places an order from the actor's cart.
    #[tracing::instrument(skip(self, actor, request), fields(user_id = %actor.user_id))]
    pub async fn place_order(
        &self,
        actor: &Actor,
        request: PlaceOrder,
    ) -> Result<OrderDetails, DomainError> {
        let started = Instant::now();
        let result = self.try_place(actor, &request).await;

        match &result {
            Ok(details) => {
                metrics::counter!("orders_placed_total").increment(1);
                metrics::histogram!("order_placement_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::info!(
                    order_id = %details.order.id,
                    total = %details.order.total,
                    lines = details.order.lines.len(),
                    "order placed"
                );
            }
            Err(err) => {
                metrics::counter!("orders_rejected_total", "reason" => err.reason()).increment(1);
                if err.kind() == ErrorKind::Internal {
                    tracing::error!(error = %err, "order placement failed");
                } else {
                    tracing::info!(reason = err.reason(), error = %err, "order rejected");
                }
            }
        }
        result
    }

    async fn try_place(
        &self,
        actor: &Actor,
        request: &PlaceOrder,
    ) -> Result<OrderDetails, DomainError> {
        let cart = Resource::Cart {
            owner: actor.user_id,
        };
        if !can_perform(actor, Action::PlaceOrder, cart) {
            return Err(DomainError::Forbidden(Action::PlaceOrder));
        }
        let shipping = request.shipping_details()?;

        let mut tx = self.storage.begin().await?;
        let result = place_within(tx.as_mut(), actor.user_id, shipping).await;
        finish(tx, result).await
    }
}

async fn place_within(
    tx: &mut dyn Transaction,
    user_id: UserId,
    shipping: ShippingDetails,
) -> Result<OrderDetails, DomainError> {
    let entries = tx.list_cart(user_id).await?;
    if entries.is_empty() {
        return Err(DomainError::EmptyCart);
    }

    let requests = StockGuard::requests(&entries);
    StockGuard::verify(tx, &requests).await?;
    let assembled = OrderAssembler::assemble(&entries)?;
    let order = Order::place(user_id, assembled.lines, assembled.total, shipping);

    tx.insert_order(&order).await?;
    for request in &requests {
        let remaining = tx
            .adjust_stock(request.product_id, -i64::from(request.quantity))
            .await?;
        tracing::debug!(product_id = %request.product_id, remaining, "stock decremented");
    }
    tx.clear_cart(user_id).await?;

    OrderDetails::load(tx, order).await
}
