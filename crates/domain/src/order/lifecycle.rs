//! Status transitions after an order exists.

use chrono::Utc;
use store::{OrderId, OrderStatus, OrderStore, ProductStore, Storage, Transaction};

use super::guard::StockGuard;
use super::service::OrderDetails;
use crate::access::{Action, Actor, Resource, can_perform};
use crate::error::DomainError;
use crate::transaction::finish;

/// Owner cancellation and the administrative status override.
///
/// Cancellation follows the transition graph and gives stock back. The
/// override accepts any status and never touches stock.
#[derive(Debug, Clone)]
pub struct OrderLifecycle<S> {
    storage: S,
}

impl<S: Storage> OrderLifecycle<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Cancels a pending order and restores the stock of every line.
    #[tracing::instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn cancel(
        &self,
        actor: &Actor,
        order_id: OrderId,
    ) -> Result<OrderDetails, DomainError> {
        let mut tx = self.storage.begin().await?;
        let result = cancel_within(tx.as_mut(), actor, order_id).await;
        let details = finish(tx, result).await?;

        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(lines = details.order.lines.len(), "order cancelled");
        Ok(details)
    }

    /// Sets any status from the enumerated set.
    ///
    /// Moves outside the transition graph are applied as requested. Moving
    /// into `cancelled` this way leaves stock as it is.
    #[tracing::instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn update_status(
        &self,
        actor: &Actor,
        order_id: OrderId,
        status: &str,
    ) -> Result<OrderDetails, DomainError> {
        if !can_perform(actor, Action::UpdateOrderStatus, Resource::None) {
            return Err(DomainError::Forbidden(Action::UpdateOrderStatus));
        }
        let next: OrderStatus = status
            .trim()
            .parse()
            .map_err(|_| DomainError::InvalidStatus(status.to_string()))?;

        let mut tx = self.storage.begin().await?;
        let result = override_within(tx.as_mut(), order_id, next).await;
        let (previous, details) = finish(tx, result).await?;

        metrics::counter!("order_status_overrides_total").increment(1);
        let graph_violation = previous != next && !previous.can_transition_to(next);
        if graph_violation || (next == OrderStatus::Cancelled && previous != next) {
            tracing::warn!(
                from = %previous,
                to = %next,
                graph_violation,
                stock_restored = false,
                "order status overridden"
            );
        } else {
            tracing::info!(from = %previous, to = %next, "order status updated");
        }
        Ok(details)
    }
}

async fn cancel_within(
    tx: &mut dyn Transaction,
    actor: &Actor,
    order_id: OrderId,
) -> Result<OrderDetails, DomainError> {
    let mut order = tx
        .get_order(order_id)
        .await?
        .filter(|order| {
            let resource = Resource::Order {
                owner: order.user_id,
            };
            can_perform(actor, Action::ViewOrder, resource)
        })
        .ok_or_else(|| DomainError::not_found("Order", order_id))?;

    let resource = Resource::Order {
        owner: order.user_id,
    };
    if !can_perform(actor, Action::CancelOrder, resource) {
        return Err(DomainError::Forbidden(Action::CancelOrder));
    }
    if !order.status.is_owner_cancellable() {
        return Err(DomainError::InvalidTransition {
            from: order.status,
            to: OrderStatus::Cancelled,
        });
    }

    // Flip before restoring: only the caller that wins the flip restores.
    let now = Utc::now();
    let flipped = tx
        .transition_status(
            order_id,
            Some(OrderStatus::Pending),
            OrderStatus::Cancelled,
            now,
        )
        .await?;
    if !flipped {
        let current = tx
            .get_order(order_id)
            .await?
            .map(|order| order.status)
            .ok_or_else(|| DomainError::not_found("Order", order_id))?;
        return Err(DomainError::InvalidTransition {
            from: current,
            to: OrderStatus::Cancelled,
        });
    }

    let lines = order.lines.iter().map(|l| (l.product_id, l.quantity));
    for request in StockGuard::aggregate(lines) {
        let restored = tx
            .adjust_stock(request.product_id, i64::from(request.quantity))
            .await?;
        tracing::debug!(product_id = %request.product_id, restored, "stock restored");
    }

    order.status = OrderStatus::Cancelled;
    order.updated_at = now;
    OrderDetails::load(tx, order).await
}

async fn override_within(
    tx: &mut dyn Transaction,
    order_id: OrderId,
    next: OrderStatus,
) -> Result<(OrderStatus, OrderDetails), DomainError> {
    let mut order = tx
        .get_order(order_id)
        .await?
        .ok_or_else(|| DomainError::not_found("Order", order_id))?;
    let previous = order.status;

    let now = Utc::now();
    if !tx.transition_status(order_id, None, next, now).await? {
        return Err(DomainError::not_found("Order", order_id));
    }

    order.status = next;
    order.updated_at = now;
    let details = OrderDetails::load(tx, order).await?;
    Ok((previous, details))
}
