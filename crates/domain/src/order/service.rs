//! Order service providing a single entry point for order operations.

use std::collections::HashMap;

use serde::Serialize;
use store::{
    Order, OrderId, OrderQuery, OrderStore, Product, ProductId, ProductStore, Storage,
    Transaction,
};

use super::{OrderLifecycle, PlaceOrder, TransactionCoordinator};
use crate::access::{Action, Actor, Resource, can_perform};
use crate::error::DomainError;
use crate::transaction::finish;

/// An order together with the current state of the products it references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDetails {
    pub order: Order,
    /// Products referenced by the order's lines, read in the same transaction.
    pub products: Vec<Product>,
}

impl OrderDetails {
    pub fn new(order: Order, products: Vec<Product>) -> Self {
        Self { order, products }
    }

    /// Reads the order's products through `store`.
    pub(crate) async fn load<P>(store: &mut P, order: Order) -> Result<Self, DomainError>
    where
        P: ProductStore + ?Sized,
    {
        let products = store.get_products(&order.product_ids()).await?;
        Ok(Self::new(order, products))
    }

    /// Returns the product for a line, if it still exists.
    pub fn product(&self, id: ProductId) -> Option<&Product> {
        self.products.iter().find(|product| product.id == id)
    }
}

/// Service for managing orders.
///
/// Wraps the placement coordinator and the lifecycle, and adds the read side
/// with the same visibility rules.
#[derive(Debug, Clone)]
pub struct OrderService<S> {
    storage: S,
    coordinator: TransactionCoordinator<S>,
    lifecycle: OrderLifecycle<S>,
}

impl<S: Storage + Clone> OrderService<S> {
    /// Creates a new order service over the given storage.
    pub fn new(storage: S) -> Self {
        Self {
            coordinator: TransactionCoordinator::new(storage.clone()),
            lifecycle: OrderLifecycle::new(storage.clone()),
            storage,
        }
    }

    pub async fn place_order(
        &self,
        actor: &Actor,
        request: PlaceOrder,
    ) -> Result<OrderDetails, DomainError> {
        self.coordinator.place_order(actor, request).await
    }

    pub async fn cancel_order(
        &self,
        actor: &Actor,
        order_id: OrderId,
    ) -> Result<OrderDetails, DomainError> {
        self.lifecycle.cancel(actor, order_id).await
    }

    pub async fn update_status(
        &self,
        actor: &Actor,
        order_id: OrderId,
        status: &str,
    ) -> Result<OrderDetails, DomainError> {
        self.lifecycle.update_status(actor, order_id, status).await
    }

    /// Loads an order visible to the actor.
    ///
    /// An order the actor may not see is reported as not found.
    #[tracing::instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn get_order(
        &self,
        actor: &Actor,
        order_id: OrderId,
    ) -> Result<OrderDetails, DomainError> {
        let mut tx = self.storage.begin().await?;
        let result = get_within(tx.as_mut(), actor, order_id).await;
        finish(tx, result).await
    }

    /// Lists orders newest first.
    ///
    /// Non-admin actors only ever see their own orders, whatever owner the
    /// query names.
    #[tracing::instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn list_orders(
        &self,
        actor: &Actor,
        query: OrderQuery,
    ) -> Result<Vec<OrderDetails>, DomainError> {
        let query = if can_perform(actor, Action::ListAllOrders, Resource::None) {
            query
        } else {
            query.owned_by(actor.user_id)
        };

        let mut tx = self.storage.begin().await?;
        let result = list_within(tx.as_mut(), &query).await;
        finish(tx, result).await
    }
}

async fn get_within(
    tx: &mut dyn Transaction,
    actor: &Actor,
    order_id: OrderId,
) -> Result<OrderDetails, DomainError> {
    let order = tx
        .get_order(order_id)
        .await?
        .filter(|order| {
            let resource = Resource::Order {
                owner: order.user_id,
            };
            can_perform(actor, Action::ViewOrder, resource)
        })
        .ok_or_else(|| DomainError::not_found("Order", order_id))?;
    OrderDetails::load(tx, order).await
}

async fn list_within(
    tx: &mut dyn Transaction,
    query: &OrderQuery,
) -> Result<Vec<OrderDetails>, DomainError> {
    let orders = tx.list_orders(query).await?;

    let mut ids: Vec<ProductId> = Vec::new();
    for order in &orders {
        for id in order.product_ids() {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    let products: HashMap<ProductId, Product> = tx
        .get_products(&ids)
        .await?
        .into_iter()
        .map(|product| (product.id, product))
        .collect();

    Ok(orders
        .into_iter()
        .map(|order| {
            let referenced = order
                .product_ids()
                .iter()
                .filter_map(|id| products.get(id).cloned())
                .collect();
            OrderDetails::new(order, referenced)
        })
        .collect())
}
