use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::{
    CartEntry, CartLine, CartLineId, Money, Order, OrderId, OrderQuery, OrderStatus, Product,
    ProductId, Result, StoreError, UserId,
    store::{CartStore, OrderStore, ProductStore, Storage, Transaction},
};

/// Operations that can be made to fail once, for exercising rollback paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    AdjustStock,
    InsertOrder,
    ClearCart,
    TransitionStatus,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    products: HashMap<ProductId, Product>,
    /// Insertion order is cart order.
    cart_lines: Vec<CartLine>,
    orders: Vec<Order>,
}

/// In-memory storage for tests and single-process deployments.
///
/// A transaction holds the only lock over all tables for its whole lifetime
/// and works on a private copy; commit swaps the copy in. Transactions are
/// therefore fully serialized.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    tables: Arc<AsyncMutex<Tables>>,
    fail_point: Arc<Mutex<Option<FailPoint>>>,
}

impl InMemoryStorage {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next call to `point` fail with `StoreError::Unavailable`.
    pub fn fail_on(&self, point: FailPoint) {
        *self
            .fail_point
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(point);
    }

    /// Inserts a product outside of any caller transaction.
    pub async fn insert_product(&self, product: Product) {
        self.tables
            .lock()
            .await
            .products
            .insert(product.id, product);
    }

    /// Returns the committed stock of a product.
    pub async fn stock_of(&self, id: ProductId) -> Option<u32> {
        self.tables.lock().await.products.get(&id).map(|p| p.stock)
    }

    /// Returns the number of committed cart lines for a user.
    pub async fn cart_len(&self, user_id: UserId) -> usize {
        self.tables
            .lock()
            .await
            .cart_lines
            .iter()
            .filter(|line| line.user_id == user_id)
            .count()
    }

    /// Returns the total number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.tables.lock().await.orders.len()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTransaction {
            guard,
            working,
            fail_point: self.fail_point.clone(),
        }))
    }
}

/// Transaction over [`InMemoryStorage`].
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
    fail_point: Arc<Mutex<Option<FailPoint>>>,
}

impl InMemoryTransaction {
    fn check(&self, point: FailPoint) -> Result<()> {
        let mut armed = self
            .fail_point
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *armed == Some(point) {
            *armed = None;
            return Err(StoreError::Unavailable(format!("{point:?} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl ProductStore for InMemoryTransaction {
    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.working.products.get(&id).cloned())
    }

    async fn get_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.working.products.get(id).cloned())
            .collect())
    }

    async fn insert_product(&mut self, product: &Product) -> Result<()> {
        self.working.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_price(&mut self, id: ProductId, price: Money) -> Result<()> {
        let product = self
            .working
            .products
            .get_mut(&id)
            .ok_or_else(|| product_not_found(id))?;
        product.price = price;
        product.updated_at = Utc::now();
        Ok(())
    }

    async fn adjust_stock(&mut self, id: ProductId, delta: i64) -> Result<u32> {
        self.check(FailPoint::AdjustStock)?;

        let product = self
            .working
            .products
            .get_mut(&id)
            .ok_or_else(|| product_not_found(id))?;

        let next = i64::from(product.stock) + delta;
        if next < 0 {
            return Err(StoreError::InsufficientStock {
                product_id: id,
                requested: u32::try_from(delta.unsigned_abs()).unwrap_or(u32::MAX),
                available: product.stock,
            });
        }

        product.stock = u32::try_from(next)
            .map_err(|_| StoreError::OutOfRange(format!("stock {next} for product {id}")))?;
        product.updated_at = Utc::now();
        Ok(product.stock)
    }
}

#[async_trait]
impl CartStore for InMemoryTransaction {
    async fn list_cart(&mut self, user_id: UserId) -> Result<Vec<CartEntry>> {
        self.working
            .cart_lines
            .iter()
            .filter(|line| line.user_id == user_id)
            .map(|line| {
                let product = self
                    .working
                    .products
                    .get(&line.product_id)
                    .cloned()
                    .ok_or_else(|| {
                        StoreError::Corrupt(format!(
                            "cart line {} refers to missing product {}",
                            line.id, line.product_id
                        ))
                    })?;
                Ok(CartEntry {
                    line: line.clone(),
                    product,
                })
            })
            .collect()
    }

    async fn merge_cart_line(&mut self, line: &CartLine) -> Result<CartLine> {
        let existing = self
            .working
            .cart_lines
            .iter_mut()
            .find(|existing| {
                existing.user_id == line.user_id && existing.product_id == line.product_id
            });

        match existing {
            Some(existing) => {
                existing.quantity =
                    existing.quantity.checked_add(line.quantity).ok_or_else(|| {
                        StoreError::OutOfRange(format!("quantity for product {}", line.product_id))
                    })?;
                existing.updated_at = line.updated_at;
                Ok(existing.clone())
            }
            None => {
                self.working.cart_lines.push(line.clone());
                Ok(line.clone())
            }
        }
    }

    async fn get_cart_line(
        &mut self,
        user_id: UserId,
        id: CartLineId,
    ) -> Result<Option<CartLine>> {
        Ok(self
            .working
            .cart_lines
            .iter()
            .find(|line| line.id == id && line.user_id == user_id)
            .cloned())
    }

    async fn save_cart_line(&mut self, line: &CartLine) -> Result<()> {
        if let Some(existing) = self
            .working
            .cart_lines
            .iter_mut()
            .find(|existing| existing.id == line.id)
        {
            existing.quantity = line.quantity;
            existing.updated_at = line.updated_at;
            return Ok(());
        }

        // Mirrors the (user_id, product_id) unique constraint.
        if self
            .working
            .cart_lines
            .iter()
            .any(|existing| existing.user_id == line.user_id && existing.product_id == line.product_id)
        {
            return Err(StoreError::Conflict(format!(
                "duplicate cart line for product {}",
                line.product_id
            )));
        }

        self.working.cart_lines.push(line.clone());
        Ok(())
    }

    async fn delete_cart_line(&mut self, user_id: UserId, id: CartLineId) -> Result<bool> {
        let before = self.working.cart_lines.len();
        self.working
            .cart_lines
            .retain(|line| !(line.id == id && line.user_id == user_id));
        Ok(self.working.cart_lines.len() != before)
    }

    async fn clear_cart(&mut self, user_id: UserId) -> Result<u64> {
        self.check(FailPoint::ClearCart)?;

        let before = self.working.cart_lines.len();
        self.working
            .cart_lines
            .retain(|line| line.user_id != user_id);
        Ok((before - self.working.cart_lines.len()) as u64)
    }
}

#[async_trait]
impl OrderStore for InMemoryTransaction {
    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        self.check(FailPoint::InsertOrder)?;

        for line in &order.lines {
            if !self.working.products.contains_key(&line.product_id) {
                return Err(product_not_found(line.product_id));
            }
        }
        self.working.orders.push(order.clone());
        Ok(())
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self
            .working
            .orders
            .iter()
            .find(|order| order.id == id)
            .cloned())
    }

    async fn list_orders(&mut self, query: &OrderQuery) -> Result<Vec<Order>> {
        let mut orders: Vec<_> = self
            .working
            .orders
            .iter()
            .filter(|order| query.matches(order))
            .cloned()
            .collect();

        // Newest first; ties keep reverse insertion order.
        orders.reverse();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let offset = query.offset.unwrap_or(0);
        let orders = orders.into_iter().skip(offset);
        Ok(match query.limit {
            Some(limit) => orders.take(limit).collect(),
            None => orders.collect(),
        })
    }

    async fn transition_status(
        &mut self,
        id: OrderId,
        expected: Option<OrderStatus>,
        next: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        self.check(FailPoint::TransitionStatus)?;

        let Some(order) = self.working.orders.iter_mut().find(|order| order.id == id) else {
            return Ok(false);
        };
        if let Some(expected) = expected
            && order.status != expected
        {
            return Ok(false);
        }
        order.status = next;
        order.updated_at = at;
        Ok(true)
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.check(FailPoint::Commit)?;

        let InMemoryTransaction {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

fn product_not_found(id: ProductId) -> StoreError {
    StoreError::NotFound {
        entity: "Product",
        id: id.to_string(),
    }
}
