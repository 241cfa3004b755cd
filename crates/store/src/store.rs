use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    CartEntry, CartLine, CartLineId, Money, Order, OrderId, OrderQuery, OrderStatus, Product,
    ProductId, Result, UserId,
};

/// Product reads and stock mutation.
#[async_trait]
pub trait ProductStore: Send {
    /// Loads a product by ID.
    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>>;

    /// Loads several products. Missing IDs are skipped; order is unspecified.
    async fn get_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>>;

    /// Inserts a new product.
    async fn insert_product(&mut self, product: &Product) -> Result<()>;

    /// Replaces a product's current price. Existing order lines are unaffected.
    async fn update_price(&mut self, id: ProductId, price: Money) -> Result<()>;

    /// Applies `delta` to the product's stock as one conditional update.
    ///
    /// The update is refused with `InsufficientStock` if the result would be
    /// negative, and with `NotFound` if the product does not exist. There is
    /// no separate read: concurrent callers cannot jointly drive stock below
    /// zero. Returns the new stock.
    async fn adjust_stock(&mut self, id: ProductId, delta: i64) -> Result<u32>;
}

/// A user's cart lines.
#[async_trait]
pub trait CartStore: Send {
    /// Lists the user's cart lines with their products, in insertion order.
    async fn list_cart(&mut self, user_id: UserId) -> Result<Vec<CartEntry>>;

    /// Adds `line` to the user's cart in one statement.
    ///
    /// If the user already has a line for the product, its quantity grows by
    /// `line.quantity` and the existing line keeps its ID. Concurrent merges
    /// for the same product compose. Returns the stored line.
    async fn merge_cart_line(&mut self, line: &CartLine) -> Result<CartLine>;

    /// Loads a line by ID, only if it belongs to `user_id`.
    async fn get_cart_line(&mut self, user_id: UserId, id: CartLineId)
    -> Result<Option<CartLine>>;

    /// Inserts the line, or updates its quantity if the ID already exists.
    async fn save_cart_line(&mut self, line: &CartLine) -> Result<()>;

    /// Deletes a line owned by `user_id`. Returns false if there was none.
    async fn delete_cart_line(&mut self, user_id: UserId, id: CartLineId) -> Result<bool>;

    /// Deletes every line of the user's cart. Returns the number removed.
    async fn clear_cart(&mut self, user_id: UserId) -> Result<u64>;
}

/// Orders and their line snapshots.
#[async_trait]
pub trait OrderStore: Send {
    /// Inserts an order together with all of its lines.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Loads an order with its lines in position order.
    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Lists orders matching `query`, newest first.
    async fn list_orders(&mut self, query: &OrderQuery) -> Result<Vec<Order>>;

    /// Sets the order's status.
    ///
    /// With `expected = Some(s)` this is a compare-and-set: the status is only
    /// changed if it is currently `s`, and the return value says whether it
    /// was. With `expected = None` the status is set unconditionally and the
    /// return value says whether the order exists.
    async fn transition_status(
        &mut self,
        id: OrderId,
        expected: Option<OrderStatus>,
        next: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<bool>;
}

/// An open unit of work spanning products, carts and orders.
///
/// Either every write made through the transaction becomes visible at
/// [`commit`](Transaction::commit), or none does. Dropping a transaction
/// without committing discards its writes.
#[async_trait]
pub trait Transaction: ProductStore + CartStore + OrderStore {
    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Storage handle. Implementations are cheap to clone and share one backend.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Opens a new transaction.
    async fn begin(&self) -> Result<Box<dyn Transaction>>;
}
