//! Transactional storage for products, carts and orders.
//!
//! Every read and write goes through a [`Transaction`] opened with
//! [`Storage::begin`]; writes become visible to other callers only when the
//! transaction commits.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod query;
pub mod store;

pub use common::{CartLineId, Money, OrderId, OrderLineId, OrderStatus, ProductId, UserId};
pub use error::{Result, StoreError};
pub use memory::{FailPoint, InMemoryStorage};
pub use model::{CartEntry, CartLine, Order, OrderLine, Product, ShippingDetails};
pub use postgres::PostgresStorage;
pub use query::OrderQuery;
pub use store::{CartStore, OrderStore, ProductStore, Storage, Transaction};
