//! Order placement and inventory consistency for the marketplace.
//!
//! This crate provides:
//! - [`OrderService`]: placement, cancellation, status override and reads
//! - [`CartService`]: the cart that orders are placed from
//! - [`can_perform`]: the single access policy every operation consults
//!
//! All services are generic over a [`store::Storage`] handle and do every
//! multi-entity change in one storage transaction.

pub mod access;
pub mod cart;
pub mod error;
pub mod order;
mod transaction;

pub use access::{Action, Actor, Resource, can_perform};
pub use cart::{CartService, CartSummary};
pub use error::{DomainError, ErrorKind};
pub use order::{
    AssembledOrder, OrderAssembler, OrderDetails, OrderLifecycle, OrderService, PlaceOrder,
    StockGuard, StockRequest, TransactionCoordinator,
};
