//! HTTP handlers grouped by resource.

pub mod cart;
pub mod ops;
pub mod orders;

use domain::{CartService, OrderService};
use store::Storage;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub orders: OrderService<S>,
    pub cart: CartService<S>,
    pub storage: S,
}

impl<S: Storage + Clone> AppState<S> {
    pub fn new(storage: S) -> Self {
        Self {
            orders: OrderService::new(storage.clone()),
            cart: CartService::new(storage.clone()),
            storage,
        }
    }
}

/// Parses an identifier from a path segment or body field.
pub(crate) fn parse_id<T: std::str::FromStr>(field: &str, raw: &str) -> Result<T, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {field}: {raw}")))
}
