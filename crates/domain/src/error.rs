//! Domain error types.

use common::{OrderStatus, ProductId};
use store::StoreError;
use thiserror::Error;

use crate::access::Action;

/// Errors returned by the order and cart workflows.
///
/// Every error is returned before any write is committed; see [`ErrorKind`]
/// for how callers should treat each variant.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A required request field was missing or blank.
    #[error("{field} is required")]
    MissingField { field: &'static str },

    /// An order was requested from an empty cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// A quantity was not positive or did not fit.
    #[error("Invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: ProductId, quantity: i64 },

    /// A status outside the enumerated set.
    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    /// A total did not fit the money representation.
    #[error("Amount overflow while computing total")]
    AmountOverflow,

    /// Requested quantity exceeds the product's available stock.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// The order's current status does not allow the requested transition.
    #[error("Invalid transition: cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The product exists but is not listed for sale.
    #[error("Product {0} is not available")]
    ProductUnavailable(ProductId),

    /// The actor's role does not allow the action.
    #[error("Not permitted: {0}")]
    Forbidden(Action),

    /// The resource does not exist or is not visible to the actor.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Storage failed; the whole operation was rolled back.
    #[error("Storage error: {0}")]
    Store(StoreError),
}

/// Classification of [`DomainError`] for callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any side effect; the caller can correct the request.
    Validation,
    /// Rejected because of current state (stock, status); the caller may refresh and retry.
    Conflict,
    /// The actor may not perform the action.
    Authorization,
    NotFound,
    /// Storage failure; nothing was persisted and the caller may retry.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Authorization => "authorization",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Internal => "internal",
        }
    }
}

impl DomainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::MissingField { .. }
            | DomainError::EmptyCart
            | DomainError::InvalidQuantity { .. }
            | DomainError::InvalidStatus(_)
            | DomainError::AmountOverflow => ErrorKind::Validation,
            DomainError::InsufficientStock { .. }
            | DomainError::InvalidTransition { .. }
            | DomainError::ProductUnavailable(_) => ErrorKind::Conflict,
            DomainError::Forbidden(_) => ErrorKind::Authorization,
            DomainError::NotFound { .. } => ErrorKind::NotFound,
            DomainError::Store(_) => ErrorKind::Internal,
        }
    }

    /// Short label used as a metrics tag.
    pub fn reason(&self) -> &'static str {
        match self {
            DomainError::MissingField { .. } => "missing_field",
            DomainError::EmptyCart => "empty_cart",
            DomainError::InvalidQuantity { .. } => "invalid_quantity",
            DomainError::InvalidStatus(_) => "invalid_status",
            DomainError::AmountOverflow => "amount_overflow",
            DomainError::InsufficientStock { .. } => "insufficient_stock",
            DomainError::InvalidTransition { .. } => "invalid_transition",
            DomainError::ProductUnavailable(_) => "product_unavailable",
            DomainError::Forbidden(_) => "forbidden",
            DomainError::NotFound { .. } => "not_found",
            DomainError::Store(_) => "storage",
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InsufficientStock {
                product_id,
                requested,
                available,
            } => DomainError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            StoreError::NotFound { entity, id } => DomainError::NotFound { entity, id },
            other => DomainError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_stock_refusal_becomes_conflict() {
        let product_id = ProductId::new();
        let err = DomainError::from(StoreError::InsufficientStock {
            product_id,
            requested: 2,
            available: 1,
        });
        assert!(matches!(
            err,
            DomainError::InsufficientStock {
                requested: 2,
                available: 1,
                ..
            }
        ));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn store_failure_is_internal() {
        let err = DomainError::from(StoreError::Unavailable("down".to_string()));
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.reason(), "storage");
    }

    #[test]
    fn kinds() {
        assert_eq!(DomainError::EmptyCart.kind(), ErrorKind::Validation);
        assert_eq!(
            DomainError::InvalidTransition {
                from: OrderStatus::Shipped,
                to: OrderStatus::Cancelled,
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            DomainError::Forbidden(Action::UpdateOrderStatus).kind(),
            ErrorKind::Authorization
        );
        assert_eq!(
            DomainError::not_found("Order", "x").kind(),
            ErrorKind::NotFound
        );
    }
}
