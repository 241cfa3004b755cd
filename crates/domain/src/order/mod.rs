//! Order placement, cancellation and status management.

mod assembler;
mod coordinator;
mod guard;
mod lifecycle;
mod service;

pub use assembler::{AssembledOrder, OrderAssembler};
pub use coordinator::{PlaceOrder, TransactionCoordinator};
pub use guard::{StockGuard, StockRequest};
pub use lifecycle::OrderLifecycle;
pub use service::{OrderDetails, OrderService};
