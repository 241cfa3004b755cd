//! Shared value types for the marketplace order engine.

mod ids;
mod money;
mod role;
mod status;

pub use ids::{CartLineId, OrderId, OrderLineId, ProductId, UserId};
pub use money::Money;
pub use role::{ParseRoleError, Role};
pub use status::{OrderStatus, ParseStatusError};
