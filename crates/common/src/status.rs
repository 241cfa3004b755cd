use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The status of an order in its lifecycle.
///
/// Transition graph:
/// ```text
/// Pending ──┬──► Processing ──┬──► Shipped ──► Delivered
///           │                 ├──────────────► Delivered
///           ├──► Shipped      └──► Cancelled
///           ├──► Delivered
///           └──► Cancelled
/// ```
/// `Delivered` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order placed, stock decremented, awaiting processing.
    #[default]
    Pending,

    /// Order is being prepared.
    Processing,

    /// Order has left the seller.
    Shipped,

    /// Order reached the buyer (terminal).
    Delivered,

    /// Order was cancelled (terminal).
    Cancelled,
}

/// Error returned when a string is not one of the enumerated statuses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown order status: {0}")]
pub struct ParseStatusError(pub String);

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    /// Returns true if the transition graph allows moving to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing | Shipped | Delivered | Cancelled)
                | (Processing, Shipped | Delivered | Cancelled)
                | (Shipped, Delivered)
        )
    }

    /// Returns true if the owning user may cancel from this status.
    pub fn is_owner_cancellable(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn pending_transitions() {
        let from = OrderStatus::Pending;
        assert!(!from.can_transition_to(OrderStatus::Pending));
        assert!(from.can_transition_to(OrderStatus::Processing));
        assert!(from.can_transition_to(OrderStatus::Shipped));
        assert!(from.can_transition_to(OrderStatus::Delivered));
        assert!(from.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn processing_transitions() {
        let from = OrderStatus::Processing;
        assert!(!from.can_transition_to(OrderStatus::Pending));
        assert!(from.can_transition_to(OrderStatus::Shipped));
        assert!(from.can_transition_to(OrderStatus::Delivered));
        assert!(from.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn shipped_only_moves_to_delivered() {
        let from = OrderStatus::Shipped;
        assert!(from.can_transition_to(OrderStatus::Delivered));
        assert!(!from.can_transition_to(OrderStatus::Cancelled));
        assert!(!from.can_transition_to(OrderStatus::Processing));
    }

    #[test]
    fn terminal_statuses_have_no_exits() {
        for terminal in [OrderStatus::Delivered, OrderStatus::Cancelled] {
            for next in OrderStatus::ALL {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn only_pending_is_owner_cancellable() {
        for status in OrderStatus::ALL {
            assert_eq!(
                status.is_owner_cancellable(),
                status == OrderStatus::Pending
            );
        }
    }

    #[test]
    fn parse_accepts_only_the_enumerated_set() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
        assert!("Pending".parse::<OrderStatus>().is_err());
        assert!("refunded".parse::<OrderStatus>().is_err());
        assert!("".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&OrderStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
    }
}
