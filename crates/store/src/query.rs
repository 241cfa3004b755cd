use crate::{Order, OrderStatus, UserId};

/// Filter for listing orders. Results are always newest first.
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    /// Restrict to orders owned by this user.
    pub user_id: Option<UserId>,
    /// Restrict to orders in this status.
    pub status: Option<OrderStatus>,
    /// Maximum number of orders to return.
    pub limit: Option<usize>,
    /// Number of orders to skip.
    pub offset: Option<usize>,
}

impl OrderQuery {
    /// Creates an unfiltered query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the query to one owner.
    pub fn owned_by(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Restricts the query to one status.
    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if `order` passes the owner and status filters.
    pub fn matches(&self, order: &Order) -> bool {
        if let Some(user_id) = self.user_id
            && order.user_id != user_id
        {
            return false;
        }
        if let Some(status) = self.status
            && order.status != status
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Money, ShippingDetails};

    fn order_for(user_id: UserId) -> Order {
        Order::place(
            user_id,
            Vec::new(),
            Money::zero(),
            ShippingDetails {
                address: "a".to_string(),
                phone: "p".to_string(),
            },
        )
    }

    #[test]
    fn builder_sets_fields() {
        let user = UserId::new();
        let query = OrderQuery::new()
            .owned_by(user)
            .status(OrderStatus::Shipped)
            .limit(10)
            .offset(5);

        assert_eq!(query.user_id, Some(user));
        assert_eq!(query.status, Some(OrderStatus::Shipped));
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.offset, Some(5));
    }

    #[test]
    fn matches_owner_and_status() {
        let user = UserId::new();
        let order = order_for(user);

        assert!(OrderQuery::new().matches(&order));
        assert!(OrderQuery::new().owned_by(user).matches(&order));
        assert!(!OrderQuery::new().owned_by(UserId::new()).matches(&order));
        assert!(
            OrderQuery::new()
                .status(OrderStatus::Pending)
                .matches(&order)
        );
        assert!(
            !OrderQuery::new()
                .status(OrderStatus::Cancelled)
                .matches(&order)
        );
    }
}
