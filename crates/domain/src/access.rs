//! Role-based access decisions.
//!
//! Every order and cart operation asks [`can_perform`] before touching
//! storage. The decision depends only on the actor, the action and the owner
//! of the resource involved.

use std::fmt;

use common::{Role, UserId};
use serde::{Deserialize, Serialize};

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    /// A buyer with the default role.
    pub fn user(user_id: UserId) -> Self {
        Self::new(user_id, Role::User)
    }

    pub fn admin(user_id: UserId) -> Self {
        Self::new(user_id, Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Returns true if the actor is `owner`.
    pub fn owns(&self, owner: UserId) -> bool {
        self.user_id == owner
    }
}

/// Operations subject to an access decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    PlaceOrder,
    ViewOrder,
    ListAllOrders,
    CancelOrder,
    UpdateOrderStatus,
    ManageCart,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::PlaceOrder => "place_order",
            Action::ViewOrder => "view_order",
            Action::ListAllOrders => "list_all_orders",
            Action::CancelOrder => "cancel_order",
            Action::UpdateOrderStatus => "update_order_status",
            Action::ManageCart => "manage_cart",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What an action is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// The action has no single target (listing every order).
    None,
    Order { owner: UserId },
    Cart { owner: UserId },
}

/// Decides whether `actor` may perform `action` on `resource`.
///
/// - Any role may place an order from, and manage, its own cart.
/// - An order is visible to its owner and to admins.
/// - Only the owner may cancel an order.
/// - Listing every order and setting an order's status are admin-only.
pub fn can_perform(actor: &Actor, action: Action, resource: Resource) -> bool {
    match (action, resource) {
        (Action::PlaceOrder | Action::ManageCart, Resource::Cart { owner }) => actor.owns(owner),
        (Action::ViewOrder, Resource::Order { owner }) => actor.owns(owner) || actor.is_admin(),
        (Action::CancelOrder, Resource::Order { owner }) => actor.owns(owner),
        (Action::ListAllOrders | Action::UpdateOrderStatus, _) => actor.is_admin(),
        _ => false,
    }
}
