//! Order placement, lookup, cancellation and status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use domain::{DomainError, OrderDetails, PlaceOrder};
use serde::{Deserialize, Serialize};
use store::{OrderId, OrderQuery, OrderStatus, Product, Storage};

use super::{AppState, parse_id};
use crate::auth::Authenticated;
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersParams {
    pub status: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ListOrdersParams {
    fn into_query(self) -> Result<OrderQuery, ApiError> {
        let mut query = OrderQuery::new();
        if let Some(raw) = self.status.filter(|s| !s.trim().is_empty()) {
            let status = raw
                .trim()
                .parse::<OrderStatus>()
                .map_err(|_| DomainError::InvalidStatus(raw.clone()))?;
            query = query.status(status);
        }
        if let Some(limit) = self.limit {
            query = query.limit(page_bound("limit", limit)?);
        }
        if let Some(offset) = self.offset {
            query = query.offset(page_bound("offset", offset)?);
        }
        Ok(query)
    }
}

/// Paging values must fit a signed 64-bit SQL integer.
fn page_bound(name: &str, value: usize) -> Result<usize, ApiError> {
    if i64::try_from(value).is_ok() {
        Ok(value)
    } else {
        Err(ApiError::BadRequest(format!("{name} out of range: {value}")))
    }
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub seller_id: String,
    pub name: String,
    pub price_cents: i64,
    pub stock: u32,
    pub is_active: bool,
}

impl From<&Product> for ProductResponse {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.to_string(),
            seller_id: product.seller_id.to_string(),
            name: product.name.clone(),
            price_cents: product.price.cents(),
            stock: product.stock,
            is_active: product.is_active,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderItemResponse {
    pub id: String,
    pub product_id: String,
    pub quantity: u32,
    pub price_cents: i64,
    pub product: Option<ProductResponse>,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub status: OrderStatus,
    pub address: String,
    pub phone: String,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
}

impl From<OrderDetails> for OrderResponse {
    fn from(details: OrderDetails) -> Self {
        let items = details
            .order
            .lines
            .iter()
            .map(|line| OrderItemResponse {
                id: line.id.to_string(),
                product_id: line.product_id.to_string(),
                quantity: line.quantity,
                price_cents: line.price.cents(),
                product: details.product(line.product_id).map(ProductResponse::from),
            })
            .collect();

        let order = details.order;
        Self {
            id: order.id.to_string(),
            user_id: order.user_id.to_string(),
            status: order.status,
            address: order.shipping.address,
            phone: order.shipping.phone,
            total_cents: order.total.cents(),
            created_at: order.created_at,
            updated_at: order.updated_at,
            items,
        }
    }
}

// -- Handlers --

/// POST /orders: place an order from the caller's cart.
#[tracing::instrument(skip(state, req), fields(user_id = %actor.user_id))]
pub async fn create<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(actor): Authenticated,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let details = state
        .orders
        .place_order(&actor, PlaceOrder::new(req.address, req.phone))
        .await?;
    Ok((StatusCode::CREATED, Json(details.into())))
}

/// GET /orders: the caller's orders, or every order for an admin.
#[tracing::instrument(skip(state, params), fields(user_id = %actor.user_id))]
pub async fn list<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(actor): Authenticated,
    Query(params): Query<ListOrdersParams>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let query = params.into_query()?;
    let orders = state.orders.list_orders(&actor, query).await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state), fields(user_id = %actor.user_id))]
pub async fn get<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(actor): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id("order id", &id)?;
    let details = state.orders.get_order(&actor, order_id).await?;
    Ok(Json(details.into()))
}

/// PUT /orders/{id}/cancel: owner cancellation of a pending order.
#[tracing::instrument(skip(state), fields(user_id = %actor.user_id))]
pub async fn cancel<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(actor): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id("order id", &id)?;
    let details = state.orders.cancel_order(&actor, order_id).await?;
    Ok(Json(details.into()))
}

/// PUT /orders/{id}/status: administrative status override.
#[tracing::instrument(skip(state, req), fields(user_id = %actor.user_id))]
pub async fn update_status<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(actor): Authenticated,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id("order id", &id)?;
    let details = state
        .orders
        .update_status(&actor, order_id, &req.status)
        .await?;
    Ok(Json(details.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_params_parse_status() {
        let params = ListOrdersParams {
            status: Some("shipped".to_string()),
            limit: Some(5),
            offset: None,
        };
        let query = params.into_query().unwrap();
        assert_eq!(query.status, Some(OrderStatus::Shipped));
        assert_eq!(query.limit, Some(5));
    }

    #[test]
    fn list_params_reject_unknown_status() {
        let params = ListOrdersParams {
            status: Some("teleported".to_string()),
            ..ListOrdersParams::default()
        };
        assert!(matches!(
            params.into_query(),
            Err(ApiError::Domain(DomainError::InvalidStatus(_)))
        ));
    }

    #[test]
    fn list_params_reject_oversized_paging() {
        let params = ListOrdersParams {
            limit: Some(usize::MAX),
            ..ListOrdersParams::default()
        };
        assert!(matches!(params.into_query(), Err(ApiError::BadRequest(_))));

        let params = ListOrdersParams {
            offset: Some(usize::MAX),
            ..ListOrdersParams::default()
        };
        assert!(matches!(params.into_query(), Err(ApiError::BadRequest(_))));
    }
}
