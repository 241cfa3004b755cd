//! Cart endpoints for the calling user.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::CartSummary;
use serde::{Deserialize, Serialize};
use store::{CartEntry, CartLineId, ProductId, Storage};

use super::orders::ProductResponse;
use super::{AppState, parse_id};
use crate::auth::Authenticated;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: String,
    /// Missing or non-positive means one.
    #[serde(default)]
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

#[derive(Debug, Serialize)]
pub struct CartItemResponse {
    pub id: String,
    pub product_id: String,
    pub quantity: u32,
    pub product: ProductResponse,
}

impl From<&CartEntry> for CartItemResponse {
    fn from(entry: &CartEntry) -> Self {
        Self {
            id: entry.line.id.to_string(),
            product_id: entry.line.product_id.to_string(),
            quantity: entry.line.quantity,
            product: ProductResponse::from(&entry.product),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub items: Vec<CartItemResponse>,
    pub total_cents: i64,
}

impl From<CartSummary> for CartResponse {
    fn from(summary: CartSummary) -> Self {
        Self {
            items: summary.entries.iter().map(CartItemResponse::from).collect(),
            total_cents: summary.total.cents(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ClearCartResponse {
    pub removed: u64,
}

/// GET /cart
#[tracing::instrument(skip(state), fields(user_id = %actor.user_id))]
pub async fn get<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(actor): Authenticated,
) -> Result<Json<CartResponse>, ApiError> {
    let summary = state.cart.get_cart(&actor).await?;
    Ok(Json(summary.into()))
}

/// POST /cart: add a product or increase its quantity.
#[tracing::instrument(skip(state, req), fields(user_id = %actor.user_id))]
pub async fn add<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(actor): Authenticated,
    Json(req): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<CartItemResponse>), ApiError> {
    let product_id: ProductId = parse_id("product_id", &req.product_id)?;
    let entry = state
        .cart
        .add_to_cart(&actor, product_id, req.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(CartItemResponse::from(&entry))))
}

/// PUT /cart/{id}: set a line's quantity; zero or less removes it.
#[tracing::instrument(skip(state, req), fields(user_id = %actor.user_id))]
pub async fn update<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(actor): Authenticated,
    Path(id): Path<String>,
    Json(req): Json<UpdateQuantityRequest>,
) -> Result<Response, ApiError> {
    let line_id: CartLineId = parse_id("cart item id", &id)?;
    let updated = state
        .cart
        .update_quantity(&actor, line_id, req.quantity)
        .await?;
    Ok(match updated {
        Some(entry) => Json(CartItemResponse::from(&entry)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// DELETE /cart/{id}
#[tracing::instrument(skip(state), fields(user_id = %actor.user_id))]
pub async fn remove<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(actor): Authenticated,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let line_id: CartLineId = parse_id("cart item id", &id)?;
    state.cart.remove_line(&actor, line_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /cart
#[tracing::instrument(skip(state), fields(user_id = %actor.user_id))]
pub async fn clear<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(actor): Authenticated,
) -> Result<Json<ClearCartResponse>, ApiError> {
    let removed = state.cart.clear_cart(&actor).await?;
    Ok(Json(ClearCartResponse { removed }))
}
