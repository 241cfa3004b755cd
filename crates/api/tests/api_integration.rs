//! Integration tests for the API server.

use std::sync::OnceLock;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{Role, UserId};
use domain::Actor;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use store::{InMemoryStorage, Money, Product};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (Router, InMemoryStorage) {
    let storage = InMemoryStorage::new();
    let state = api::create_default_state(storage.clone());
    (api::create_app(state, get_metrics_handle()), storage)
}

async fn seed_product(storage: &InMemoryStorage, price_cents: i64, stock: u32) -> Product {
    let product = Product::new(UserId::new(), "Widget", Money::from_cents(price_cents), stock);
    storage.insert_product(product.clone()).await;
    product
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    actor: Option<&Actor>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        request = request
            .header("x-user-id", actor.user_id.to_string())
            .header("x-user-role", actor.role.as_str());
    }
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn fill_cart(app: &Router, actor: &Actor, product: &Product, quantity: i64) {
    let (status, _) = send(
        app,
        "POST",
        "/cart",
        Some(actor),
        Some(json!({ "product_id": product.id.to_string(), "quantity": quantity })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

async fn place(app: &Router, actor: &Actor) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/orders",
        Some(actor),
        Some(json!({ "address": "Jl. Merdeka 1", "phone": "0812" })),
    )
    .await
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let (status, json) = send(&app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_place_order() {
    let (app, storage) = setup();
    let product = seed_product(&storage, 1000, 5).await;
    let buyer = Actor::user(UserId::new());
    fill_cart(&app, &buyer, &product, 3).await;

    let (status, order) = place(&app, &buyer).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "pending");
    assert_eq!(order["total_cents"], 3000);
    assert_eq!(order["user_id"], buyer.user_id.to_string());
    assert_eq!(order["address"], "Jl. Merdeka 1");
    let items = order["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["price_cents"], 1000);
    assert_eq!(items[0]["quantity"], 3);
    assert_eq!(items[0]["product"]["stock"], 2);
    assert_eq!(storage.stock_of(product.id).await, Some(2));

    let (_, cart) = send(&app, "GET", "/cart", Some(&buyer), None).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_place_order_validation() {
    let (app, storage) = setup();
    let product = seed_product(&storage, 1000, 5).await;
    let buyer = Actor::user(UserId::new());

    let (status, json) = place(&app, &buyer).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "validation");

    fill_cart(&app, &buyer, &product, 1).await;
    let (status, json) = send(
        &app,
        "POST",
        "/orders",
        Some(&buyer),
        Some(json!({ "address": "  ", "phone": "0812" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "validation");
    assert_eq!(storage.cart_len(buyer.user_id).await, 1);
}

#[tokio::test]
async fn test_insufficient_stock_is_conflict() {
    let (app, storage) = setup();
    let product = seed_product(&storage, 1000, 3).await;
    let first = Actor::user(UserId::new());
    let second = Actor::user(UserId::new());
    fill_cart(&app, &first, &product, 2).await;
    fill_cart(&app, &second, &product, 2).await;

    assert_eq!(place(&app, &first).await.0, StatusCode::CREATED);
    let (status, json) = place(&app, &second).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "conflict");
    assert_eq!(storage.stock_of(product.id).await, Some(1));
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let (app, _) = setup();

    let (status, json) = send(&app, "GET", "/orders", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json["error"].as_str().is_some());
}

#[tokio::test]
async fn test_get_order_visibility() {
    let (app, storage) = setup();
    let product = seed_product(&storage, 500, 5).await;
    let owner = Actor::user(UserId::new());
    fill_cart(&app, &owner, &product, 1).await;
    let (_, order) = place(&app, &owner).await;
    let uri = format!("/orders/{}", order["id"].as_str().unwrap());

    let (status, json) = send(&app, "GET", &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], order["id"]);

    let admin = Actor::admin(UserId::new());
    assert_eq!(send(&app, "GET", &uri, Some(&admin), None).await.0, StatusCode::OK);

    let stranger = Actor::user(UserId::new());
    let (status, json) = send(&app, "GET", &uri, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["kind"], "not_found");
}

#[tokio::test]
async fn test_get_nonexistent_and_malformed_order() {
    let (app, _) = setup();
    let actor = Actor::user(UserId::new());
    let fake_id = uuid::Uuid::new_v4();

    let (status, _) = send(&app, "GET", &format!("/orders/{fake_id}"), Some(&actor), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = send(&app, "GET", "/orders/not-a-uuid", Some(&actor), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "validation");
}

#[tokio::test]
async fn test_cancel_flow() {
    let (app, storage) = setup();
    let product = seed_product(&storage, 1000, 5).await;
    let owner = Actor::user(UserId::new());
    fill_cart(&app, &owner, &product, 3).await;
    let (_, order) = place(&app, &owner).await;
    let uri = format!("/orders/{}/cancel", order["id"].as_str().unwrap());

    let stranger = Actor::user(UserId::new());
    let (status, _) = send(&app, "PUT", &uri, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = send(&app, "PUT", &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "cancelled");
    assert_eq!(storage.stock_of(product.id).await, Some(5));

    let (status, json) = send(&app, "PUT", &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "conflict");
    assert_eq!(storage.stock_of(product.id).await, Some(5));
}

#[tokio::test]
async fn test_status_override() {
    let (app, storage) = setup();
    let product = seed_product(&storage, 1000, 5).await;
    let owner = Actor::user(UserId::new());
    let admin = Actor::admin(UserId::new());
    fill_cart(&app, &owner, &product, 2).await;
    let (_, order) = place(&app, &owner).await;
    let uri = format!("/orders/{}/status", order["id"].as_str().unwrap());

    let (status, json) = send(
        &app,
        "PUT",
        &uri,
        Some(&owner),
        Some(json!({ "status": "shipped" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["kind"], "authorization");

    let (status, _) = send(
        &app,
        "PUT",
        &uri,
        Some(&owner),
        Some(json!({ "status": "bogus" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "PUT",
        &uri,
        Some(&admin),
        Some(json!({ "status": "lost" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(
        &app,
        "PUT",
        &uri,
        Some(&admin),
        Some(json!({ "status": "cancelled" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "cancelled");
    assert_eq!(storage.stock_of(product.id).await, Some(3));

    let missing = format!("/orders/{}/status", uuid::Uuid::new_v4());
    let (status, _) = send(
        &app,
        "PUT",
        &missing,
        Some(&admin),
        Some(json!({ "status": "shipped" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_orders_scoping_and_filters() {
    let (app, storage) = setup();
    let product = seed_product(&storage, 100, 10).await;
    let alice = Actor::user(UserId::new());
    let bob = Actor::new(UserId::new(), Role::Seller);
    for actor in [&alice, &bob] {
        fill_cart(&app, actor, &product, 1).await;
        place(&app, actor).await;
    }

    let (status, json) = send(&app, "GET", "/orders", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let orders = json.as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["user_id"], alice.user_id.to_string());

    let admin = Actor::admin(UserId::new());
    let (_, json) = send(&app, "GET", "/orders", Some(&admin), None).await;
    assert_eq!(json.as_array().unwrap().len(), 2);

    let (_, json) = send(&app, "GET", "/orders?limit=1", Some(&admin), None).await;
    assert_eq!(json.as_array().unwrap().len(), 1);

    let (_, json) = send(&app, "GET", "/orders?status=shipped", Some(&admin), None).await;
    assert!(json.as_array().unwrap().is_empty());

    let (status, _) = send(&app, "GET", "/orders?status=bogus", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let huge = format!("/orders?limit={}", u64::MAX);
    let (status, json) = send(&app, "GET", &huge, Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "validation");
}

#[tokio::test]
async fn test_cart_endpoints() {
    let (app, storage) = setup();
    let product = seed_product(&storage, 250, 4).await;
    let buyer = Actor::user(UserId::new());

    let (status, json) = send(
        &app,
        "POST",
        "/cart",
        Some(&buyer),
        Some(json!({ "product_id": product.id.to_string() })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["quantity"], 1);
    let line_uri = format!("/cart/{}", json["id"].as_str().unwrap());

    let (status, json) = send(
        &app,
        "PUT",
        &line_uri,
        Some(&buyer),
        Some(json!({ "quantity": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["quantity"], 3);

    let (status, json) = send(
        &app,
        "PUT",
        &line_uri,
        Some(&buyer),
        Some(json!({ "quantity": 9 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "conflict");

    let (_, cart) = send(&app, "GET", "/cart", Some(&buyer), None).await;
    assert_eq!(cart["total_cents"], 750);

    let (status, _) = send(
        &app,
        "PUT",
        &line_uri,
        Some(&buyer),
        Some(json!({ "quantity": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(storage.cart_len(buyer.user_id).await, 0);

    fill_cart(&app, &buyer, &product, 2).await;
    let (status, json) = send(&app, "DELETE", "/cart", Some(&buyer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], 1);

    let (status, _) = send(&app, "DELETE", &line_uri, Some(&buyer), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, storage) = setup();
    let product = seed_product(&storage, 100, 1).await;
    let buyer = Actor::user(UserId::new());
    fill_cart(&app, &buyer, &product, 1).await;
    place(&app, &buyer).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("orders_placed_total"));
}
