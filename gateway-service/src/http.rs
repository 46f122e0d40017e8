use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use common_broker::Broker;
use common_observability::ServiceMetrics;
use serde_json::json;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::readmodel::SharedReadModel;

const PROXY_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct GatewayState {
    pub read_model: SharedReadModel,
    pub broker: Broker,
    pub metrics: Arc<ServiceMetrics>,
}

/// The gateway's HTTP surface (spec §4.5 expansion): a thin window onto the read-model
/// plus a raw-body proxy for `order.create`/`catalog.create`. No auth, pagination, or
/// rate limiting — that surface belongs to a different domain.
pub fn router(state: GatewayState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(
            ["http://localhost:3000", "http://localhost:5173"]
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        )
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS]);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/warehouses", get(list_warehouses))
        .route("/warehouses/:id/stock", get(warehouse_stock))
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/:id", get(get_order))
        .route("/catalog", post(create_catalog_item))
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn metrics(State(state): State<GatewayState>) -> impl IntoResponse {
    state
        .metrics
        .render()
        .unwrap_or_else(|err| format!("# render error: {err}\n"))
}

async fn list_warehouses(State(state): State<GatewayState>) -> impl IntoResponse {
    let ids: Vec<String> = state
        .read_model
        .read()
        .await
        .warehouse_ids()
        .into_iter()
        .map(|id| id.as_str().to_string())
        .collect();
    Json(ids)
}

async fn warehouse_stock(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let warehouse_id = common_protocol::WarehouseId::new(id);
    match state.read_model.read().await.stock_for(&warehouse_id) {
        Some(stock) => {
            let out: serde_json::Map<String, serde_json::Value> = stock
                .into_iter()
                .map(|(good, amount)| (good.as_str().to_string(), json!(amount)))
                .collect();
            (StatusCode::OK, Json(serde_json::Value::Object(out))).into_response()
        }
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

async fn list_orders(State(state): State<GatewayState>) -> impl IntoResponse {
    let ids: Vec<Uuid> = state.read_model.read().await.order_ids();
    Json(ids)
}

async fn get_order(State(state): State<GatewayState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match state.read_model.read().await.order(&id) {
        Some(order) => (StatusCode::OK, Json(order)).into_response(),
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

async fn create_order(State(state): State<GatewayState>, body: Bytes) -> impl IntoResponse {
    proxy_request(&state.broker, "order.create".to_string(), body).await
}

async fn create_catalog_item(State(state): State<GatewayState>, body: Bytes) -> impl IntoResponse {
    proxy_request(&state.broker, "catalog.create".to_string(), body).await
}

async fn proxy_request(broker: &Broker, subject: String, body: Bytes) -> impl IntoResponse {
    match broker.request(subject, body, PROXY_TIMEOUT).await {
        Ok(reply) => (StatusCode::OK, reply.to_vec()).into_response(),
        Err(err) => (StatusCode::BAD_GATEWAY, err.to_string()).into_response(),
    }
}
