//! Axum HTTP handlers for the readings gateway.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::Value;
use tower_http::trace::TraceLayer;

use crate::error::{GatewayError, Result};
use crate::mapping::response::{AggregateView, ReadingEnvelope, ReadingPage};
use crate::service::ReadingsGateway;

/// Prefix every readings route is mounted under.
pub const API_PREFIX: &str = "/api/v1";

/// Shared state injected into every Axum handler via `State`.
pub struct AppState {
    pub gateway: ReadingsGateway,
}

/// Build the full HTTP router.
pub fn router(state: Arc<AppState>) -> Router {
    let readings = Router::new()
        .route("/readings", get(list_readings).post(create_reading))
        .route("/readings/aggregate", get(aggregate_readings))
        .route(
            "/readings/:id",
            get(get_reading).put(update_reading).delete(delete_reading),
        );

    Router::new()
        .route("/health", get(health))
        .nest(API_PREFIX, readings)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Turn axum's body rejection into a validation error so every 400 has the
/// same shape.
fn json_body(body: std::result::Result<Json<Value>, JsonRejection>) -> Result<Value> {
    body.map(|Json(v)| v)
        .map_err(|e| GatewayError::Validation(e.body_text()))
}

// ------------------------------------------------------------------ //
//  Readings                                                           //
// ------------------------------------------------------------------ //

/// POST /readings
pub async fn create_reading(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<ReadingEnvelope>)> {
    let body = json_body(body)?;
    let out = state.gateway.create(&body).await?;
    Ok((StatusCode::CREATED, Json(out)))
}

/// GET /readings
pub async fn list_readings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<ReadingPage>> {
    Ok(Json(state.gateway.list(&params).await?))
}

/// GET /readings/aggregate
pub async fn aggregate_readings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<AggregateView>> {
    Ok(Json(state.gateway.aggregate(&params).await?))
}

/// GET /readings/:id
pub async fn get_reading(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ReadingEnvelope>> {
    Ok(Json(state.gateway.get(&id).await?))
}

/// PUT /readings/:id
pub async fn update_reading(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<ReadingEnvelope>> {
    let body = json_body(body)?;
    Ok(Json(state.gateway.update(&id, &body).await?))
}

/// DELETE /readings/:id
pub async fn delete_reading(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.gateway.remove(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ------------------------------------------------------------------ //
//  Health                                                             //
// ------------------------------------------------------------------ //

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}
