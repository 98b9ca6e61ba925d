//! Liveness and store readiness

use axum::{extract::State, routing::get, Json, Router};
use obras_common::db::dashboard_view_exists;
use serde::Serialize;
use tracing::warn;

use crate::AppState;

/// Whether the dashboard view can be served
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreStatus {
    Ready,
    /// The ETL has not created the schema yet
    SchemaMissing,
    Unavailable,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    pub store: StoreStatus,
}

/// GET /health
///
/// Always 200 while the process serves requests; `store` tells callers
/// whether the data routes will answer.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = match dashboard_view_exists(&state.db).await {
        Ok(true) => StoreStatus::Ready,
        Ok(false) => StoreStatus::SchemaMissing,
        Err(e) => {
            warn!("Store readiness check failed: {}", e);
            StoreStatus::Unavailable
        }
    };

    Json(HealthResponse {
        status: "ok",
        module: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        store,
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
