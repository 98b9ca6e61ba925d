//! obras-dr library: read-only dashboard data service
//!
//! Serves KPIs, breakdowns and paginated rows from the dashboard view
//! produced by obras-etl. Never writes to the store.

use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod metrics;
pub mod pagination;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Read-only connection pool
    pub db: SqlitePool,
}

impl AppState {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    let data = Router::new()
        .route("/api/operations", get(api::list_operations))
        .route("/api/metrics", get(api::get_metrics))
        .route("/api/breakdown/value-by-type", get(api::value_by_type))
        .route("/api/breakdown/value-by-axis", get(api::value_by_axis))
        .route("/api/breakdown/top-borrowers", get(api::top_borrowers))
        .route("/api/breakdown/count-by-axis", get(api::count_by_axis));

    Router::new()
        .merge(data)
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
