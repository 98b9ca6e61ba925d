//! HTTP API handlers for obras-dr

pub mod health;
pub mod metrics;
pub mod operations;

pub use health::health_routes;
pub use metrics::{count_by_axis, get_metrics, top_borrowers, value_by_axis, value_by_type};
pub use operations::list_operations;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use obras_common::db::{dashboard_view_exists, fetch_dashboard_rows, DashboardRow};
use serde_json::json;
use sqlx::SqlitePool;
use tracing::error;

/// Dashboard API errors
#[derive(Debug)]
pub enum ApiError {
    /// The ETL has never created the schema on this store
    SchemaMissing,
    /// Schema exists but the last committed run loaded nothing
    NoData,
    DatabaseError(String),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::SchemaMissing => "SCHEMA_MISSING",
            ApiError::NoData => "NO_DATA",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
        }
    }
}

impl From<obras_common::Error> for ApiError {
    fn from(err: obras_common::Error) -> Self {
        error!("Dashboard query failed: {}", err);
        ApiError::DatabaseError(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, message) = match self {
            ApiError::SchemaMissing => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Tables not found. Run obras-etl to create and populate the store.".to_string(),
            ),
            ApiError::NoData => (
                StatusCode::NOT_FOUND,
                "Store is connected but empty. Run obras-etl to populate it.".to_string(),
            ),
            ApiError::DatabaseError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", msg))
            }
        };

        let body = Json(json!({
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

/// Fail with [`ApiError::SchemaMissing`] unless the dashboard view exists
pub(crate) async fn require_view(db: &SqlitePool) -> Result<(), ApiError> {
    if dashboard_view_exists(db).await? {
        Ok(())
    } else {
        Err(ApiError::SchemaMissing)
    }
}

/// Every view row, or [`ApiError::NoData`] when the snapshot is empty
pub(crate) async fn load_rows(db: &SqlitePool) -> Result<Vec<DashboardRow>, ApiError> {
    require_view(db).await?;

    let rows = fetch_dashboard_rows(db).await?;
    if rows.is_empty() {
        return Err(ApiError::NoData);
    }
    Ok(rows)
}
