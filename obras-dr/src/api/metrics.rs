//! KPI and breakdown endpoints
//!
//! Each request reads the full view once and aggregates in memory.

use axum::{extract::State, Json};

use super::{load_rows, ApiError};
use crate::metrics::{self, CountBucket, Kpis, ValueBucket, TOP_BORROWERS};
use crate::AppState;

/// GET /api/metrics
pub async fn get_metrics(State(state): State<AppState>) -> Result<Json<Kpis>, ApiError> {
    let rows = load_rows(&state.db).await?;
    Ok(Json(metrics::kpis(&rows)))
}

/// GET /api/breakdown/value-by-type
pub async fn value_by_type(State(state): State<AppState>) -> Result<Json<Vec<ValueBucket>>, ApiError> {
    let rows = load_rows(&state.db).await?;
    Ok(Json(metrics::value_by_type(&rows)))
}

/// GET /api/breakdown/value-by-axis
pub async fn value_by_axis(State(state): State<AppState>) -> Result<Json<Vec<ValueBucket>>, ApiError> {
    let rows = load_rows(&state.db).await?;
    Ok(Json(metrics::value_by_axis(&rows)))
}

/// GET /api/breakdown/top-borrowers
pub async fn top_borrowers(State(state): State<AppState>) -> Result<Json<Vec<ValueBucket>>, ApiError> {
    let rows = load_rows(&state.db).await?;
    Ok(Json(metrics::top_borrowers(&rows, TOP_BORROWERS)))
}

/// GET /api/breakdown/count-by-axis
pub async fn count_by_axis(State(state): State<AppState>) -> Result<Json<Vec<CountBucket>>, ApiError> {
    let rows = load_rows(&state.db).await?;
    Ok(Json(metrics::count_by_axis(&rows)))
}
