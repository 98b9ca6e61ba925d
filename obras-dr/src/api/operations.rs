//! Paginated listing of dashboard view rows

use axum::{
    extract::{Query, State},
    Json,
};
use obras_common::db::{count_dashboard_rows, fetch_dashboard_page, DashboardRow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{require_view, ApiError};
use crate::pagination::PageWindow;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct OperationsQuery {
    /// Page number (1-indexed)
    #[serde(default = "default_page")]
    pub page: i64,
}

fn default_page() -> i64 {
    1
}

#[derive(Debug, Serialize)]
pub struct OperationsResponse {
    #[serde(flatten)]
    pub window: PageWindow,
    pub rows: Vec<DashboardRow>,
}

/// GET /api/operations?page=N
///
/// An empty store yields an empty page rather than an error.
pub async fn list_operations(
    State(state): State<AppState>,
    Query(query): Query<OperationsQuery>,
) -> Result<Json<OperationsResponse>, ApiError> {
    require_view(&state.db).await?;

    let total_rows = count_dashboard_rows(&state.db).await?;
    let window = PageWindow::locate(total_rows, query.page);
    if window.was_clamped(query.page) {
        debug!(requested = query.page, page = window.page, "Page out of range, clamped");
    }
    let rows = fetch_dashboard_page(&state.db, window.page_size, window.offset()).await?;

    Ok(Json(OperationsResponse { window, rows }))
}
