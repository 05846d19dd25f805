//! Alert endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::api::{error::ApiResult, state::ApiState};
use crate::monitor::alerts::{Alert, AlertFilter, AlertId};

/// GET /api/v1/alerts?status=active|resolved&device_id=...
///
/// Newest first
pub async fn list_alerts(State(state): State<ApiState>, Query(filter): Query<AlertFilter>) -> Json<Vec<Alert>> {
    Json(state.monitor.list_alerts(&filter).await)
}

/// GET /api/v1/alerts/:id
pub async fn get_alert(State(state): State<ApiState>, Path(id): Path<u64>) -> ApiResult<Json<Alert>> {
    Ok(Json(state.monitor.get_alert(AlertId(id)).await?))
}

/// POST /api/v1/alerts/:id/resolve
///
/// Resolving an already resolved alert returns it unchanged
pub async fn resolve_alert(State(state): State<ApiState>, Path(id): Path<u64>) -> ApiResult<Json<Alert>> {
    Ok(Json(state.monitor.resolve_alert(AlertId(id)).await?))
}
