//! Device registry endpoints

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use crate::api::{error::ApiResult, state::ApiState};
use crate::monitor::device::{Device, DeviceSpec};

#[derive(Debug, Deserialize)]
pub struct MonitoringRequest {
    pub enabled: bool,
}

/// GET /api/v1/devices
pub async fn list_devices(State(state): State<ApiState>) -> Json<Vec<Device>> {
    Json(state.monitor.list_devices().await)
}

/// GET /api/v1/devices/:id
pub async fn get_device(State(state): State<ApiState>, Path(id): Path<String>) -> ApiResult<Json<Device>> {
    Ok(Json(state.monitor.get_device(&id).await?))
}

/// POST /api/v1/devices
pub async fn register_device(
    State(state): State<ApiState>,
    Json(spec): Json<DeviceSpec>,
) -> ApiResult<(StatusCode, Json<Device>)> {
    let device = state.monitor.register_device(spec).await?;
    Ok((StatusCode::CREATED, Json(device)))
}

/// DELETE /api/v1/devices/:id
pub async fn deregister_device(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Device>> {
    Ok(Json(state.monitor.deregister_device(&id).await?))
}

/// PUT /api/v1/devices/:id/monitoring
pub async fn set_monitoring(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(request): Json<MonitoringRequest>,
) -> ApiResult<Json<Device>> {
    Ok(Json(state.monitor.set_monitored(&id, request.enabled).await?))
}

/// PATCH /api/v1/devices/:id/toggle
pub async fn toggle_monitoring(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Device>> {
    Ok(Json(state.monitor.toggle_monitoring(&id).await?))
}
