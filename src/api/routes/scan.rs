//! Immediate scan endpoint

use axum::{Json, extract::State};

use crate::actors::messages::TickReport;
use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
};

/// POST /api/v1/scan
///
/// Runs one tick outside the regular schedule and returns its report
pub async fn scan_now(State(state): State<ApiState>) -> ApiResult<Json<TickReport>> {
    let scheduler = state
        .scheduler
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("scheduler is not running".to_string()))?;

    Ok(Json(scheduler.tick_now().await?))
}
