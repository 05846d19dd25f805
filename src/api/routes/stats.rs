//! Network statistics endpoint

use axum::{Json, extract::State};

use crate::api::state::ApiState;
use crate::monitor::device::NetworkStats;

/// GET /api/v1/stats
pub async fn get_stats(State(state): State<ApiState>) -> Json<NetworkStats> {
    Json(state.monitor.get_stats().await)
}
