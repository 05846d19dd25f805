//! Fault log endpoint

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

use crate::api::state::ApiState;
use crate::monitor::DEFAULT_FAULT_LOG_LIMIT;
use crate::monitor::alerts::{FAULT_LOG_CAPACITY, FaultLogEntry};

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    limit: Option<usize>,
}

/// GET /api/v1/logs?limit=N
pub async fn list_fault_logs(State(state): State<ApiState>, Query(query): Query<LogQuery>) -> Json<Vec<FaultLogEntry>> {
    let limit = query.limit.unwrap_or(DEFAULT_FAULT_LOG_LIMIT).min(FAULT_LOG_CAPACITY);
    Json(state.monitor.list_fault_logs(limit).await)
}
