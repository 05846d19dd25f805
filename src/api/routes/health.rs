//! Health check endpoint

use axum::{Json, extract::State};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::warn;

use crate::api::state::ApiState;

/// GET /api/v1/health
///
/// `status` is "degraded" when the storage backend reports a problem
pub async fn health_check(State(state): State<ApiState>) -> Json<Value> {
    let now = Utc::now();

    let storage = match &state.storage {
        Some(backend) => match backend.health_check().await {
            Ok(health) => Some(health),
            Err(e) => {
                warn!("storage health check failed: {e}");
                None
            }
        },
        None => None,
    };
    let healthy = match (&state.storage, &storage) {
        (None, _) => true,
        (Some(_), Some(health)) => health.healthy,
        (Some(_), None) => false,
    };

    Json(json!({
        "status": if healthy { "ok" } else { "degraded" },
        "timestamp": now.to_rfc3339(),
        "uptimeSecs": (now - state.started_at).num_seconds().max(0),
        "scheduler": state.scheduler.is_some(),
        "storage": storage,
    }))
}
