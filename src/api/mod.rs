//! REST API and WebSocket server for the monitor
//!
//! ## Endpoints
//!
//! - `GET /api/v1/health` - Health check
//! - `GET /api/v1/stats` - Network statistics
//! - `GET|POST /api/v1/devices` - List or register devices
//! - `GET|DELETE /api/v1/devices/:id` - Fetch or deregister a device
//! - `PUT /api/v1/devices/:id/monitoring` - Enable or disable probing
//! - `PATCH /api/v1/devices/:id/toggle` - Flip probing
//! - `GET /api/v1/alerts` - Alerts, filterable by `status` and `device_id`
//! - `POST /api/v1/alerts/:id/resolve` - Resolve an alert by hand
//! - `GET /api/v1/logs` - Fault log, newest first
//! - `POST /api/v1/scan` - Probe every monitored device now
//! - `WS /api/v1/stream` - Real-time event streaming

pub mod error;
pub mod routes;
pub mod state;
pub mod websocket;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;

use std::net::SocketAddr;

use axum::{
    Router,
    routing::{get, patch, post, put},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ApiSettings;

pub fn router(state: ApiState, enable_cors: bool) -> Router {
    let mut app = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/stats", get(routes::stats::get_stats))
        .route(
            "/api/v1/devices",
            get(routes::devices::list_devices).post(routes::devices::register_device),
        )
        .route(
            "/api/v1/devices/:id",
            get(routes::devices::get_device).delete(routes::devices::deregister_device),
        )
        .route("/api/v1/devices/:id/monitoring", put(routes::devices::set_monitoring))
        .route("/api/v1/devices/:id/toggle", patch(routes::devices::toggle_monitoring))
        .route("/api/v1/alerts", get(routes::alerts::list_alerts))
        .route("/api/v1/alerts/:id", get(routes::alerts::get_alert))
        .route("/api/v1/alerts/:id/resolve", post(routes::alerts::resolve_alert))
        .route("/api/v1/logs", get(routes::logs::list_fault_logs))
        .route("/api/v1/scan", post(routes::scan::scan_now))
        .route("/api/v1/stream", get(websocket::websocket_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

/// Bind and serve in a background task, returning the bound address
pub async fn spawn_api_server(settings: &ApiSettings, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", settings.bind_addr);

    let app = router(state, settings.enable_cors);

    let listener = tokio::net::TcpListener::bind(settings.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
