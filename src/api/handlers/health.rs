//! Health check endpoint.

use axum::{extract::State, Json};
use std::time::SystemTime;
use tracing::{instrument, warn};

use crate::api::models::{HealthResponse, HealthStatus};
use crate::app_state::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Service health", body = HealthResponse)
    ),
    tag = "Health"
)]
/// Returns service health information.
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = SystemTime::now()
        .duration_since(state.start_time)
        .unwrap_or_default()
        .as_secs();

    let store_status = match state.store.health_check().await {
        Ok(()) => HealthStatus::Healthy,
        Err(e) => {
            warn!(error = %e, "Event store health check failed");
            HealthStatus::Unhealthy
        }
    };

    Json(HealthResponse {
        status: store_status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        store_backend: state.store.backend_name().to_string(),
        store_status,
    })
}
