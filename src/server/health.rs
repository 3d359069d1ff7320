//! Health check endpoint.
//!
//! Returns 200 while the relay accepts sightings and 503 once it is draining,
//! so a load balancer stops routing to it during shutdown.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use super::AppState;
use crate::shutdown::LifecycleState;

/// Body of the health response.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct HealthReport {
    pub state: String,
    pub in_flight: usize,
    pub tracked_encounters: usize,
}

/// Health check handler.
///
/// # Example
///
/// ```ignore
/// GET /health HTTP/1.1
///
/// HTTP/1.1 200 OK
/// Content-Type: application/json
///
/// {"state":"running","in_flight":0,"tracked_encounters":12}
/// ```
pub async fn health_handler(State(app_state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let state = app_state.coordinator().state();
    let status = match state {
        LifecycleState::Running => StatusCode::OK,
        LifecycleState::Draining | LifecycleState::Stopped => StatusCode::SERVICE_UNAVAILABLE,
    };
    let report = HealthReport {
        state: state.to_string(),
        in_flight: app_state.coordinator().in_flight(),
        tracked_encounters: app_state.registry().len(),
    };
    (status, Json(report))
}
