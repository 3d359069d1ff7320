//! Sighting endpoint handler.
//!
//! Accepts a sighting notice, hands it to a tracked background task, and
//! returns 202 Accepted without waiting. The pipeline itself runs on the
//! blocking pool, since notifiers do synchronous I/O. Whether the notice was new, a
//! duplicate, or undecodable is not reported to the sender.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, error, trace};

use super::AppState;
use crate::dispatch::process_sighting;
use crate::shutdown::ShutdownError;

/// Errors surfaced to the sender.
#[derive(Debug, Error)]
pub enum SightingError {
    /// The relay is shutting down and no longer takes new work.
    #[error("shutting down")]
    ShuttingDown(#[from] ShutdownError),
}

impl IntoResponse for SightingError {
    fn into_response(self) -> Response {
        let status = match &self {
            SightingError::ShuttingDown(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        (status, self.to_string()).into_response()
    }
}

/// Sighting handler.
///
/// # Request
///
/// - Method: POST
/// - Path: `/pokemonz/`
/// - Body: JSON sighting envelope (see [`crate::sightings`])
///
/// # Response
///
/// - 202 Accepted: handed to a background task
/// - 503 Service Unavailable: shutdown has begun
///
/// # Example
///
/// ```ignore
/// POST /pokemonz/ HTTP/1.1
/// Content-Type: application/json
///
/// {"type": "pokemon", "message": {"encounter_id": "E1", ...}}
///
/// HTTP/1.1 202 Accepted
/// ```
pub async fn sighting_handler(
    State(app_state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, &'static str), SightingError> {
    let registry = Arc::clone(app_state.registry());
    let notifier = Arc::clone(app_state.notifier());
    let bytes = body.len();

    app_state.coordinator().spawn(async move {
        let pipeline = tokio::task::spawn_blocking(move || {
            process_sighting(&body, &registry, notifier.as_ref())
        });
        match pipeline.await {
            Ok(outcome) => trace!(?outcome, "Sighting task finished"),
            Err(e) => error!(error = %e, "Sighting task failed"),
        }
    })?;

    debug!(bytes, "Sighting accepted");
    Ok((StatusCode::ACCEPTED, "Accepted"))
}
