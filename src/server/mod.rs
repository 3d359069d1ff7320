//! HTTP surface of the relay.
//!
//! # Endpoints
//!
//! - `POST /pokemonz/` - Accepts a sighting notice (returns 202 Accepted)
//! - `GET /health` - Lifecycle state and counters (200 while running, 503 while draining)

use std::sync::Arc;

use crate::dedupe::DedupRegistry;
use crate::notify::Notifier;
use crate::shutdown::ShutdownCoordinator;

pub mod health;
pub mod listener;
pub mod sighting;

pub use health::health_handler;
pub use listener::RelayListener;
pub use sighting::sighting_handler;

/// Path sightings are posted to.
pub const SIGHTING_PATH: &str = "/pokemonz/";

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    registry: Arc<DedupRegistry>,
    notifier: Arc<dyn Notifier>,
    coordinator: Arc<ShutdownCoordinator>,
}

impl AppState {
    pub fn new(
        registry: Arc<DedupRegistry>,
        notifier: Arc<dyn Notifier>,
        coordinator: Arc<ShutdownCoordinator>,
    ) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                registry,
                notifier,
                coordinator,
            }),
        }
    }

    pub fn registry(&self) -> &Arc<DedupRegistry> {
        &self.inner.registry
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.inner.notifier
    }

    pub fn coordinator(&self) -> &Arc<ShutdownCoordinator> {
        &self.inner.coordinator
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route(SIGHTING_PATH, post(sighting_handler))
        .route(SIGHTING_PATH.trim_end_matches('/'), post(sighting_handler))
        .route("/health", get(health_handler))
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_app_state;

    #[test]
    fn app_state_is_clone() {
        let (state, _notifier) = test_app_state();
        let cloned = state.clone();

        assert!(Arc::ptr_eq(state.registry(), cloned.registry()));
        assert!(Arc::ptr_eq(state.coordinator(), cloned.coordinator()));
    }
}
