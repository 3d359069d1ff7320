//! Process wiring.
//!
//! A [`Relay`] owns the listening socket, the registry, and the shutdown
//! coordinator. Running it starts the reaper, serves sightings until the
//! first shutdown trigger, then drains in-flight tasks and closes the socket.
//!
//! ```text
//!  signal ──► coordinator.begin_shutdown()
//!                 │
//!                 ├─► accept loop exits (socket stays bound)
//!                 ▼
//!            coordinator.complete()
//!                 ├─► wait for in-flight tasks
//!                 ├─► close socket
//!                 └─► stop reaper
//! ```

use std::future::{Future, IntoFuture};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, instrument, warn};

use crate::config::RelayConfig;
use crate::dedupe::{DedupRegistry, Reaper};
use crate::notify::Notifier;
use crate::server::{AppState, RelayListener, SIGHTING_PATH, build_router};
use crate::shutdown::{DrainReport, ShutdownCoordinator, ShutdownSignals, watch_signals};


/// Errors that end the relay.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Signal handlers could not be installed.
    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] io::Error),

    /// The HTTP server failed.
    #[error("server error: {0}")]
    Serve(#[source] io::Error),
}

/// A bound, not yet running relay.
pub struct Relay {
    config: RelayConfig,
    socket: Arc<TcpListener>,
    registry: Arc<DedupRegistry>,
    notifier: Arc<dyn Notifier>,
    coordinator: Arc<ShutdownCoordinator>,
}

impl Relay {
    /// Binds the listen address. Nothing is accepted until the relay runs.
    pub async fn bind(config: RelayConfig, notifier: Arc<dyn Notifier>) -> Result<Self, RelayError> {
        let socket = TcpListener::bind(config.bind)
            .await
            .map_err(|source| RelayError::Bind {
                addr: config.bind,
                source,
            })?;

        Ok(Relay {
            registry: Arc::new(DedupRegistry::with_capacity(config.registry_capacity)),
            socket: Arc::new(socket),
            notifier,
            coordinator: Arc::new(ShutdownCoordinator::new()),
            config,
        })
    }

    /// The address actually bound (useful when binding port 0).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn registry(&self) -> &Arc<DedupRegistry> {
        &self.registry
    }

    pub fn coordinator(&self) -> &Arc<ShutdownCoordinator> {
        &self.coordinator
    }

    /// Runs until a termination signal, then shuts down gracefully.
    ///
    /// Signals received after the first are logged and otherwise ignored.
    pub async fn run(self) -> Result<Option<DrainReport>, RelayError> {
        let signals = ShutdownSignals::new().map_err(RelayError::Signals)?;
        let coordinator = Arc::clone(&self.coordinator);
        let watcher = tokio::spawn(async move { watch_signals(signals, &coordinator).await });

        let result = self.run_until(std::future::pending()).await;
        watcher.abort();
        result
    }

    /// Runs until `shutdown` completes (or the coordinator is told to shut
    /// down some other way), then drains and stops.
    ///
    /// With a drain timeout configured, the deadline covers both waiting for
    /// open connections to finish and waiting for in-flight tasks. Connections
    /// still open at the deadline are abandoned.
    ///
    /// Returns the drain report, or `None` if the shutdown was completed
    /// elsewhere first.
    #[instrument(skip_all, fields(addr = ?self.socket.local_addr().ok()))]
    pub async fn run_until<F>(self, shutdown: F) -> Result<Option<DrainReport>, RelayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Relay {
            config,
            socket,
            registry,
            notifier,
            coordinator,
        } = self;

        coordinator.attach_listener(Arc::clone(&socket));

        let reaper = Reaper::new(Arc::clone(&registry), config.reaper.clone())
            .spawn(coordinator.stopped_token());

        let trigger = tokio::spawn({
            let coordinator = Arc::clone(&coordinator);
            async move {
                shutdown.await;
                coordinator.begin_shutdown();
            }
        });

        let app = build_router(AppState::new(registry, notifier, Arc::clone(&coordinator)));
        let accepting = coordinator.accepting_token();

        info!(path = SIGHTING_PATH, "Relay listening");
        let serve = axum::serve(RelayListener::new(socket), app)
            .with_graceful_shutdown(async move { accepting.cancelled().await })
            .into_future();
        let served = match config.drain_timeout {
            None => serve.await,
            Some(limit) => {
                let connections_deadline = {
                    let coordinator = Arc::clone(&coordinator);
                    let accepting = coordinator.accepting_token();
                    async move {
                        accepting.cancelled().await;
                        if let Some(deadline) = coordinator.drain_deadline(limit) {
                            tokio::time::sleep_until(deadline).await;
                        }
                    }
                };
                tokio::select! {
                    served = serve => served,
                    () = connections_deadline => {
                        warn!(
                            timeout_ms = limit.as_millis() as u64,
                            "Connections still open at the drain deadline; abandoning them"
                        );
                        Ok(())
                    }
                }
            }
        };
        if let Err(e) = &served {
            error!(error = %e, "Server stopped unexpectedly");
        }

        let report = coordinator.complete(config.drain_timeout).await;
        trigger.abort();
        if let Err(e) = reaper.await {
            warn!(error = %e, "Reaper task ended abnormally");
        }

        served.map_err(RelayError::Serve)?;
        Ok(report)
    }
}
