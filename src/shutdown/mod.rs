//! Process lifecycle and graceful shutdown.
//!
//! One [`ShutdownCoordinator`] owns the lifecycle state, the set of in-flight
//! handler tasks, and the listening socket:
//!
//! ```text
//! Running ──begin_shutdown()──► Draining ──complete()──► Stopped
//!   │                              │                        │
//!   spawn() accepted               spawn() refused          socket closed
//!                                  accept loop exits        reaper stopped
//!                                  in-flight tasks drain
//! ```
//!
//! Both transitions are idempotent. Only the first `begin_shutdown` call has
//! an effect, and only the first `complete` call waits for the drain and
//! closes the socket. Later calls are no-ops.

pub mod signals;

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

pub use signals::{ShutdownSignals, SignalSource, watch_signals};

/// Lifecycle of the relay process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Accepting new requests.
    Running,
    /// No new requests; waiting for in-flight tasks.
    Draining,
    /// Drained and closed.
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Running => write!(f, "running"),
            LifecycleState::Draining => write!(f, "draining"),
            LifecycleState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Errors from the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ShutdownError {
    /// New work was offered after shutdown began.
    #[error("not accepting new work (state: {0})")]
    NotAccepting(LifecycleState),
}

/// Result of the drain performed by [`ShutdownCoordinator::complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// False if the drain timeout elapsed before every task finished.
    pub drained: bool,
    /// Tasks still running when the drain ended.
    pub remaining: usize,
    /// Time spent waiting.
    pub elapsed: Duration,
}

/// Owns the lifecycle state machine, the in-flight task set, and the listener.
pub struct ShutdownCoordinator {
    state: Mutex<LifecycleState>,
    draining_since: Mutex<Option<Instant>>,
    in_flight: TaskTracker,
    accepting: CancellationToken,
    stopped: CancellationToken,
    listener: Mutex<Option<Arc<TcpListener>>>,
    completion: tokio::sync::Mutex<bool>,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        ShutdownCoordinator {
            state: Mutex::new(LifecycleState::Running),
            draining_since: Mutex::new(None),
            in_flight: TaskTracker::new(),
            accepting: CancellationToken::new(),
            stopped: CancellationToken::new(),
            listener: Mutex::new(None),
            completion: tokio::sync::Mutex::new(false),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// When the shutdown began, if it has.
    pub fn draining_since(&self) -> Option<Instant> {
        *self
            .draining_since
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// The instant a drain bounded by `limit` must end. `None` while running.
    pub fn drain_deadline(&self, limit: Duration) -> Option<Instant> {
        self.draining_since().map(|since| since + limit)
    }

    /// Number of handler tasks still running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Cancelled when the relay stops accepting new work.
    pub fn accepting_token(&self) -> CancellationToken {
        self.accepting.clone()
    }

    /// Cancelled once the relay has fully stopped.
    pub fn stopped_token(&self) -> CancellationToken {
        self.stopped.clone()
    }

    /// Hands the listening socket to the coordinator, which closes it after the drain.
    pub fn attach_listener(&self, listener: Arc<TcpListener>) {
        let mut slot = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.replace(listener).is_some() {
            warn!("Replacing a previously attached listener");
        }
    }

    /// Spawns a handler task and tracks it until it finishes.
    ///
    /// The task is deregistered when it completes, whether it returns or panics.
    /// Refused once shutdown has begun.
    pub fn spawn<F>(&self, task: F) -> Result<(), ShutdownError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // Holding the state lock across the spawn means a task is either
        // tracked before the drain starts or refused.
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != LifecycleState::Running {
            return Err(ShutdownError::NotAccepting(*state));
        }
        self.in_flight.spawn(task);
        Ok(())
    }

    /// Moves from `Running` to `Draining`.
    ///
    /// Returns true for the call that made the transition and false for
    /// every later call.
    pub fn begin_shutdown(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != LifecycleState::Running {
            debug!(state = %*state, "Shutdown already in progress");
            return false;
        }
        *state = LifecycleState::Draining;
        *self
            .draining_since
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        drop(state);

        self.in_flight.close();
        self.accepting.cancel();
        info!(in_flight = self.in_flight.len(), "Shutdown requested; draining");
        true
    }

    /// Drains in-flight tasks, closes the listener, and moves to `Stopped`.
    ///
    /// Begins the shutdown first if nobody has. With `drain_timeout` set, the
    /// wait ends at most that long after the shutdown began and stragglers are
    /// left running. Returns `None` if an
    /// earlier call already completed the shutdown; concurrent callers wait
    /// for the first one to finish.
    pub async fn complete(&self, drain_timeout: Option<Duration>) -> Option<DrainReport> {
        let mut completed = self.completion.lock().await;
        if *completed {
            return None;
        }

        self.begin_shutdown();

        let started = Instant::now();
        let drained = match drain_timeout {
            None => {
                self.in_flight.wait().await;
                true
            }
            Some(limit) => {
                let deadline = self.drain_deadline(limit).unwrap_or(started + limit);
                tokio::time::timeout_at(deadline, self.in_flight.wait())
                    .await
                    .is_ok()
            }
        };
        let report = DrainReport {
            drained,
            remaining: self.in_flight.len(),
            elapsed: started.elapsed(),
        };
        if !drained {
            warn!(
                remaining = report.remaining,
                timeout_ms = drain_timeout.map(|d| d.as_millis() as u64),
                "Drain timed out; abandoning remaining tasks"
            );
        }

        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(listener) = listener {
            let addr = listener.local_addr().ok();
            drop(listener);
            info!(addr = ?addr, "Listener closed");
        }

        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = LifecycleState::Stopped;
        self.stopped.cancel();
        *completed = true;

        info!(
            elapsed_ms = report.elapsed.as_millis() as u64,
            drained = report.drained,
            "Shutdown complete"
        );
        Some(report)
    }
}
