//! OS termination signals.
//!
//! **Unix:** SIGINT (Ctrl-C), SIGTERM (systemd, Kubernetes), SIGQUIT.
//! **Elsewhere:** Ctrl-C only.

use std::future::Future;
use std::io;

use tracing::info;

use super::ShutdownCoordinator;

/// A stream of named termination signals.
///
/// `recv` yields `None` once no further signals can arrive.
pub trait SignalSource: Send {
    fn recv(&mut self) -> impl Future<Output = Option<&'static str>> + Send;
}

/// Registered termination-signal listeners.
///
/// Listeners stay registered for the life of the value, so repeated calls to
/// [`SignalSource::recv`] observe every later signal.
#[cfg(unix)]
pub struct ShutdownSignals {
    sigint: tokio::signal::unix::Signal,
    sigterm: tokio::signal::unix::Signal,
    sigquit: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    pub fn new() -> io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(ShutdownSignals {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
            sigquit: signal(SignalKind::quit())?,
        })
    }
}

#[cfg(unix)]
impl SignalSource for ShutdownSignals {
    fn recv(&mut self) -> impl Future<Output = Option<&'static str>> + Send {
        async move {
            tokio::select! {
                Some(()) = self.sigint.recv() => Some("SIGINT"),
                Some(()) = self.sigterm.recv() => Some("SIGTERM"),
                Some(()) = self.sigquit.recv() => Some("SIGQUIT"),
                else => None,
            }
        }
    }
}

/// Registered termination-signal listeners.
#[cfg(not(unix))]
pub struct ShutdownSignals {
    _private: (),
}

#[cfg(not(unix))]
impl ShutdownSignals {
    pub fn new() -> io::Result<Self> {
        Ok(ShutdownSignals { _private: () })
    }
}

#[cfg(not(unix))]
impl SignalSource for ShutdownSignals {
    fn recv(&mut self) -> impl Future<Output = Option<&'static str>> + Send {
        async move { tokio::signal::ctrl_c().await.ok().map(|()| "ctrl-c") }
    }
}

/// Turns signals into shutdown requests until the source is exhausted.
///
/// The first signal begins the shutdown. Later ones are logged and change
/// nothing. Returns how many signals were ignored.
pub async fn watch_signals<S: SignalSource>(
    mut signals: S,
    coordinator: &ShutdownCoordinator,
) -> usize {
    let mut ignored = 0;
    while let Some(signal) = signals.recv().await {
        if coordinator.begin_shutdown() {
            info!(signal, "Terminating existing tasks and exiting");
        } else {
            ignored += 1;
            info!(
                signal,
                state = %coordinator.state(),
                "Shutdown already in progress; ignoring signal"
            );
        }
    }
    ignored
}
