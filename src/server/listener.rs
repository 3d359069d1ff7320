//! The accept loop.
//!
//! [`RelayListener`] is what axum's server pulls connections from. It shares
//! the socket with the [`ShutdownCoordinator`], so when the server stops
//! accepting at the start of shutdown the socket stays bound until the
//! coordinator closes it after the drain.
//!
//! [`ShutdownCoordinator`]: crate::shutdown::ShutdownCoordinator

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::serve::Listener;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, trace};

/// Back-off after an accept error that is not tied to a single connection
/// (e.g. too many open files).
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Shared-socket listener with a retrying accept loop.
pub struct RelayListener {
    inner: Arc<TcpListener>,
}

impl RelayListener {
    pub fn new(inner: Arc<TcpListener>) -> Self {
        RelayListener { inner }
    }
}

impl Listener for RelayListener {
    type Io = TcpStream;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            match self.inner.accept().await {
                Ok((stream, peer)) => {
                    trace!(peer = %peer, "Accepted connection");
                    return (stream, peer);
                }
                Err(e) if is_connection_error(&e) => {
                    trace!(error = %e, "Connection failed during accept");
                }
                Err(e) => {
                    error!(error = %e, "Accept failed; backing off");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.inner.local_addr()
    }
}

/// Errors that concern one half-open connection, not the socket.
fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}
