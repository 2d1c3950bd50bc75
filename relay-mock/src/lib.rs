//! Relay Mock - in-memory order backend
//!
//! Serves the REST surface the relay client talks to. Used by the
//! client's integration tests and for local development.

pub mod api;
pub mod state;

pub use api::router;
pub use state::{MockState, StoredProof};

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serve `state` on an already bound listener until the task is dropped
pub async fn serve(listener: TcpListener, state: Arc<MockState>) -> std::io::Result<()> {
    axum::serve(listener, router(state)).await
}

/// Bind `addr` and serve in the background
///
/// Pass port 0 to get an ephemeral port; the bound address is returned.
pub async fn spawn(
    addr: SocketAddr,
    state: Arc<MockState>,
) -> std::io::Result<(SocketAddr, JoinHandle<std::io::Result<()>>)> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    tracing::debug!(%local, "Mock backend listening");
    let handle = tokio::spawn(serve(listener, state));
    Ok((local, handle))
}
