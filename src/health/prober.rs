// src/health/prober.rs
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

/// One TCP connect attempt against `address` (`host:port`), bounded by
/// `limit`. The connection is closed before returning.
pub async fn probe(address: &str, limit: Duration) -> bool {
    match timeout(limit, TcpStream::connect(address)).await {
        Ok(Ok(stream)) => {
            drop(stream);
            true
        }
        Ok(Err(err)) => {
            trace!(%address, %err, "probe failed");
            false
        }
        Err(_) => {
            trace!(%address, ?limit, "probe timed out");
            false
        }
    }
}
