//! Dialer abstraction for opening the outbound leg of a session

use async_trait::async_trait;
use tcp_relay_shared::DialError;
use tokio::net::TcpStream;

/// Opens one outbound connection per call
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    /// Attempt to connect, returning the stream on success
    async fn dial(&self) -> Result<TcpStream, DialError>;

    /// Human-readable target for log lines
    fn name(&self) -> String;
}
