//! TCP dialer for the outbound leg

use crate::resolver::resolve_endpoint;
use crate::transport::traits::Dialer;
use async_trait::async_trait;
use tcp_relay_shared::{DialError, Endpoint};
use tokio::net::TcpStream;
use tracing::debug;

/// Connects to a fixed remote endpoint
pub struct TcpDialer {
    endpoint: Endpoint,
}

impl TcpDialer {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self) -> Result<TcpStream, DialError> {
        let addrs = resolve_endpoint(&self.endpoint).await?;

        // Try each candidate in order, keeping the last failure
        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    // Relay traffic is forwarded as it arrives
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(remote = %addr, error = %e, "cannot set TCP_NODELAY");
                    }
                    return Ok(stream);
                }
                Err(source) => {
                    last_err = Some(DialError::Connect {
                        addr: addr.to_string(),
                        source,
                    });
                }
            }
        }

        Err(last_err.unwrap_or_else(|| DialError::NoAddress(self.endpoint.to_string())))
    }

    fn name(&self) -> String {
        self.endpoint.to_string()
    }
}
