//! Accept loop handing each inbound connection to its own relay session

use crate::session::RelaySession;
use crate::transport::Dialer;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tcp_relay_shared::limits;
use tokio::net::TcpListener;
use tracing::{info, info_span, warn, Instrument};

/// Bound listening socket
pub struct Listener {
    inner: TcpListener,
    next_session_id: AtomicU64,
}

impl Listener {
    /// Bind the local port; failure here is fatal for the process
    pub async fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        let inner = TcpListener::bind(addr).await?;
        Ok(Self {
            inner,
            next_session_id: AtomicU64::new(1),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Accept connections forever, spawning a session for each
    pub async fn run<D: Dialer>(self, dialer: Arc<D>) {
        let accept_error_delay = Duration::from_millis(limits::ACCEPT_ERROR_DELAY_MS);

        loop {
            match self.inner.accept().await {
                Ok((stream, peer)) => {
                    let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
                    let span = info_span!("session", id, %peer);
                    span.in_scope(|| info!("accepted connection"));

                    if let Err(e) = stream.set_nodelay(true) {
                        span.in_scope(|| warn!(error = %e, "cannot set TCP_NODELAY"));
                    }

                    let session = RelaySession::new(id, peer, stream, dialer.clone());
                    tokio::spawn(session.run().instrument(span));
                }
                Err(e) => {
                    // Per-connection failure; keep serving everyone else
                    warn!(error = %e, "accept failed");
                    tokio::time::sleep(accept_error_delay).await;
                }
            }
        }
    }
}
