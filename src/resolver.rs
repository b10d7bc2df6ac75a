//! Address resolution on top of the platform resolver

use std::net::SocketAddr;
use tcp_relay_shared::{ConfigError, DialError, Endpoint, ProxyConfig};
use tokio::net::lookup_host;
use tracing::{debug, warn};

/// Resolve the address the listener binds to
pub async fn resolve_local(config: &ProxyConfig) -> Result<SocketAddr, ConfigError> {
    let addr = config.listen_addr();
    let mut addrs = lookup_host(addr).await.map_err(|source| ConfigError::Resolve {
        addr: addr.to_string(),
        source,
    })?;
    addrs
        .next()
        .ok_or_else(|| ConfigError::NoAddress(addr.to_string()))
}

/// Resolve the remote once; fall back to per-dial lookup if that fails
pub async fn resolve_remote(config: &ProxyConfig) -> Endpoint {
    let authority = config.remote_authority();
    let lookup = lookup_host(authority.as_str()).await;
    match lookup {
        Ok(mut addrs) => match addrs.next() {
            Some(addr) => {
                debug!(remote = %authority, resolved = %addr, "resolved remote");
                Endpoint::Resolved(addr)
            }
            None => {
                warn!(remote = %authority, "remote has no address, resolving per connection");
                Endpoint::Unresolved(authority.clone())
            }
        },
        Err(e) => {
            warn!(remote = %authority, error = %e, "cannot resolve remote, resolving per connection");
            Endpoint::Unresolved(authority.clone())
        }
    }
}

/// Candidate addresses for one dial attempt
pub async fn resolve_endpoint(endpoint: &Endpoint) -> Result<Vec<SocketAddr>, DialError> {
    match endpoint {
        Endpoint::Resolved(addr) => Ok(vec![*addr]),
        Endpoint::Unresolved(authority) => {
            let addrs: Vec<SocketAddr> = lookup_host(authority.as_str())
                .await
                .map_err(|source| DialError::Resolve {
                    addr: authority.clone(),
                    source,
                })?
                .collect();
            if addrs.is_empty() {
                return Err(DialError::NoAddress(authority.clone()));
            }
            Ok(addrs)
        }
    }
}
