//! Proxy configuration and remote endpoint

use crate::ConfigError;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};

/// Parse a decimal port number given on the command line
pub fn parse_port(value: &str) -> Result<u16, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidPort(value.to_string()))
}

/// Immutable relay configuration, built once from the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Port to listen on, on all interfaces
    pub local_port: u16,
    /// Host to forward to (name or IP literal)
    pub remote_host: String,
    /// Port to forward to
    pub remote_port: u16,
}

impl ProxyConfig {
    pub fn new(local_port: u16, remote_host: impl Into<String>, remote_port: u16) -> Self {
        Self {
            local_port,
            remote_host: remote_host.into(),
            remote_port,
        }
    }

    /// Wildcard address the listener binds to
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.local_port))
    }

    /// `host:port` of the remote, with IPv6 literals bracketed
    pub fn remote_authority(&self) -> String {
        let host = self.remote_host.as_str();
        if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, self.remote_port)
        } else {
            format!("{}:{}", host, self.remote_port)
        }
    }
}

/// Where the dialer connects to
///
/// Resolution is attempted once at startup. A remote that could not be
/// resolved then stays `Unresolved` and is looked up again on every dial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Resolved(SocketAddr),
    Unresolved(String),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Resolved(addr) => write!(f, "{}", addr),
            Endpoint::Unresolved(authority) => write!(f, "{}", authority),
        }
    }
}
