//! Command-line surface: `<program> <local_port> <server_host> <server_port>`
//!
//! Anything other than exactly three positional arguments is a usage error,
//! `--help` and `--version` included.

use anyhow::Context;
use clap::Parser;
use tcp_relay_shared::{parse_port, ProxyConfig};

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(disable_help_flag = true, disable_version_flag = true)]
pub struct Args {
    /// Port to listen on, on all interfaces
    pub local_port: String,
    /// Host to forward connections to
    pub server_host: String,
    /// Port on the remote host
    pub server_port: String,
}

impl Args {
    /// Validate the ports; a bad port is a setup failure, not a usage error
    pub fn into_config(self) -> anyhow::Result<ProxyConfig> {
        let local_port = parse_port(&self.local_port).context("Error in resolve local")?;
        let server_port = parse_port(&self.server_port).context("Error in resolve remote")?;
        Ok(ProxyConfig::new(local_port, self.server_host, server_port))
    }
}

/// Malformed invocation; print usage and exit 2
#[derive(Debug, PartialEq, Eq)]
pub struct UsageError;

pub fn usage(program: &str) -> String {
    format!("Usage: {} <local_port> <server_host> <server_port>", program)
}

/// Parse arguments (including the program name)
pub fn parse_from<I, T>(args: I) -> Result<Args, UsageError>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Args::try_parse_from(args).map_err(|_| UsageError)
}
