//! Error taxonomy for the relay
//!
//! Only [`ConfigError`] is fatal. Dial and copy errors stay inside the session
//! that hit them.

use std::io;
use thiserror::Error;

/// Setup errors that terminate the process
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot resolve {addr}: {source}")]
    Resolve {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("no address found for {0}")]
    NoAddress(String),

    #[error("invalid port {0:?}")]
    InvalidPort(String),
}

/// Failure to open the outbound connection of a session
#[derive(Error, Debug)]
pub enum DialError {
    #[error("cannot resolve {addr}: {source}")]
    Resolve {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("no address found for {0}")]
    NoAddress(String),

    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
}

/// Failure that stops one copy direction
#[derive(Error, Debug)]
pub enum CopyError {
    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    #[error("half-close failed: {0}")]
    Shutdown(#[source] io::Error),

    #[error("copy task ended without reporting")]
    Aborted,
}
