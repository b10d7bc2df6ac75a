//! tcp-relay Shared Types
//!
//! This crate provides the configuration, session bookkeeping and error types
//! used by the relay runtime.

pub mod config;
pub mod error;
pub mod state_machine;

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

pub use config::{parse_port, Endpoint, ProxyConfig};
pub use error::{ConfigError, CopyError, DialError};
pub use state_machine::{SessionEvent, SessionState, SessionStateMachine, TransitionResult};

/// Tunables for the relay
pub mod limits {
    /// Size of the per-direction copy buffer
    pub const COPY_BUFFER_SIZE: usize = 32 * 1024;

    /// Pause after a failed accept before accepting again
    pub const ACCEPT_ERROR_DELAY_MS: u64 = 100;

    /// Exit status for fatal setup errors (resolve/listen)
    pub const EXIT_FATAL: i32 = 1;

    /// Exit status for a malformed invocation
    pub const EXIT_USAGE: i32 = 2;

    /// Environment variable that enables diagnostic logging
    pub const LOG_ENV_VAR: &str = "LOG";
}

/// Which way bytes flow through a copy task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    ClientToRemote,
    RemoteToClient,
}

impl Direction {
    /// Slot index used when collecting both outcomes of a session
    pub fn index(self) -> usize {
        match self {
            Direction::ClientToRemote => 0,
            Direction::RemoteToClient => 1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ClientToRemote => write!(f, "client->remote"),
            Direction::RemoteToClient => write!(f, "remote->client"),
        }
    }
}

/// Result of one copy task, produced exactly once when it terminates
#[derive(Debug)]
pub struct CopyOutcome {
    pub direction: Direction,
    /// Bytes delivered to the destination before the task stopped
    pub bytes: u64,
    /// Set when the direction stopped on an I/O error instead of end-of-stream
    pub error: Option<CopyError>,
}

impl CopyOutcome {
    /// Outcome of a direction that reached end-of-stream
    pub fn eof(direction: Direction, bytes: u64) -> Self {
        Self {
            direction,
            bytes,
            error: None,
        }
    }

    /// Outcome of a direction that stopped on an error
    pub fn failed(direction: Direction, bytes: u64, error: CopyError) -> Self {
        Self {
            direction,
            bytes,
            error: Some(error),
        }
    }

    /// Outcome for a task that vanished without reporting
    pub fn aborted(direction: Direction) -> Self {
        Self::failed(direction, 0, CopyError::Aborted)
    }

    pub fn is_clean(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary of a finished relay session
#[derive(Debug)]
pub struct SessionReport {
    pub id: u64,
    pub peer: SocketAddr,
    pub client_to_remote: u64,
    pub remote_to_client: u64,
    /// Set when the session never reached relaying
    pub dial_error: Option<DialError>,
    /// Copy errors, at most one per direction
    pub copy_errors: Vec<CopyError>,
    pub elapsed: Duration,
}

impl SessionReport {
    /// Total bytes moved in both directions
    pub fn total(&self) -> u64 {
        self.client_to_remote + self.remote_to_client
    }

    /// True when the session dialed and both directions ended on end-of-stream
    pub fn is_clean(&self) -> bool {
        self.dial_error.is_none() && self.copy_errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_slots_are_distinct() {
        assert_eq!(Direction::ClientToRemote.index(), 0);
        assert_eq!(Direction::RemoteToClient.index(), 1);
        assert_eq!(Direction::ClientToRemote.to_string(), "client->remote");
    }

    #[test]
    fn test_copy_outcome_constructors() {
        let ok = CopyOutcome::eof(Direction::ClientToRemote, 4);
        assert!(ok.is_clean());
        assert_eq!(ok.bytes, 4);

        let aborted = CopyOutcome::aborted(Direction::RemoteToClient);
        assert!(!aborted.is_clean());
        assert_eq!(aborted.bytes, 0);
    }

    #[test]
    fn test_session_report_totals() {
        let report = SessionReport {
            id: 1,
            peer: "127.0.0.1:5000".parse().unwrap(),
            client_to_remote: 4,
            remote_to_client: 6,
            dial_error: None,
            copy_errors: Vec::new(),
            elapsed: Duration::from_millis(3),
        };
        assert_eq!(report.total(), 10);
        assert!(report.is_clean());
    }
}
