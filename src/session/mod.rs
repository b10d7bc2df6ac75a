//! Relay sessions
//!
//! This module handles:
//! - Dialing the remote for each accepted client
//! - Running one copy task per direction with half-close
//! - Joining both directions before closing either connection

mod copy;
mod relay;

pub use relay::RelaySession;
