//! Relay Session State Machine
//!
//! Defines the lifecycle of one client/remote pairing:
//!
//! ```text
//! AwaitingDial --Dialed--> Relaying --DirectionFinished--> Draining --Closed--> Closed
//!       |                                                                        ^
//!       +------------------------------DialFailed--------------------------------+
//! ```
//!
//! `Closed` is only reachable from `Draining` once both directions reported,
//! so connections are never torn down while a copy task is still running.

use crate::Direction;

/// Lifecycle states of a relay session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Inbound accepted, outbound not yet connected
    AwaitingDial,
    /// Both copy tasks running
    Relaying,
    /// At least one copy task finished, waiting for the other
    Draining,
    /// Both connections fully closed
    Closed,
}

/// Events that drive the session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Outbound connection established
    Dialed,
    /// Outbound connection could not be established
    DialFailed,
    /// A copy task reported its outcome
    DirectionFinished(Direction),
    /// Both connections were fully closed
    Closed,
}

/// Result of a state transition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition was valid and state changed (or stayed, for the second direction)
    Success(SessionState),
    /// Transition was invalid from current state
    Invalid { from: SessionState, event: SessionEvent },
}

/// Tracks one session's lifecycle and which directions have finished
#[derive(Debug)]
pub struct SessionStateMachine {
    current_state: SessionState,
    finished: [bool; 2],
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateMachine {
    /// Create a new state machine awaiting the dial
    pub fn new() -> Self {
        Self {
            current_state: SessionState::AwaitingDial,
            finished: [false; 2],
        }
    }

    pub fn state(&self) -> SessionState {
        self.current_state
    }

    /// True once both copy directions have reported
    pub fn both_finished(&self) -> bool {
        self.finished.iter().all(|done| *done)
    }

    pub fn is_closed(&self) -> bool {
        self.current_state == SessionState::Closed
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: SessionEvent) -> TransitionResult {
        match self.get_next_state(&event) {
            Some(state) => {
                if let SessionEvent::DirectionFinished(direction) = event {
                    self.finished[direction.index()] = true;
                }
                self.current_state = state;
                TransitionResult::Success(state)
            }
            None => TransitionResult::Invalid {
                from: self.current_state,
                event,
            },
        }
    }

    /// Get the next state for a given event, if the transition is valid
    fn get_next_state(&self, event: &SessionEvent) -> Option<SessionState> {
        use SessionState::*;

        match (self.current_state, event) {
            (AwaitingDial, SessionEvent::Dialed) => Some(Relaying),
            (AwaitingDial, SessionEvent::DialFailed) => Some(Closed),

            (Relaying, SessionEvent::DirectionFinished(_)) => Some(Draining),

            // Each direction reports once
            (Draining, SessionEvent::DirectionFinished(d)) if !self.finished[d.index()] => {
                Some(Draining)
            }

            (Draining, SessionEvent::Closed) if self.both_finished() => Some(Closed),

            _ => None,
        }
    }
}
