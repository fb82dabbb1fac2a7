//! Per-send turn tracking.
//!
//! Each call to send a message starts a turn that moves
//! `Idle -> Sending -> Streaming -> Complete | Error` exactly once.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a turn.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnId(pub String);

impl TurnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where the most recent turn is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum TurnState {
    /// No turn has run, or the last one was cancelled.
    Idle,
    /// Request issued, response not yet open.
    Sending,
    /// Response open, events arriving.
    Streaming,
    /// Finished normally.
    Complete,
    /// Finished with an error.
    Error { message: String },
}

impl TurnState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Complete | TurnState::Error { .. })
    }

    pub fn is_active(&self) -> bool {
        matches!(self, TurnState::Sending | TurnState::Streaming)
    }
}
