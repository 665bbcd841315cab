//! Session lifecycle states

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of one ritual. `Complete` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    /// No audio loaded
    #[default]
    Idle,
    /// Audio playing, countdown running, interactions accepted
    Active,
    /// Finalizing: source stopped, waiting for the recorder
    Crystallizing,
    /// Artifact ready
    Complete,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Complete)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Active => write!(f, "Active"),
            SessionState::Crystallizing => write!(f, "Crystallizing"),
            SessionState::Complete => write!(f, "Complete"),
        }
    }
}

/// What ended the Active phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    /// The source clip played to its end
    PlaybackEnded,
    /// An explicit end command
    EndCommand,
    /// The countdown reached zero
    CountdownExpired,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::PlaybackEnded => write!(f, "playback ended"),
            EndReason::EndCommand => write!(f, "end command"),
            EndReason::CountdownExpired => write!(f, "countdown expired"),
        }
    }
}
