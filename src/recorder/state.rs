//! Recording state management
//!
//! Defines the recording state machine and the output of a finished capture.

use crate::capture::traits::MediaLocator;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Current state of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No recording in progress
    #[default]
    Idle,
    /// Currently recording
    Recording,
    /// Recording is paused (duet flow only)
    Paused,
    /// Stop requested, waiting for the device to hand over the file
    Finalizing,
    /// Recording completed and handed off
    Finished,
    /// Recording discarded by the user
    Cancelled,
    /// Device reported a failure; needs a reset before the next attempt
    Errored,
}

impl SessionState {
    /// Recording or paused: the device holds an unfinished recording
    pub fn is_capturing(&self) -> bool {
        matches!(self, SessionState::Recording | SessionState::Paused)
    }

    /// No further transitions except a reset
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Finished | SessionState::Cancelled)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Recording => "recording",
            SessionState::Paused => "paused",
            SessionState::Finalizing => "finalizing",
            SessionState::Finished => "finished",
            SessionState::Cancelled => "cancelled",
            SessionState::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Which capture screen owns the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// Single post: hold to record, release to stop
    Standalone,
    /// Duet: release pauses, explicit finish stops
    Duet,
}

impl CaptureMode {
    /// Whether releasing the hold gesture pauses instead of stopping
    pub fn supports_pause(&self) -> bool {
        matches!(self, CaptureMode::Duet)
    }
}

/// Outcome of a control request on the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The session moved to the given state
    Applied(SessionState),
    /// The request was dropped without touching the device
    Ignored,
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied(_))
    }
}

/// Result of a cancel request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Recorded content exists; ask the user before discarding it
    NeedsConfirmation,
    /// The session is now cancelled
    Cancelled,
    /// Nothing to cancel
    Ignored,
}

/// Result of a completed capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureOutput {
    /// Session that produced this capture
    pub session_id: Uuid,

    /// Media produced by the device
    pub captured: MediaLocator,

    /// Active recording time, excluding pauses
    pub total_active_duration_ms: u64,

    /// Number of pause/resume cycles
    pub pause_count: usize,

    /// Wall-clock time the recording first started
    pub started_at: DateTime<Utc>,

    /// Wall-clock time the device handed over the file
    pub finished_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_classification() {
        assert!(SessionState::Recording.is_capturing());
        assert!(SessionState::Paused.is_capturing());
        assert!(!SessionState::Finalizing.is_capturing());
        assert!(SessionState::Cancelled.is_terminal());
        assert!(!SessionState::Errored.is_terminal());
    }

    #[test]
    fn test_state_serializes_lowercase() {
        let json = serde_json::to_string(&SessionState::Finalizing).unwrap();
        assert_eq!(json, "\"finalizing\"");
    }

    #[test]
    fn test_only_duet_pauses() {
        assert!(CaptureMode::Duet.supports_pause());
        assert!(!CaptureMode::Standalone.supports_pause());
    }
}
