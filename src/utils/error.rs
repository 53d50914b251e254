//! Error types and handling
//!
//! Common error types used across the capture engine, plus the alert shape
//! handed to the screen layer when an error has to be shown to the user.

use crate::capture::traits::PermissionStatus;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Device control operation that can be rejected by the capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceOp {
    Start,
    Pause,
    Resume,
    Stop,
    Cancel,
}

impl fmt::Display for DeviceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceOp::Start => "start",
            DeviceOp::Pause => "pause",
            DeviceOp::Resume => "resume",
            DeviceOp::Stop => "stop",
            DeviceOp::Cancel => "cancel",
        };
        f.write_str(name)
    }
}

/// Capture-engine error type
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Permission denied (camera: {camera:?}, microphone: {microphone:?})")]
    PermissionDenied {
        camera: PermissionStatus,
        microphone: PermissionStatus,
    },

    #[error("No capture device available: {0}")]
    DeviceUnavailable(String),

    #[error("Device {op} failed: {reason}")]
    DeviceControl { op: DeviceOp, reason: String },

    #[error("Recording error: {0}")]
    Recording(String),

    #[error("Reference media is not ready to play")]
    ReferenceMediaNotReady,

    #[error("Sync invariant violated: {0}")]
    SyncInvariantViolation(String),

    #[error("Cannot {action} while {state}")]
    InvalidTransition { action: &'static str, state: String },

    #[error("Playback error: {0}")]
    Playback(String),

    #[error("Upload handoff failed: {0}")]
    Upload(#[source] anyhow::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CaptureError {
    /// Build a device control failure
    pub fn device(op: DeviceOp, reason: impl Into<String>) -> Self {
        CaptureError::DeviceControl {
            op,
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            CaptureError::PermissionDenied { .. } => "PERMISSION_DENIED",
            CaptureError::DeviceUnavailable(_) => "DEVICE_UNAVAILABLE",
            CaptureError::DeviceControl { .. } => "DEVICE_CONTROL_FAILURE",
            CaptureError::Recording(_) => "RECORDING_ERROR",
            CaptureError::ReferenceMediaNotReady => "REFERENCE_MEDIA_NOT_READY",
            CaptureError::SyncInvariantViolation(_) => "SYNC_INVARIANT_VIOLATION",
            CaptureError::InvalidTransition { .. } => "INVALID_TRANSITION",
            CaptureError::Playback(_) => "PLAYBACK_ERROR",
            CaptureError::Upload(_) => "UPLOAD_ERROR",
            CaptureError::Config(_) => "CONFIG_ERROR",
            CaptureError::Io(_) => "IO_ERROR",
            CaptureError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Whether the user should see this error at all.
    ///
    /// A start request racing the reference video load is silently dropped.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, CaptureError::ReferenceMediaNotReady)
    }
}

/// Action offered to the user alongside an error alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AlertAction {
    Retry,
    OpenSettings,
    Cancel,
}

/// Error alert for the screen layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorAlert {
    pub code: String,
    pub message: String,
    pub actions: Vec<AlertAction>,
}

impl From<&CaptureError> for ErrorAlert {
    fn from(error: &CaptureError) -> Self {
        let actions = match error {
            CaptureError::PermissionDenied { .. } => {
                vec![AlertAction::OpenSettings, AlertAction::Cancel]
            }
            // No retry: the screen cannot recover without a device
            CaptureError::DeviceUnavailable(_) => vec![AlertAction::Cancel],
            CaptureError::DeviceControl { .. }
            | CaptureError::Recording(_)
            | CaptureError::Playback(_) => {
                vec![AlertAction::Retry, AlertAction::Cancel]
            }
            CaptureError::Upload(_) => vec![AlertAction::Retry, AlertAction::Cancel],
            _ => vec![AlertAction::Cancel],
        };

        ErrorAlert {
            code: error.code().to_string(),
            message: error.to_string(),
            actions,
        }
    }
}

impl From<CaptureError> for ErrorAlert {
    fn from(error: CaptureError) -> Self {
        ErrorAlert::from(&error)
    }
}

/// Result type alias using CaptureError
pub type CaptureResult<T> = Result<T, CaptureError>;
