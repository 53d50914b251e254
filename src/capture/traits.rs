//! Capture trait definitions
//!
//! Platform-agnostic traits for the collaborators the engine drives: the
//! camera/microphone capture device, the permission provider and the media
//! playback handle used for the reference video.

use crate::utils::error::CaptureResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;

/// Which camera to capture from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    #[default]
    Front,
    Back,
}

/// Flash/torch mode while recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FlashMode {
    #[default]
    Off,
    On,
}

/// Opaque reference to a media file produced or consumed by a collaborator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaLocator(String);

impl MediaLocator {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Zoom range reported by a capture device
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCapabilities {
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            min_zoom: 1.0,
            max_zoom: 1.0,
        }
    }
}

/// Options passed to the device when a recording starts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingOptions {
    pub camera_facing: CameraFacing,
    pub flash_mode: FlashMode,
    /// Hard ceiling the device may use to stop on its own
    pub max_duration_seconds: u32,
}

/// Asynchronous callback from the capture device.
///
/// These arrive independently of the control call that caused them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// Recording finalized and the media file is available
    Finished(MediaLocator),
    /// Recording failed
    Error(String),
}

/// Channel the device uses to report completion and errors
pub type DeviceEventSender = mpsc::UnboundedSender<DeviceEvent>;

/// Camera/microphone capture device.
///
/// Every control call may fail; callers never retry on their own.
#[async_trait]
pub trait CaptureDevice: Send {
    /// Human-readable device identifier
    fn id(&self) -> &str;

    /// Zoom range supported by this device
    fn capabilities(&self) -> DeviceCapabilities;

    /// Apply a zoom factor. Called every animation frame.
    fn set_zoom(&mut self, zoom: f64);

    /// Begin recording. Completion is reported on `events`.
    async fn start_recording(
        &mut self,
        options: RecordingOptions,
        events: DeviceEventSender,
    ) -> Result<(), String>;

    async fn pause_recording(&mut self) -> Result<(), String>;

    async fn resume_recording(&mut self) -> Result<(), String>;

    /// Stop and finalize. The media locator arrives as [`DeviceEvent::Finished`].
    async fn stop_recording(&mut self) -> Result<(), String>;

    /// Abort the recording without producing a file
    async fn cancel_recording(&mut self) -> Result<(), String>;
}

/// Resolves a capture device for a camera facing
pub trait DeviceProvider: Send + Sync {
    /// `None` when no usable device exists for `facing`
    fn device_for(&self, facing: CameraFacing) -> Option<Box<dyn CaptureDevice>>;
}

/// Permission kinds required for capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionKind {
    Camera,
    Microphone,
}

/// Grant state of a single permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionStatus {
    NotDetermined,
    Granted,
    Denied,
}

impl PermissionStatus {
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionStatus::Granted)
    }
}

/// Camera and microphone permission provider
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    /// Current grant state without prompting
    fn status(&self, kind: PermissionKind) -> PermissionStatus;

    /// Prompt the user if needed and return the resulting state
    async fn request(&self, kind: PermissionKind) -> PermissionStatus;
}

/// Readiness of a playback handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackStatus {
    /// Still loading, first frame not available
    Loading,
    /// Loaded and able to play
    Ready,
    /// Reached the natural end of the media
    Ended,
    /// Failed to load
    Failed(String),
}

impl PlaybackStatus {
    /// Loaded enough to play or seek
    pub fn is_ready(&self) -> bool {
        matches!(self, PlaybackStatus::Ready | PlaybackStatus::Ended)
    }
}

/// Media playback handle for the reference video and review streams
#[async_trait]
pub trait PlaybackHandle: Send {
    fn locator(&self) -> &MediaLocator;

    fn status(&self) -> PlaybackStatus;

    fn is_playing(&self) -> bool;

    fn current_time(&self) -> Duration;

    /// Set the current playback position
    async fn seek(&mut self, position: Duration) -> CaptureResult<()>;

    async fn play(&mut self) -> CaptureResult<()>;

    async fn pause(&mut self) -> CaptureResult<()>;
}
