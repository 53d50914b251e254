//! Capture collaborators
//!
//! Traits for the capture device, permissions and playback, plus the
//! permission checks that gate every recording.

pub mod permissions;
pub mod traits;

// Re-export traits
pub use traits::{
    CameraFacing, CaptureDevice, DeviceCapabilities, DeviceEvent, DeviceEventSender, DeviceProvider,
    FlashMode, MediaLocator, PermissionKind, PermissionProvider, PermissionStatus, PlaybackHandle,
    PlaybackStatus, RecordingOptions,
};

pub use permissions::{ensure_capture_permissions, request_capture_permissions, PermissionSnapshot};
