//! Capture permission handling
//!
//! Recording needs both camera and microphone access. "Not yet asked" and
//! "denied" are kept apart so the screen can decide between prompting and
//! sending the user to system settings.

use super::traits::{PermissionKind, PermissionProvider, PermissionStatus};
use crate::utils::error::{CaptureError, CaptureResult};
use serde::{Deserialize, Serialize};

/// Camera and microphone grant state at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSnapshot {
    pub camera: PermissionStatus,
    pub microphone: PermissionStatus,
}

impl PermissionSnapshot {
    /// Read the current state from a provider without prompting
    pub fn current(provider: &dyn PermissionProvider) -> Self {
        Self {
            camera: provider.status(PermissionKind::Camera),
            microphone: provider.status(PermissionKind::Microphone),
        }
    }

    /// Both permissions granted
    pub fn all_granted(&self) -> bool {
        self.camera.is_granted() && self.microphone.is_granted()
    }

    /// Any permission explicitly denied (prompting again will not help)
    pub fn any_denied(&self) -> bool {
        self.camera == PermissionStatus::Denied || self.microphone == PermissionStatus::Denied
    }

    /// Turn a non-granted snapshot into an error
    pub fn ensure_granted(self) -> CaptureResult<()> {
        if self.all_granted() {
            Ok(())
        } else {
            Err(CaptureError::PermissionDenied {
                camera: self.camera,
                microphone: self.microphone,
            })
        }
    }
}

/// Check that capture is allowed without prompting
pub fn ensure_capture_permissions(provider: &dyn PermissionProvider) -> CaptureResult<()> {
    PermissionSnapshot::current(provider).ensure_granted()
}

/// Prompt for every permission that has not been decided yet.
///
/// Permissions already denied are not requested again; the user has to go
/// through system settings for those.
pub async fn request_capture_permissions(provider: &dyn PermissionProvider) -> PermissionSnapshot {
    let mut snapshot = PermissionSnapshot::current(provider);

    if snapshot.camera == PermissionStatus::NotDetermined {
        snapshot.camera = provider.request(PermissionKind::Camera).await;
    }
    if snapshot.microphone == PermissionStatus::NotDetermined {
        snapshot.microphone = provider.request(PermissionKind::Microphone).await;
    }

    if !snapshot.all_granted() {
        tracing::warn!(
            "Capture permissions not granted (camera: {:?}, microphone: {:?})",
            snapshot.camera,
            snapshot.microphone
        );
    }
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticPermissions;

    #[test]
    fn test_missing_microphone_is_rejected() {
        let provider = StaticPermissions::new(PermissionStatus::Granted, PermissionStatus::NotDetermined);
        let err = ensure_capture_permissions(&provider).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::PermissionDenied {
                microphone: PermissionStatus::NotDetermined,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_request_prompts_only_undecided() {
        let provider = StaticPermissions::new(PermissionStatus::NotDetermined, PermissionStatus::Denied)
            .grant_on_request();
        let snapshot = request_capture_permissions(&provider).await;

        assert_eq!(snapshot.camera, PermissionStatus::Granted);
        assert_eq!(snapshot.microphone, PermissionStatus::Denied);
        assert!(snapshot.any_denied());
        assert_eq!(provider.request_count(), 1);
    }
}
