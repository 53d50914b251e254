//! Upload handoff
//!
//! The capture engine never compresses or uploads anything itself. It builds
//! the payload below and passes it to the upload collaborator.

use crate::capture::traits::MediaLocator;
use crate::duet::layout::DuetLayout;
use crate::recorder::state::CaptureOutput;
use crate::utils::error::{CaptureError, CaptureResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What the upload pipeline receives for one post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPayload {
    pub captured_media_locator: MediaLocator,

    /// Present for duets only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_media_locator: Option<MediaLocator>,

    /// Present for duets only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<DuetLayout>,

    pub total_active_duration_ms: u64,
}

impl UploadPayload {
    /// Payload for a standalone post
    pub fn standalone(output: &CaptureOutput) -> Self {
        Self {
            captured_media_locator: output.captured.clone(),
            reference_media_locator: None,
            layout: None,
            total_active_duration_ms: output.total_active_duration_ms,
        }
    }

    pub fn is_duet(&self) -> bool {
        self.reference_media_locator.is_some()
    }
}

/// Compression, transcoding and network submission live behind this trait
#[async_trait]
pub trait UploadCollaborator: Send + Sync {
    async fn submit(&self, payload: UploadPayload) -> anyhow::Result<()>;
}

/// Hand a payload to the uploader
pub async fn submit_payload(
    uploader: &dyn UploadCollaborator,
    payload: UploadPayload,
) -> CaptureResult<()> {
    tracing::info!(
        "Handing off {} to upload (duet: {}, {}ms)",
        payload.captured_media_locator,
        payload.is_duet(),
        payload.total_active_duration_ms
    );
    uploader.submit(payload).await.map_err(CaptureError::Upload)
}
