//! duet-capture - press-and-hold video capture and duet synchronization.
//!
//! The engine drives a capture device through the recording state machine,
//! keeps a reference video in lockstep for duets, maps gestures onto zoom,
//! and hands finished media to an upload collaborator. Platform camera,
//! permission, playback and upload implementations plug in through the
//! traits in [`capture`] and [`handoff`].

pub mod capture;
pub mod config;
pub mod duet;
pub mod handoff;
pub mod recorder;
pub mod utils;
pub mod zoom;

#[cfg(any(test, feature = "test-harness"))]
pub mod testing;

pub use config::CaptureConfig;
pub use duet::{DuetHandoff, DuetLayout, DuetSyncController, ReviewPlaybackSync};
pub use handoff::{UploadCollaborator, UploadPayload};
pub use recorder::{CaptureMode, RecordingEvent, RecordingSession, SessionDriver, SessionHandle, SessionState};
pub use utils::error::{CaptureError, CaptureResult, ErrorAlert};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging for the host application
pub fn init_tracing() {
    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "duet_capture=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    // A host that installed its own subscriber keeps it
    if result.is_ok() {
        tracing::info!("duet-capture v{}", env!("CARGO_PKG_VERSION"));
    }
}
