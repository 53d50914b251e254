//! Duet capture
//!
//! Recording against a reference video: layout geometry, the capture/
//! reference synchronization controller, and joint review playback.

pub mod layout;
pub mod review;
pub mod sync;

pub use layout::{Composition, DuetLayout, Rect};
pub use review::ReviewPlaybackSync;
pub use sync::{DuetHandoff, DuetSyncController};
