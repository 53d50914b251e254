//! Recording system module
//!
//! - RecordingSession state machine over one capture device
//! - DurationTracker for pause-aware timing and auto-stop
//! - SessionDriver running a session on its own task

pub mod coordinator;
pub mod duration;
pub mod session;
pub mod state;

pub use coordinator::{SessionDriver, SessionHandle};
pub use duration::{format_timer, AutoStopLatch, DurationTracker, PauseInterval, TimerDisplay};
pub use session::{RecordingEvent, RecordingSession, CONFIRM_CANCEL_AFTER};
pub use state::{CancelOutcome, CaptureMode, CaptureOutput, SessionState, Transition};
