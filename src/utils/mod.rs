//! Shared utilities

pub mod error;

pub use error::{AlertAction, CaptureError, CaptureResult, DeviceOp, ErrorAlert};
