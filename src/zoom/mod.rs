//! Gesture zoom
//!
//! Pinch and vertical-drag gestures mapped onto the capture device's zoom
//! range, with a self-hiding on-screen indicator.

pub mod controller;
pub mod indicator;

pub use controller::{GestureEvent, ZoomBounds, ZoomController, ZoomSnapshot, DEFAULT_ZOOM};
pub use indicator::{format_zoom_label, ZoomIndicator};
