//! Gesture-driven zoom
//!
//! Two gesture channels feed one clamped zoom value: pinch anywhere on the
//! preview, and a vertical drag layered on the hold-to-record button. The
//! gesture layer serializes events before they reach the controller, so
//! the two channels never mutate the value on the same frame.

use super::indicator::{format_zoom_label, ZoomIndicator};
use crate::capture::traits::DeviceCapabilities;
use crate::config::{ZoomSettings, HARD_MAX_ZOOM};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;

/// Default zoom, restored on double tap
pub const DEFAULT_ZOOM: f64 = 1.0;

/// Zoom range after applying the hard ceiling
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoomBounds {
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl ZoomBounds {
    /// Device range, with `max_zoom` capped at `hard_max`, never above
    /// [`HARD_MAX_ZOOM`]
    pub fn from_capabilities(capabilities: DeviceCapabilities, hard_max: f64) -> Self {
        let hard_max = hard_max.min(HARD_MAX_ZOOM);
        let max_zoom = if capabilities.max_zoom.is_finite() {
            capabilities.max_zoom.min(hard_max)
        } else {
            hard_max
        };
        let min_zoom = if capabilities.min_zoom.is_finite() && capabilities.min_zoom > 0.0 {
            capabilities.min_zoom.min(max_zoom)
        } else {
            DEFAULT_ZOOM.min(max_zoom)
        };
        Self { min_zoom, max_zoom }
    }

    pub fn clamp(&self, zoom: f64) -> f64 {
        zoom.clamp(self.min_zoom, self.max_zoom)
    }

    /// Linear position in the range, `t` in `[0, 1]`
    fn lerp(&self, t: f64) -> f64 {
        self.min_zoom + t.clamp(0.0, 1.0) * (self.max_zoom - self.min_zoom)
    }
}

/// One serialized gesture event from the gesture layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    PinchBegin,
    PinchUpdate { scale: f64 },
    PinchEnd,
    DragBegin { origin_y: f64 },
    DragUpdate { y: f64 },
    DragEnd,
    DoubleTap,
    /// Hold-to-record engaged or released; arms the drag channel
    RecordHeld(bool),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ActiveGesture {
    None,
    Pinch { baseline: f64 },
    Drag { origin_y: f64, top_y: f64 },
}

/// Value published to the render layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoomSnapshot {
    pub zoom: f64,
    pub label: String,
    pub indicator_visible: bool,
}

/// Translates gestures into a clamped zoom value plus indicator state
pub struct ZoomController {
    bounds: ZoomBounds,
    current: f64,
    gesture: ActiveGesture,
    record_held: bool,
    drag_top_ratio: f64,
    indicator: ZoomIndicator,
    snapshot_tx: watch::Sender<ZoomSnapshot>,
}

impl ZoomController {
    pub fn new(capabilities: DeviceCapabilities, settings: &ZoomSettings) -> Self {
        let bounds = ZoomBounds::from_capabilities(capabilities, settings.hard_max_zoom);
        let current = bounds.clamp(DEFAULT_ZOOM);
        let (snapshot_tx, _) = watch::channel(ZoomSnapshot {
            zoom: current,
            label: format_zoom_label(current),
            indicator_visible: false,
        });

        Self {
            bounds,
            current,
            gesture: ActiveGesture::None,
            record_held: false,
            drag_top_ratio: settings.drag_top_ratio,
            indicator: ZoomIndicator::new(settings.indicator_timeout()),
            snapshot_tx,
        }
    }

    /// Subscribe to zoom/indicator changes
    pub fn subscribe(&self) -> watch::Receiver<ZoomSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn current_zoom(&self) -> f64 {
        self.current
    }

    pub fn bounds(&self) -> ZoomBounds {
        self.bounds
    }

    pub fn indicator_visible(&self) -> bool {
        self.indicator.is_visible()
    }

    pub fn label(&self) -> String {
        format_zoom_label(self.current)
    }

    pub fn snapshot(&self) -> ZoomSnapshot {
        ZoomSnapshot {
            zoom: self.current,
            label: self.label(),
            indicator_visible: self.indicator.is_visible(),
        }
    }

    /// Adopt a new device range (e.g. after switching cameras)
    pub fn set_capabilities(&mut self, capabilities: DeviceCapabilities, hard_max: f64, now: Instant) {
        self.bounds = ZoomBounds::from_capabilities(capabilities, hard_max);
        self.gesture = ActiveGesture::None;
        let clamped = self.bounds.clamp(self.current);
        if clamped != self.current {
            self.apply(clamped, now);
        }
    }

    /// Dispatch a queued gesture event
    pub fn handle(&mut self, event: GestureEvent, now: Instant) {
        match event {
            GestureEvent::PinchBegin => self.on_pinch_begin(),
            GestureEvent::PinchUpdate { scale } => self.on_pinch_update(scale, now),
            GestureEvent::PinchEnd => self.on_pinch_end(),
            GestureEvent::DragBegin { origin_y } => {
                self.on_drag_begin(origin_y);
            }
            GestureEvent::DragUpdate { y } => self.on_drag_update(y, now),
            GestureEvent::DragEnd => self.on_drag_end(),
            GestureEvent::DoubleTap => self.on_double_tap(now),
            GestureEvent::RecordHeld(held) => self.set_record_held(held),
        }
    }

    pub fn on_pinch_begin(&mut self) {
        if matches!(self.gesture, ActiveGesture::Drag { .. }) {
            tracing::debug!("Ignoring pinch while drag zoom is active");
            return;
        }
        self.gesture = ActiveGesture::Pinch {
            baseline: self.current,
        };
    }

    /// `zoom = clamp(baseline * scale)`
    pub fn on_pinch_update(&mut self, scale: f64, now: Instant) {
        if !scale.is_finite() {
            return;
        }
        let baseline = match self.gesture {
            ActiveGesture::Pinch { baseline } => baseline,
            ActiveGesture::Drag { .. } => return,
            // Update without a begin: start from the current value
            ActiveGesture::None => {
                self.gesture = ActiveGesture::Pinch {
                    baseline: self.current,
                };
                self.current
            }
        };
        self.apply(baseline * scale, now);
    }

    pub fn on_pinch_end(&mut self) {
        if matches!(self.gesture, ActiveGesture::Pinch { .. }) {
            self.gesture = ActiveGesture::None;
        }
    }

    /// Arm the vertical drag. Only accepted while recording is held.
    pub fn on_drag_begin(&mut self, origin_y: f64) -> bool {
        if !self.record_held {
            tracing::debug!("Ignoring drag zoom: record button not held");
            return false;
        }
        if matches!(self.gesture, ActiveGesture::Pinch { .. }) || !origin_y.is_finite() {
            return false;
        }
        self.gesture = ActiveGesture::Drag {
            origin_y,
            top_y: origin_y * self.drag_top_ratio,
        };
        true
    }

    /// Map the vertical position between origin and top onto the zoom range
    pub fn on_drag_update(&mut self, y: f64, now: Instant) {
        let ActiveGesture::Drag { origin_y, top_y } = self.gesture else {
            return;
        };
        if !self.record_held || !y.is_finite() {
            return;
        }
        let span = origin_y - top_y;
        if span <= f64::EPSILON {
            return;
        }
        // Upward drag (smaller y) zooms in
        let t = (origin_y - y) / span;
        let zoom = self.bounds.lerp(t);
        self.apply(zoom, now);
    }

    pub fn on_drag_end(&mut self) {
        if matches!(self.gesture, ActiveGesture::Drag { .. }) {
            self.gesture = ActiveGesture::None;
        }
    }

    /// Reset to 1x, overriding any gesture in flight
    pub fn on_double_tap(&mut self, now: Instant) {
        self.gesture = ActiveGesture::None;
        self.apply(DEFAULT_ZOOM, now);
    }

    pub fn set_record_held(&mut self, held: bool) {
        self.record_held = held;
        if !held {
            self.on_drag_end();
        }
    }

    /// Expire the indicator; call once per animation frame
    pub fn tick(&mut self, now: Instant) {
        if self.indicator.refresh(now) {
            self.publish();
        }
    }

    fn apply(&mut self, zoom: f64, now: Instant) {
        self.current = self.bounds.clamp(zoom);
        self.indicator.show(now);
        self.publish();
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn controller(min_zoom: f64, max_zoom: f64) -> ZoomController {
        ZoomController::new(DeviceCapabilities { min_zoom, max_zoom }, &ZoomSettings::default())
    }

    #[test]
    fn test_max_zoom_capped_at_hard_ceiling() {
        let zoom = controller(1.0, 100.0);
        assert_eq!(zoom.bounds().max_zoom, 20.0);
        assert_eq!(zoom.current_zoom(), 1.0);
    }

    #[test]
    fn test_oversized_setting_cannot_lift_ceiling() {
        let settings = ZoomSettings {
            hard_max_zoom: 50.0,
            ..ZoomSettings::default()
        };
        let mut zoom = ZoomController::new(DeviceCapabilities { min_zoom: 1.0, max_zoom: 100.0 }, &settings);
        assert_eq!(zoom.bounds().max_zoom, HARD_MAX_ZOOM);

        zoom.on_pinch_begin();
        zoom.on_pinch_update(1000.0, Instant::now());
        assert_eq!(zoom.current_zoom(), HARD_MAX_ZOOM);
    }

    #[test]
    fn test_pinch_stays_in_bounds_for_any_scale() {
        let now = Instant::now();
        let scales = [0.0, 0.01, 0.3, 0.5, 0.99, 1.0, 1.01, 2.0, 3.7, 10.0, 25.0, 1e6, -1.0];
        for &baseline in &[1.0, 2.5, 8.0] {
            for &scale in &scales {
                let mut zoom = controller(0.5, 16.0);
                zoom.on_pinch_begin();
                zoom.on_pinch_update(baseline, now);
                zoom.on_pinch_end();

                let start = zoom.current_zoom();
                zoom.on_pinch_begin();
                zoom.on_pinch_update(scale, now);

                let bounds = zoom.bounds();
                assert!(zoom.current_zoom() >= bounds.min_zoom);
                assert!(zoom.current_zoom() <= bounds.max_zoom);
                assert_eq!(zoom.current_zoom(), bounds.clamp(start * scale));
            }
        }
    }

    #[test]
    fn test_pinch_is_relative_to_gesture_baseline() {
        let now = Instant::now();
        let mut zoom = controller(1.0, 10.0);
        zoom.on_pinch_begin();
        zoom.on_pinch_update(2.0, now);
        zoom.on_pinch_update(3.0, now);
        assert_eq!(zoom.current_zoom(), 3.0);
        zoom.on_pinch_end();

        zoom.on_pinch_begin();
        zoom.on_pinch_update(2.0, now);
        assert_eq!(zoom.current_zoom(), 6.0);
    }

    #[test]
    fn test_double_tap_after_max_pinch() {
        let now = Instant::now();
        let mut zoom = controller(1.0, 20.0);
        zoom.on_pinch_begin();
        zoom.on_pinch_update(50.0, now);
        assert_eq!(zoom.current_zoom(), 20.0);

        zoom.on_double_tap(now);
        assert_eq!(zoom.current_zoom(), 1.0);

        // The interrupted pinch no longer applies its old baseline
        zoom.on_pinch_update(2.0, now);
        assert_eq!(zoom.current_zoom(), 2.0);
    }

    #[test]
    fn test_drag_requires_record_held() {
        let now = Instant::now();
        let mut zoom = controller(1.0, 10.0);
        assert!(!zoom.on_drag_begin(800.0));
        zoom.on_drag_update(560.0, now);
        assert_eq!(zoom.current_zoom(), 1.0);
        assert!(!zoom.indicator_visible());
    }

    #[test]
    fn test_drag_maps_span_inverted_and_clamped() {
        let now = Instant::now();
        let mut zoom = controller(1.0, 11.0);
        zoom.set_record_held(true);
        assert!(zoom.on_drag_begin(1000.0));

        // Top reference point is 70% of the origin
        zoom.on_drag_update(700.0, now);
        assert_eq!(zoom.current_zoom(), 11.0);

        zoom.on_drag_update(850.0, now);
        assert!((zoom.current_zoom() - 6.0).abs() < 1e-9);

        zoom.on_drag_update(1000.0, now);
        assert_eq!(zoom.current_zoom(), 1.0);

        // No extrapolation past either reference point
        zoom.on_drag_update(100.0, now);
        assert_eq!(zoom.current_zoom(), 11.0);
        zoom.on_drag_update(1400.0, now);
        assert_eq!(zoom.current_zoom(), 1.0);
    }

    #[test]
    fn test_releasing_hold_ends_drag() {
        let now = Instant::now();
        let mut zoom = controller(1.0, 11.0);
        zoom.handle(GestureEvent::RecordHeld(true), now);
        zoom.handle(GestureEvent::DragBegin { origin_y: 1000.0 }, now);
        zoom.handle(GestureEvent::DragUpdate { y: 850.0 }, now);
        zoom.handle(GestureEvent::RecordHeld(false), now);
        zoom.handle(GestureEvent::DragUpdate { y: 700.0 }, now);
        assert!((zoom.current_zoom() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_pinch_ignored_during_drag() {
        let now = Instant::now();
        let mut zoom = controller(1.0, 11.0);
        zoom.set_record_held(true);
        zoom.on_drag_begin(1000.0);
        zoom.on_pinch_begin();
        zoom.on_pinch_update(5.0, now);
        assert_eq!(zoom.current_zoom(), 1.0);
    }

    #[test]
    fn test_indicator_shows_then_fades() {
        let t0 = Instant::now();
        let mut zoom = controller(1.0, 10.0);
        let rx = zoom.subscribe();

        zoom.on_pinch_begin();
        zoom.on_pinch_update(2.0, t0);
        assert!(rx.borrow().indicator_visible);
        assert_eq!(rx.borrow().label, "2.0x");

        zoom.tick(t0 + Duration::from_millis(1900));
        assert!(zoom.indicator_visible());

        zoom.on_pinch_update(2.2, t0 + Duration::from_millis(1900));
        zoom.tick(t0 + Duration::from_millis(3000));
        assert!(zoom.indicator_visible());

        zoom.tick(t0 + Duration::from_millis(3900));
        assert!(!zoom.indicator_visible());
        assert!(!rx.borrow().indicator_visible);
    }

    #[test]
    fn test_switching_device_reclamps() {
        let now = Instant::now();
        let mut zoom = controller(1.0, 10.0);
        zoom.on_pinch_update(8.0, now);
        zoom.set_capabilities(DeviceCapabilities { min_zoom: 1.0, max_zoom: 4.0 }, 20.0, now);
        assert_eq!(zoom.current_zoom(), 4.0);
    }
}
