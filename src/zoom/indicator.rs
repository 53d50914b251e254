//! Transient zoom indicator
//!
//! Shown the instant zoom changes, hidden after a quiet period with no
//! further change. Every change restarts the quiet period.

use std::time::Duration;
use tokio::time::Instant;

/// Labels below this value all read "1x"
const LABEL_UNITY_THRESHOLD: f64 = 1.5;

#[derive(Debug, Clone)]
pub struct ZoomIndicator {
    timeout: Duration,
    visible: bool,
    last_change: Option<Instant>,
}

impl ZoomIndicator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            visible: false,
            last_change: None,
        }
    }

    /// Show the indicator and restart the quiet period
    pub fn show(&mut self, now: Instant) {
        self.visible = true;
        self.last_change = Some(now);
    }

    /// Hide the indicator if the quiet period has elapsed.
    /// Returns true when visibility changed.
    pub fn refresh(&mut self, now: Instant) -> bool {
        if !self.visible {
            return false;
        }
        match self.hide_at() {
            Some(deadline) if now >= deadline => {
                self.visible = false;
                true
            }
            _ => false,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// When the indicator will hide, if it is showing
    pub fn hide_at(&self) -> Option<Instant> {
        if !self.visible {
            return None;
        }
        self.last_change.map(|changed| changed + self.timeout)
    }
}

/// Format a zoom factor for display.
///
/// Anything under 1.5 reads "1x" so the label does not flicker between
/// 1.0x and 1.1x around the default.
pub fn format_zoom_label(zoom: f64) -> String {
    if zoom < LABEL_UNITY_THRESHOLD {
        "1x".to_string()
    } else {
        format!("{:.1}x", zoom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_format() {
        assert_eq!(format_zoom_label(0.5), "1x");
        assert_eq!(format_zoom_label(1.0), "1x");
        assert_eq!(format_zoom_label(1.49), "1x");
        assert_eq!(format_zoom_label(1.5), "1.5x");
        assert_eq!(format_zoom_label(3.16), "3.2x");
        assert_eq!(format_zoom_label(20.0), "20.0x");
    }

    #[test]
    fn test_indicator_hides_after_quiet_period() {
        let t0 = Instant::now();
        let mut indicator = ZoomIndicator::new(Duration::from_secs(2));
        indicator.show(t0);

        assert!(!indicator.refresh(t0 + Duration::from_millis(1999)));
        assert!(indicator.is_visible());
        assert!(indicator.refresh(t0 + Duration::from_secs(2)));
        assert!(!indicator.is_visible());
        assert!(!indicator.refresh(t0 + Duration::from_secs(3)));
    }

    #[test]
    fn test_further_change_restarts_timer() {
        let t0 = Instant::now();
        let mut indicator = ZoomIndicator::new(Duration::from_secs(2));
        indicator.show(t0);
        indicator.show(t0 + Duration::from_millis(1500));

        assert!(!indicator.refresh(t0 + Duration::from_millis(3000)));
        assert_eq!(indicator.hide_at(), Some(t0 + Duration::from_millis(3500)));
        assert!(indicator.refresh(t0 + Duration::from_millis(3500)));
    }
}
