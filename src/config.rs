//! Capture configuration
//!
//! The configuration surface exposed to callers, with per-mode defaults.
//! Loaded from JSON in the same camelCase shape the screens use.

use crate::capture::traits::{CameraFacing, FlashMode};
use crate::duet::layout::DuetLayout;
use crate::recorder::state::CaptureMode;
use crate::utils::error::{CaptureError, CaptureResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Duet recordings are capped at one minute
pub const DUET_MAX_DURATION_SECONDS: u32 = 60;

/// Standalone posts are capped at three minutes
pub const STANDALONE_MAX_DURATION_SECONDS: u32 = 180;

/// Zoom never exceeds this factor, whatever the device reports
pub const HARD_MAX_ZOOM: f64 = 20.0;

/// Quiet period before the zoom indicator fades
pub const ZOOM_INDICATOR_TIMEOUT_MS: u64 = 2000;

/// Vertical drag reaches max zoom at this fraction of the touch origin
pub const DRAG_ZOOM_TOP_RATIO: f64 = 0.7;

/// UI tick driving the timer and the auto-stop check
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Configuration for one capture screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureConfig {
    pub max_duration_seconds: u32,

    #[serde(default)]
    pub camera_facing: CameraFacing,

    #[serde(default)]
    pub flash_mode: FlashMode,

    #[serde(default)]
    pub layout: DuetLayout,

    #[serde(default)]
    pub zoom: ZoomSettings,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl CaptureConfig {
    /// Defaults for the given capture screen
    pub fn for_mode(mode: CaptureMode) -> Self {
        let max_duration_seconds = match mode {
            CaptureMode::Duet => DUET_MAX_DURATION_SECONDS,
            CaptureMode::Standalone => STANDALONE_MAX_DURATION_SECONDS,
        };
        Self {
            max_duration_seconds,
            camera_facing: CameraFacing::default(),
            flash_mode: FlashMode::default(),
            layout: DuetLayout::default(),
            zoom: ZoomSettings::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> CaptureResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON configuration file
    pub fn from_path(path: &Path) -> CaptureResult<Self> {
        let content = std::fs::read_to_string(path)?;
        tracing::debug!("Loading capture config from {:?}", path);
        Self::from_json(&content)
    }

    pub fn validate(&self) -> CaptureResult<()> {
        if self.max_duration_seconds == 0 {
            return Err(CaptureError::Config(
                "maxDurationSeconds must be greater than zero".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(CaptureError::Config(
                "pollIntervalMs must be greater than zero".to_string(),
            ));
        }
        self.zoom.validate()
    }

    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.max_duration_seconds))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Tuning for the gesture zoom
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ZoomSettings {
    pub hard_max_zoom: f64,
    pub indicator_timeout_ms: u64,
    pub drag_top_ratio: f64,
}

impl Default for ZoomSettings {
    fn default() -> Self {
        Self {
            hard_max_zoom: HARD_MAX_ZOOM,
            indicator_timeout_ms: ZOOM_INDICATOR_TIMEOUT_MS,
            drag_top_ratio: DRAG_ZOOM_TOP_RATIO,
        }
    }
}

impl ZoomSettings {
    pub fn validate(&self) -> CaptureResult<()> {
        if !(self.hard_max_zoom >= 1.0 && self.hard_max_zoom <= HARD_MAX_ZOOM) {
            return Err(CaptureError::Config(format!(
                "hardMaxZoom must be between 1.0 and {}, got {}",
                HARD_MAX_ZOOM, self.hard_max_zoom
            )));
        }
        if !(self.drag_top_ratio > 0.0 && self.drag_top_ratio < 1.0) {
            return Err(CaptureError::Config(format!(
                "dragTopRatio must be between 0 and 1, got {}",
                self.drag_top_ratio
            )));
        }
        Ok(())
    }

    pub fn indicator_timeout(&self) -> Duration {
        Duration::from_millis(self.indicator_timeout_ms)
    }
}
