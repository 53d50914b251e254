//! Active recording time
//!
//! Elapsed time is a pure function of the start instant and the pause
//! intervals. How often the UI refreshes and how the progress bar animates
//! are derived from it and never feed back into it.

use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// One pause, open until the recording resumes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PauseInterval {
    pub paused_at: Instant,
    pub resumed_at: Option<Instant>,
}

impl PauseInterval {
    fn closed_duration(&self) -> Option<Duration> {
        self.resumed_at
            .map(|resumed| resumed.saturating_duration_since(self.paused_at))
    }
}

/// Tracks active recording time across pause/resume cycles
#[derive(Debug, Clone)]
pub struct DurationTracker {
    /// First start; not moved by pauses
    started_at: Option<Instant>,

    /// Ordered pauses, at most one open
    pause_intervals: Vec<PauseInterval>,

    /// Set once recording stops; freezes the elapsed value
    stopped_at: Option<Instant>,

    max_duration: Duration,
}

impl DurationTracker {
    pub fn new(max_duration: Duration) -> Self {
        Self {
            started_at: None,
            pause_intervals: Vec::new(),
            stopped_at: None,
            max_duration,
        }
    }

    pub fn max_duration(&self) -> Duration {
        self.max_duration
    }

    /// Begin accumulation, discarding anything left from a previous run
    pub fn start(&mut self, now: Instant) {
        self.reset();
        self.started_at = Some(now);
    }

    /// Open a pause interval. Returns false if not running or already paused.
    pub fn pause(&mut self, now: Instant) -> bool {
        if !self.is_running() {
            return false;
        }
        self.pause_intervals.push(PauseInterval {
            paused_at: now,
            resumed_at: None,
        });
        true
    }

    /// Close the open pause interval. Returns false if not paused.
    pub fn resume(&mut self, now: Instant) -> bool {
        if self.stopped_at.is_some() {
            return false;
        }
        match self.open_interval_mut() {
            Some(interval) => {
                interval.resumed_at = Some(now.max(interval.paused_at));
                true
            }
            None => false,
        }
    }

    /// Freeze the elapsed value. A pause still open stays frozen where it began.
    pub fn stop(&mut self, now: Instant) {
        if self.started_at.is_none() || self.stopped_at.is_some() {
            return;
        }
        if let Some(interval) = self.open_interval_mut() {
            interval.resumed_at = Some(now.max(interval.paused_at));
        }
        self.stopped_at = Some(now);
    }

    /// Discard all accumulated state
    pub fn reset(&mut self) {
        self.started_at = None;
        self.pause_intervals.clear();
        self.stopped_at = None;
    }

    /// Active recording time at `now`, excluding every pause
    pub fn record_elapsed(&self, now: Instant) -> Duration {
        let Some(started_at) = self.started_at else {
            return Duration::ZERO;
        };

        let end = match (self.stopped_at, self.open_interval()) {
            (Some(stopped_at), _) => stopped_at,
            (None, Some(open)) => open.paused_at,
            (None, None) => now,
        };

        let paused: Duration = self
            .pause_intervals
            .iter()
            .filter_map(PauseInterval::closed_duration)
            .sum();

        end.saturating_duration_since(started_at).saturating_sub(paused)
    }

    /// Fraction of the maximum duration used, in `[0, 1]`
    pub fn progress(&self, now: Instant) -> f64 {
        if self.max_duration.is_zero() {
            return 1.0;
        }
        let fraction = self.record_elapsed(now).as_secs_f64() / self.max_duration.as_secs_f64();
        fraction.clamp(0.0, 1.0)
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.max_duration.saturating_sub(self.record_elapsed(now))
    }

    pub fn reached_max(&self, now: Instant) -> bool {
        self.record_elapsed(now) >= self.max_duration
    }

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    /// Started, not stopped and not paused
    pub fn is_running(&self) -> bool {
        self.started_at.is_some() && self.stopped_at.is_none() && self.open_interval().is_none()
    }

    pub fn is_paused(&self) -> bool {
        self.stopped_at.is_none() && self.open_interval().is_some()
    }

    pub fn pause_count(&self) -> usize {
        self.pause_intervals.len()
    }

    pub fn pause_intervals(&self) -> &[PauseInterval] {
        &self.pause_intervals
    }

    fn open_interval(&self) -> Option<&PauseInterval> {
        self.pause_intervals
            .last()
            .filter(|interval| interval.resumed_at.is_none())
    }

    fn open_interval_mut(&mut self) -> Option<&mut PauseInterval> {
        self.pause_intervals
            .last_mut()
            .filter(|interval| interval.resumed_at.is_none())
    }
}

/// Display values derived from the tracker for one UI tick
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerDisplay {
    pub elapsed_ms: u64,
    pub text: String,
    pub progress: f64,
}

impl TimerDisplay {
    pub fn from_tracker(tracker: &DurationTracker, now: Instant) -> Self {
        let elapsed = tracker.record_elapsed(now).min(tracker.max_duration());
        Self {
            elapsed_ms: elapsed.as_millis() as u64,
            text: format_timer(elapsed),
            progress: tracker.progress(now),
        }
    }
}

/// Render a duration as `MM:SS`
pub fn format_timer(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Fires once when the elapsed time reaches the limit.
///
/// Any stop, manual or automatic, arms the latch so a tick landing on the
/// same boundary cannot stop twice.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoStopLatch {
    fired: bool,
}

impl AutoStopLatch {
    /// True exactly once, the first time `elapsed >= limit`
    pub fn check(&mut self, elapsed: Duration, limit: Duration) -> bool {
        if self.fired || elapsed < limit {
            return false;
        }
        self.fired = true;
        true
    }

    /// Mark the session as stopped by other means
    pub fn arm(&mut self) {
        self.fired = true;
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    pub fn reset(&mut self) {
        self.fired = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_elapsed_without_pauses() {
        let t0 = Instant::now();
        let mut tracker = DurationTracker::new(secs(60));
        tracker.start(t0);
        assert_eq!(tracker.record_elapsed(t0 + secs(12)), secs(12));
    }

    #[test]
    fn test_elapsed_frozen_while_paused() {
        let t0 = Instant::now();
        let mut tracker = DurationTracker::new(secs(60));
        tracker.start(t0);
        assert!(tracker.pause(t0 + secs(20)));

        assert_eq!(tracker.record_elapsed(t0 + secs(21)), secs(20));
        assert_eq!(tracker.record_elapsed(t0 + secs(24)), secs(20));
        assert!(!tracker.pause(t0 + secs(24)));
    }

    #[test]
    fn test_resume_subtracts_closed_pause() {
        let t0 = Instant::now();
        let mut tracker = DurationTracker::new(secs(60));
        tracker.start(t0);
        tracker.pause(t0 + secs(20));
        assert!(tracker.resume(t0 + secs(25)));

        assert_eq!(tracker.record_elapsed(t0 + secs(30)), secs(25));
        assert!(!tracker.resume(t0 + secs(30)));
    }

    #[test]
    fn test_remaining_ignores_pauses() {
        let t0 = Instant::now();
        let mut tracker = DurationTracker::new(secs(60));
        tracker.start(t0);
        tracker.pause(t0 + secs(20));
        assert_eq!(tracker.remaining(t0 + secs(25)), secs(40));

        tracker.resume(t0 + secs(25));
        assert_eq!(tracker.remaining(t0 + secs(30)), secs(35));
        assert_eq!(tracker.remaining(t0 + secs(200)), Duration::ZERO);
    }

    #[test]
    fn test_elapsed_never_decreases_across_cycles() {
        let t0 = Instant::now();
        let mut tracker = DurationTracker::new(secs(600));
        tracker.start(t0);

        let mut last = Duration::ZERO;
        let mut paused_total = Duration::ZERO;
        let mut pause_started = None;
        for step in 1..=200u64 {
            let now = t0 + Duration::from_millis(step * 250);
            // Toggle pause on a fixed irregular pattern
            if step % 7 == 0 && pause_started.is_none() {
                tracker.pause(now);
                pause_started = Some(now);
            } else if step % 11 == 0 {
                if let Some(paused_at) = pause_started.take() {
                    tracker.resume(now);
                    paused_total += now - paused_at;
                }
            }

            let elapsed = tracker.record_elapsed(now);
            assert!(elapsed >= last, "elapsed went backwards at step {}", step);
            last = elapsed;

            if pause_started.is_none() {
                assert_eq!(elapsed, (now - t0) - paused_total);
            }
        }
    }

    #[test]
    fn test_zero_length_pause_loses_nothing() {
        let t0 = Instant::now();
        let mut tracker = DurationTracker::new(secs(60));
        tracker.start(t0);
        let at = t0 + secs(10);
        tracker.pause(at);
        tracker.resume(at);
        assert_eq!(tracker.record_elapsed(at), secs(10));
        assert_eq!(tracker.record_elapsed(t0 + secs(15)), secs(15));
    }

    #[test]
    fn test_stop_freezes_elapsed() {
        let t0 = Instant::now();
        let mut tracker = DurationTracker::new(secs(60));
        tracker.start(t0);
        tracker.stop(t0 + secs(8));
        assert_eq!(tracker.record_elapsed(t0 + secs(30)), secs(8));
        assert!(!tracker.is_running());
    }

    #[test]
    fn test_stop_while_paused_keeps_pause_value() {
        let t0 = Instant::now();
        let mut tracker = DurationTracker::new(secs(60));
        tracker.start(t0);
        tracker.pause(t0 + secs(5));
        tracker.stop(t0 + secs(9));
        assert_eq!(tracker.record_elapsed(t0 + secs(20)), secs(5));
    }

    #[test]
    fn test_progress_is_capped() {
        let t0 = Instant::now();
        let mut tracker = DurationTracker::new(secs(60));
        tracker.start(t0);
        assert_eq!(tracker.progress(t0 + secs(30)), 0.5);
        assert_eq!(tracker.progress(t0 + secs(90)), 1.0);
        assert!(tracker.reached_max(t0 + secs(60)));
    }

    #[test]
    fn test_reset_discards_everything() {
        let t0 = Instant::now();
        let mut tracker = DurationTracker::new(secs(60));
        tracker.start(t0);
        tracker.pause(t0 + secs(3));
        tracker.reset();
        assert_eq!(tracker.record_elapsed(t0 + secs(10)), Duration::ZERO);
        assert_eq!(tracker.pause_count(), 0);
        assert!(!tracker.is_started());
    }

    #[test]
    fn test_format_timer() {
        assert_eq!(format_timer(Duration::ZERO), "00:00");
        assert_eq!(format_timer(Duration::from_millis(20_900)), "00:20");
        assert_eq!(format_timer(secs(179)), "02:59");
    }

    #[test]
    fn test_timer_display_caps_at_max() {
        let t0 = Instant::now();
        let mut tracker = DurationTracker::new(secs(60));
        tracker.start(t0);
        let display = TimerDisplay::from_tracker(&tracker, t0 + secs(61));
        assert_eq!(display.text, "01:00");
        assert_eq!(display.elapsed_ms, 60_000);
        assert_eq!(display.progress, 1.0);
    }

    #[test]
    fn test_auto_stop_latch_fires_once_at_100ms_ticks() {
        let t0 = Instant::now();
        let mut tracker = DurationTracker::new(secs(60));
        let mut latch = AutoStopLatch::default();
        tracker.start(t0);

        let mut fired_at = Vec::new();
        // 100ms ticks offset by 30ms so no tick lands exactly on the boundary
        for tick in 0..700u64 {
            let now = t0 + Duration::from_millis(30 + tick * 100);
            if latch.check(tracker.record_elapsed(now), tracker.max_duration()) {
                fired_at.push(now - t0);
            }
        }

        assert_eq!(fired_at, vec![Duration::from_millis(60_030)]);
    }

    #[test]
    fn test_armed_latch_never_fires() {
        let mut latch = AutoStopLatch::default();
        latch.arm();
        assert!(!latch.check(secs(90), secs(60)));
        latch.reset();
        assert!(latch.check(secs(90), secs(60)));
    }
}
