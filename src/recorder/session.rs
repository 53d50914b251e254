//! Recording session
//!
//! Owns one capture device and drives it through the recording state
//! machine. Control calls are async and may fail; a failure leaves the
//! session `Errored` until it is reset, never half-started. Completion and
//! errors raised by the device arrive separately on an event channel and
//! are fed back through [`RecordingSession::handle_device_event`].

use super::duration::{AutoStopLatch, DurationTracker, TimerDisplay};
use super::state::{CancelOutcome, CaptureMode, CaptureOutput, SessionState, Transition};
use crate::capture::permissions::{ensure_capture_permissions, request_capture_permissions, PermissionSnapshot};
use crate::capture::traits::{
    CameraFacing, CaptureDevice, DeviceCapabilities, DeviceEvent, DeviceProvider, FlashMode,
    MediaLocator, PermissionProvider, RecordingOptions,
};
use crate::config::CaptureConfig;
use crate::utils::error::{CaptureError, CaptureResult, DeviceOp};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use uuid::Uuid;

/// Standalone recordings shorter than this are discarded without asking
pub const CONFIRM_CANCEL_AFTER: Duration = Duration::from_secs(1);

const DEVICE_RELEASED: &str = "capture device released";

/// Events emitted during recording
#[derive(Debug, Clone)]
pub enum RecordingEvent {
    /// Recording started
    Started,
    /// Recording paused
    Paused,
    /// Recording resumed
    Resumed,
    /// Stop requested, device finalizing
    Finalizing,
    /// Device handed over the media
    Finished(CaptureOutput),
    /// Recording discarded
    Cancelled,
    /// Device failure
    Errored(String),
    /// Timer/progress update for the UI tick
    Progress(TimerDisplay),
}

/// Marks a device control call in flight; cleared on drop.
///
/// Control calls take `&mut self`, so they are already serialized; the flag
/// only lets observers on other tasks see that one is pending.
struct ControlGuard(Arc<AtomicBool>);

impl ControlGuard {
    fn enter(flag: &Arc<AtomicBool>) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag.clone())
    }
}

impl Drop for ControlGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn closed_receiver() -> mpsc::UnboundedReceiver<DeviceEvent> {
    let (_, rx) = mpsc::unbounded_channel();
    rx
}

fn invalid(action: &'static str, state: SessionState) -> CaptureError {
    CaptureError::InvalidTransition {
        action,
        state: state.to_string(),
    }
}

/// State machine for one capture device
pub struct RecordingSession {
    id: Uuid,
    mode: CaptureMode,
    config: CaptureConfig,

    /// Current state, shared with observers
    state: Arc<RwLock<SessionState>>,

    /// Set while a device control call is awaiting acknowledgement
    busy: Arc<AtomicBool>,

    /// Cleared when the owning screen unmounts
    live: Arc<AtomicBool>,

    device: Option<Box<dyn CaptureDevice>>,
    devices: Arc<dyn DeviceProvider>,
    permissions: Arc<dyn PermissionProvider>,

    tracker: DurationTracker,
    auto_stop: AutoStopLatch,
    started_wall: Option<DateTime<Utc>>,
    output: Option<CaptureOutput>,
    last_error: Option<String>,

    /// Callbacks for the current recording; replaced on every start
    device_rx: mpsc::UnboundedReceiver<DeviceEvent>,

    event_tx: broadcast::Sender<RecordingEvent>,
}

impl RecordingSession {
    /// Acquire the device for the configured facing and create an idle session
    pub fn new(
        mode: CaptureMode,
        config: CaptureConfig,
        devices: Arc<dyn DeviceProvider>,
        permissions: Arc<dyn PermissionProvider>,
    ) -> CaptureResult<Self> {
        config.validate()?;
        let device = devices.device_for(config.camera_facing).ok_or_else(|| {
            CaptureError::DeviceUnavailable(format!("no {:?} camera", config.camera_facing))
        })?;

        let id = Uuid::new_v4();
        let (event_tx, _) = broadcast::channel(100);
        tracing::info!(session = %id, "Created {:?} capture session on {}", mode, device.id());

        Ok(Self {
            id,
            mode,
            tracker: DurationTracker::new(config.max_duration()),
            config,
            state: Arc::new(RwLock::new(SessionState::Idle)),
            busy: Arc::new(AtomicBool::new(false)),
            live: Arc::new(AtomicBool::new(true)),
            device: Some(device),
            devices,
            permissions,
            auto_stop: AutoStopLatch::default(),
            started_wall: None,
            output: None,
            last_error: None,
            device_rx: closed_receiver(),
            event_tx,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Get the current recording state
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Shared view of the state for observers outside the owning task
    pub fn shared_state(&self) -> Arc<RwLock<SessionState>> {
        self.state.clone()
    }

    /// Whether a device control call is in flight
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub(crate) fn busy_flag(&self) -> Arc<AtomicBool> {
        self.busy.clone()
    }

    /// Whether the owning screen is still mounted
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Subscribe to recording events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.event_tx.subscribe()
    }

    /// Active recording time, excluding pauses
    pub fn elapsed(&self, now: Instant) -> Duration {
        self.tracker.record_elapsed(now)
    }

    pub fn timer(&self, now: Instant) -> TimerDisplay {
        TimerDisplay::from_tracker(&self.tracker, now)
    }

    pub fn tracker(&self) -> &DurationTracker {
        &self.tracker
    }

    /// Output of the finished recording, if any
    pub fn output(&self) -> Option<&CaptureOutput> {
        self.output.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn capabilities(&self) -> DeviceCapabilities {
        self.device
            .as_ref()
            .map(|device| device.capabilities())
            .unwrap_or_default()
    }

    /// Push the current zoom to the device; called every frame
    pub fn apply_zoom(&mut self, zoom: f64) {
        if let Some(device) = self.device.as_mut() {
            device.set_zoom(zoom);
        }
    }

    /// Prompt for any undecided capture permission
    pub async fn request_permissions(&self) -> PermissionSnapshot {
        request_capture_permissions(self.permissions.as_ref()).await
    }

    /// Switch cameras. Only allowed while idle.
    pub fn set_camera_facing(&mut self, facing: CameraFacing) -> CaptureResult<()> {
        let state = self.state();
        if state != SessionState::Idle {
            return Err(invalid("switch camera", state));
        }
        if facing == self.config.camera_facing && self.device.is_some() {
            return Ok(());
        }

        let device = self
            .devices
            .device_for(facing)
            .ok_or_else(|| CaptureError::DeviceUnavailable(format!("no {:?} camera", facing)))?;
        tracing::info!(session = %self.id, "Switched to {:?} camera {}", facing, device.id());
        self.device = Some(device);
        self.config.camera_facing = facing;
        Ok(())
    }

    /// Change the flash mode. Only allowed while idle.
    pub fn set_flash_mode(&mut self, flash_mode: FlashMode) -> CaptureResult<()> {
        let state = self.state();
        if state != SessionState::Idle {
            return Err(invalid("change flash mode", state));
        }
        self.config.flash_mode = flash_mode;
        Ok(())
    }

    /// Hold gesture engaged: start from idle, resume from paused
    pub async fn engage_hold(&mut self) -> CaptureResult<Transition> {
        match self.state() {
            SessionState::Idle => self.begin().await,
            SessionState::Paused => self.resume().await,
            _ => Ok(Transition::Ignored),
        }
    }

    /// Hold gesture released: duets pause, standalone captures stop
    pub async fn release_hold(&mut self) -> CaptureResult<Transition> {
        if self.state() != SessionState::Recording {
            return Ok(Transition::Ignored);
        }
        if self.mode.supports_pause() {
            self.pause().await
        } else {
            self.finish().await
        }
    }

    /// Start recording
    pub async fn begin(&mut self) -> CaptureResult<Transition> {
        let _guard = ControlGuard::enter(&self.busy);

        match self.state() {
            SessionState::Idle => {}
            SessionState::Recording | SessionState::Paused | SessionState::Finalizing => {
                tracing::debug!("Ignoring begin capture: already {}", self.state());
                return Ok(Transition::Ignored);
            }
            state => return Err(invalid("begin capture", state)),
        }

        // Nothing reaches the device without both permissions
        ensure_capture_permissions(self.permissions.as_ref())?;

        let options = RecordingOptions {
            camera_facing: self.config.camera_facing,
            flash_mode: self.config.flash_mode,
            max_duration_seconds: self.config.max_duration_seconds,
        };
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tracing::info!(session = %self.id, "Starting recording");
        let result = match self.device.as_mut() {
            Some(device) => device.start_recording(options, events_tx).await,
            None => return Err(CaptureError::DeviceUnavailable(DEVICE_RELEASED.to_string())),
        };
        if let Err(reason) = result {
            return Err(self.fail(DeviceOp::Start, reason).await);
        }

        self.device_rx = events_rx;
        self.tracker.start(Instant::now());
        self.auto_stop.reset();
        self.started_wall = Some(Utc::now());
        self.output = None;
        self.last_error = None;
        self.set_state(SessionState::Recording);
        self.emit(RecordingEvent::Started);

        tracing::info!(session = %self.id, "Recording started");
        Ok(Transition::Applied(SessionState::Recording))
    }

    /// Pause recording (duet only)
    pub async fn pause(&mut self) -> CaptureResult<Transition> {
        let _guard = ControlGuard::enter(&self.busy);

        let state = self.state();
        if !self.mode.supports_pause() {
            return Err(invalid("pause a standalone capture", state));
        }
        match state {
            SessionState::Recording => {}
            SessionState::Paused
            | SessionState::Finalizing
            | SessionState::Finished
            | SessionState::Cancelled => return Ok(Transition::Ignored),
            state => return Err(invalid("pause", state)),
        }

        let paused_at = Instant::now();
        let result = match self.device.as_mut() {
            Some(device) => device.pause_recording().await,
            None => Err(DEVICE_RELEASED.to_string()),
        };
        if let Err(reason) = result {
            return Err(self.fail(DeviceOp::Pause, reason).await);
        }

        self.tracker.pause(paused_at);
        self.set_state(SessionState::Paused);
        self.emit(RecordingEvent::Paused);

        tracing::info!(session = %self.id, "Recording paused");
        Ok(Transition::Applied(SessionState::Paused))
    }

    /// Resume a paused recording
    pub async fn resume(&mut self) -> CaptureResult<Transition> {
        let _guard = ControlGuard::enter(&self.busy);

        match self.state() {
            SessionState::Paused => {}
            SessionState::Recording
            | SessionState::Finalizing
            | SessionState::Finished
            | SessionState::Cancelled => return Ok(Transition::Ignored),
            state => return Err(invalid("resume", state)),
        }

        let result = match self.device.as_mut() {
            Some(device) => device.resume_recording().await,
            None => Err(DEVICE_RELEASED.to_string()),
        };
        if let Err(reason) = result {
            return Err(self.fail(DeviceOp::Resume, reason).await);
        }

        self.tracker.resume(Instant::now());
        self.set_state(SessionState::Recording);
        self.emit(RecordingEvent::Resumed);

        tracing::info!(session = %self.id, "Recording resumed");
        Ok(Transition::Applied(SessionState::Recording))
    }

    /// Stop recording. The output arrives with the device's finished callback.
    pub async fn finish(&mut self) -> CaptureResult<Transition> {
        self.stop_at(Instant::now()).await
    }

    /// UI tick: publish progress and auto-stop at the maximum duration
    pub async fn tick(&mut self, now: Instant) -> CaptureResult<Transition> {
        if self.state() != SessionState::Recording {
            return Ok(Transition::Ignored);
        }

        let elapsed = self.tracker.record_elapsed(now);
        if self.auto_stop.check(elapsed, self.tracker.max_duration()) {
            tracing::info!(session = %self.id, "Maximum duration reached, stopping");
            return self.stop_at(now).await;
        }

        self.emit(RecordingEvent::Progress(TimerDisplay::from_tracker(&self.tracker, now)));
        Ok(Transition::Ignored)
    }

    async fn stop_at(&mut self, now: Instant) -> CaptureResult<Transition> {
        let _guard = ControlGuard::enter(&self.busy);

        match self.state() {
            SessionState::Recording | SessionState::Paused => {}
            SessionState::Finalizing | SessionState::Finished | SessionState::Cancelled => {
                tracing::debug!("Ignoring stop: already {}", self.state());
                return Ok(Transition::Ignored);
            }
            state => return Err(invalid("finish", state)),
        }
        if self.device.is_none() {
            return Err(CaptureError::DeviceUnavailable(DEVICE_RELEASED.to_string()));
        }

        // Whichever stop arrives first wins; later ones are no-ops
        self.auto_stop.arm();
        self.tracker.stop(now);
        self.set_state(SessionState::Finalizing);
        self.emit(RecordingEvent::Finalizing);

        let result = match self.device.as_mut() {
            Some(device) => device.stop_recording().await,
            None => Err(DEVICE_RELEASED.to_string()),
        };
        if let Err(reason) = result {
            return Err(self.fail(DeviceOp::Stop, reason).await);
        }

        tracing::info!(
            session = %self.id,
            "Recording stopping after {}ms active",
            self.tracker.record_elapsed(now).as_millis()
        );
        Ok(Transition::Applied(SessionState::Finalizing))
    }

    /// Cancel the session.
    ///
    /// Discarding recorded content needs `confirmed`; without it the caller
    /// gets [`CancelOutcome::NeedsConfirmation`] and nothing changes.
    pub async fn cancel(&mut self, confirmed: bool) -> CaptureResult<CancelOutcome> {
        let _guard = ControlGuard::enter(&self.busy);

        match self.state() {
            SessionState::Finished | SessionState::Cancelled => return Ok(CancelOutcome::Ignored),
            SessionState::Recording | SessionState::Paused => {
                if !confirmed && self.needs_confirmation() {
                    return Ok(CancelOutcome::NeedsConfirmation);
                }
                let result = match self.device.as_mut() {
                    Some(device) => device.cancel_recording().await,
                    None => Ok(()),
                };
                if let Err(reason) = result {
                    tracing::warn!("Failed to abort recording: {}", reason);
                }
            }
            // Finalizing: the late finished callback is discarded
            SessionState::Finalizing | SessionState::Idle | SessionState::Errored => {}
        }

        self.auto_stop.arm();
        self.tracker.stop(Instant::now());
        self.set_state(SessionState::Cancelled);
        self.emit(RecordingEvent::Cancelled);

        tracing::info!(session = %self.id, "Recording cancelled");
        Ok(CancelOutcome::Cancelled)
    }

    /// Fail a live recording from outside the device, e.g. when a paired
    /// stream could not follow a transition. No-op unless capturing.
    pub async fn abort(&mut self, reason: impl Into<String>) {
        let state = self.state();
        if !state.is_capturing() && state != SessionState::Finalizing {
            return;
        }
        let reason = reason.into();
        let _guard = ControlGuard::enter(&self.busy);
        tracing::error!(session = %self.id, "Aborting recording: {}", reason);
        self.force_stop_device().await;
        self.enter_errored(reason);
    }

    fn needs_confirmation(&self) -> bool {
        match self.mode {
            CaptureMode::Duet => true,
            CaptureMode::Standalone => {
                self.tracker.record_elapsed(Instant::now()) >= CONFIRM_CANCEL_AFTER
            }
        }
    }

    /// Return to idle, discarding timing and output.
    ///
    /// Required after an error before the next attempt.
    pub fn reset(&mut self) -> CaptureResult<()> {
        let state = self.state();
        if state.is_capturing() || state == SessionState::Finalizing {
            return Err(invalid("reset", state));
        }

        self.tracker.reset();
        self.auto_stop.reset();
        self.started_wall = None;
        self.output = None;
        self.last_error = None;
        self.device_rx = closed_receiver();
        self.set_state(SessionState::Idle);
        Ok(())
    }

    /// Process one device callback
    pub async fn handle_device_event(
        &mut self,
        event: DeviceEvent,
    ) -> CaptureResult<Option<CaptureOutput>> {
        match event {
            DeviceEvent::Finished(locator) => match self.state() {
                SessionState::Finalizing => Ok(Some(self.complete(locator))),
                SessionState::Recording | SessionState::Paused => {
                    tracing::warn!(session = %self.id, "Device finished without a stop request");
                    self.auto_stop.arm();
                    self.tracker.stop(Instant::now());
                    Ok(Some(self.complete(locator)))
                }
                state => {
                    tracing::debug!("Discarding recording {} while {}", locator, state);
                    Ok(None)
                }
            },
            DeviceEvent::Error(reason) => match self.state() {
                SessionState::Recording | SessionState::Paused | SessionState::Finalizing => {
                    tracing::error!(session = %self.id, "Device reported error: {}", reason);
                    self.force_stop_device().await;
                    self.enter_errored(reason.clone());
                    Err(CaptureError::Recording(reason))
                }
                state => {
                    tracing::debug!("Ignoring device error while {}: {}", state, reason);
                    Ok(None)
                }
            },
        }
    }

    /// Drain callbacks that have already arrived
    pub async fn poll_device_events(&mut self) -> CaptureResult<Option<CaptureOutput>> {
        let mut output = None;
        while let Ok(event) = self.device_rx.try_recv() {
            if let Some(done) = self.handle_device_event(event).await? {
                output = Some(done);
            }
        }
        Ok(output)
    }

    /// Wait for the device to hand over the file after a stop
    pub async fn wait_for_output(&mut self) -> CaptureResult<CaptureOutput> {
        loop {
            let state = self.state();
            if state == SessionState::Finished {
                if let Some(output) = &self.output {
                    return Ok(output.clone());
                }
            }
            if state != SessionState::Finalizing {
                return Err(invalid("wait for the recording", state));
            }

            let Some(event) = self.device_rx.recv().await else {
                return Err(CaptureError::Recording(
                    "device closed before finishing".to_string(),
                ));
            };
            if let Some(output) = self.handle_device_event(event).await? {
                return Ok(output);
            }
        }
    }

    /// Screen unmounted: stop publishing and let go of the device
    pub fn release(&mut self) {
        self.live.store(false, Ordering::SeqCst);
        self.device = None;
        self.device_rx.close();
        tracing::info!(session = %self.id, "Capture session released in state {}", self.state());
    }

    fn complete(&mut self, locator: MediaLocator) -> CaptureOutput {
        let active = self
            .tracker
            .record_elapsed(Instant::now())
            .min(self.tracker.max_duration());
        let output = CaptureOutput {
            session_id: self.id,
            captured: locator,
            total_active_duration_ms: active.as_millis() as u64,
            pause_count: self.tracker.pause_count(),
            started_at: self.started_wall.unwrap_or_else(Utc::now),
            finished_at: Utc::now(),
        };

        self.output = Some(output.clone());
        self.set_state(SessionState::Finished);
        self.emit(RecordingEvent::Finished(output.clone()));

        tracing::info!(
            session = %self.id,
            "Recording finished: {} ({}ms, {} pauses)",
            output.captured,
            output.total_active_duration_ms,
            output.pause_count
        );
        output
    }

    async fn fail(&mut self, op: DeviceOp, reason: String) -> CaptureError {
        tracing::error!(session = %self.id, "Device {} failed: {}", op, reason);
        self.force_stop_device().await;
        self.enter_errored(reason.clone());
        CaptureError::device(op, reason)
    }

    async fn force_stop_device(&mut self) {
        if let Some(device) = self.device.as_mut() {
            if let Err(e) = device.cancel_recording().await {
                tracing::warn!("Failed to force-stop capture device: {}", e);
            }
        }
    }

    fn enter_errored(&mut self, message: String) {
        self.auto_stop.arm();
        self.tracker.stop(Instant::now());
        self.last_error = Some(message.clone());
        self.set_state(SessionState::Errored);
        self.emit(RecordingEvent::Errored(message));
    }

    fn set_state(&self, state: SessionState) {
        *self.state.write() = state;
    }

    /// Events are dropped once the screen is gone
    fn emit(&self, event: RecordingEvent) {
        if self.is_live() {
            let _ = self.event_tx.send(event);
        }
    }
}
