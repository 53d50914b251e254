//! In-memory collaborators for tests
//!
//! Fake capture device, permission provider, playback handle and uploader.
//! Each fake is a cheap clone over shared state so a test can keep one copy
//! for inspection while the engine owns another.

use crate::capture::traits::{
    CameraFacing, CaptureDevice, DeviceCapabilities, DeviceEvent, DeviceEventSender, DeviceProvider,
    MediaLocator, PermissionKind, PermissionProvider, PermissionStatus, PlaybackHandle,
    PlaybackStatus, RecordingOptions,
};
use crate::handoff::{UploadCollaborator, UploadPayload};
use crate::utils::error::{CaptureError, CaptureResult, DeviceOp};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Control call observed by a [`FakeDevice`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCall {
    Start,
    Pause,
    Resume,
    Stop,
    Cancel,
}

#[derive(Default)]
struct FakeDeviceState {
    calls: Vec<DeviceCall>,
    failing: HashSet<DeviceOp>,
    sink: Option<DeviceEventSender>,
    zoom: Option<f64>,
    options: Option<RecordingOptions>,
    manual_finish: bool,
    recordings: usize,
    gates: HashMap<DeviceOp, Arc<Notify>>,
}

/// Capture device that records calls and finishes instantly on stop
#[derive(Clone)]
pub struct FakeDevice {
    id: String,
    capabilities: DeviceCapabilities,
    state: Arc<Mutex<FakeDeviceState>>,
}

impl FakeDevice {
    pub fn new(id: &str) -> Self {
        Self::with_capabilities(
            id,
            DeviceCapabilities {
                min_zoom: 1.0,
                max_zoom: 10.0,
            },
        )
    }

    pub fn with_capabilities(id: &str, capabilities: DeviceCapabilities) -> Self {
        Self {
            id: id.to_string(),
            capabilities,
            state: Arc::new(Mutex::new(FakeDeviceState::default())),
        }
    }

    /// Make every call of `op` fail
    pub fn fail_on(&self, op: DeviceOp) {
        self.state.lock().failing.insert(op);
    }

    pub fn clear_failures(&self) {
        self.state.lock().failing.clear();
    }

    /// Hold every `op` call until the returned gate is notified.
    ///
    /// The call is recorded before it blocks, so a test can observe it in
    /// flight.
    pub fn hold(&self, op: DeviceOp) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state.lock().gates.insert(op, gate.clone());
        gate
    }

    /// Do not emit `Finished` from `stop_recording`; use [`FakeDevice::emit`]
    pub fn finish_manually(&self) {
        self.state.lock().manual_finish = true;
    }

    /// Deliver a device callback as if the hardware raised it
    pub fn emit(&self, event: DeviceEvent) -> bool {
        match &self.state.lock().sink {
            Some(sink) => sink.send(event).is_ok(),
            None => false,
        }
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.state.lock().calls.clone()
    }

    pub fn count(&self, call: DeviceCall) -> usize {
        self.state.lock().calls.iter().filter(|c| **c == call).count()
    }

    pub fn last_zoom(&self) -> Option<f64> {
        self.state.lock().zoom
    }

    pub fn last_options(&self) -> Option<RecordingOptions> {
        self.state.lock().options.clone()
    }

    async fn record(&self, call: DeviceCall, op: DeviceOp) -> Result<(), String> {
        let gate = {
            let mut state = self.state.lock();
            state.calls.push(call);
            state.gates.get(&op).cloned()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.state.lock().failing.contains(&op) {
            return Err(format!("injected {} failure", op));
        }
        Ok(())
    }
}

#[async_trait]
impl CaptureDevice for FakeDevice {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    fn set_zoom(&mut self, zoom: f64) {
        self.state.lock().zoom = Some(zoom);
    }

    async fn start_recording(
        &mut self,
        options: RecordingOptions,
        events: DeviceEventSender,
    ) -> Result<(), String> {
        self.record(DeviceCall::Start, DeviceOp::Start).await?;
        let mut state = self.state.lock();
        state.sink = Some(events);
        state.options = Some(options);
        state.recordings += 1;
        Ok(())
    }

    async fn pause_recording(&mut self) -> Result<(), String> {
        self.record(DeviceCall::Pause, DeviceOp::Pause).await
    }

    async fn resume_recording(&mut self) -> Result<(), String> {
        self.record(DeviceCall::Resume, DeviceOp::Resume).await
    }

    async fn stop_recording(&mut self) -> Result<(), String> {
        self.record(DeviceCall::Stop, DeviceOp::Stop).await?;
        let state = self.state.lock();
        if !state.manual_finish {
            if let Some(sink) = &state.sink {
                let locator = MediaLocator::new(format!("file:///{}-{}.mp4", self.id, state.recordings));
                let _ = sink.send(DeviceEvent::Finished(locator));
            }
        }
        Ok(())
    }

    async fn cancel_recording(&mut self) -> Result<(), String> {
        self.record(DeviceCall::Cancel, DeviceOp::Cancel).await
    }
}

/// Device provider backed by fake devices keyed by facing
#[derive(Clone, Default)]
pub struct FakeDeviceProvider {
    devices: HashMap<CameraFacing, FakeDevice>,
}

impl FakeDeviceProvider {
    pub fn with(mut self, facing: CameraFacing, device: FakeDevice) -> Self {
        self.devices.insert(facing, device);
        self
    }

    /// Provider with a single front camera
    pub fn front(device: FakeDevice) -> Self {
        Self::default().with(CameraFacing::Front, device)
    }
}

impl DeviceProvider for FakeDeviceProvider {
    fn device_for(&self, facing: CameraFacing) -> Option<Box<dyn CaptureDevice>> {
        self.devices
            .get(&facing)
            .map(|device| Box::new(device.clone()) as Box<dyn CaptureDevice>)
    }
}

/// Permission provider with fixed answers
pub struct StaticPermissions {
    camera: Mutex<PermissionStatus>,
    microphone: Mutex<PermissionStatus>,
    grant_on_request: bool,
    requests: AtomicUsize,
}

impl StaticPermissions {
    pub fn new(camera: PermissionStatus, microphone: PermissionStatus) -> Self {
        Self {
            camera: Mutex::new(camera),
            microphone: Mutex::new(microphone),
            grant_on_request: false,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn granted() -> Self {
        Self::new(PermissionStatus::Granted, PermissionStatus::Granted)
    }

    /// Undecided permissions become granted when requested
    pub fn grant_on_request(mut self) -> Self {
        self.grant_on_request = true;
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn slot(&self, kind: PermissionKind) -> &Mutex<PermissionStatus> {
        match kind {
            PermissionKind::Camera => &self.camera,
            PermissionKind::Microphone => &self.microphone,
        }
    }
}

#[async_trait]
impl PermissionProvider for StaticPermissions {
    fn status(&self, kind: PermissionKind) -> PermissionStatus {
        *self.slot(kind).lock()
    }

    async fn request(&self, kind: PermissionKind) -> PermissionStatus {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let mut status = self.slot(kind).lock();
        if *status == PermissionStatus::NotDetermined {
            *status = if self.grant_on_request {
                PermissionStatus::Granted
            } else {
                PermissionStatus::Denied
            };
        }
        *status
    }
}

/// Playback call observed by a [`FakePlayback`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackCall {
    Play,
    Pause,
    Seek(Duration),
}

struct FakePlaybackState {
    status: PlaybackStatus,
    playing: bool,
    position: Duration,
    calls: Vec<PlaybackCall>,
    fail_play: bool,
    fail_pause: bool,
}

/// Playback handle whose readiness is driven by the test
#[derive(Clone)]
pub struct FakePlayback {
    locator: MediaLocator,
    state: Arc<Mutex<FakePlaybackState>>,
}

impl FakePlayback {
    pub fn new(locator: &str, status: PlaybackStatus) -> Self {
        Self {
            locator: MediaLocator::new(locator),
            state: Arc::new(Mutex::new(FakePlaybackState {
                status,
                playing: false,
                position: Duration::ZERO,
                calls: Vec::new(),
                fail_play: false,
                fail_pause: false,
            })),
        }
    }

    pub fn ready(locator: &str) -> Self {
        Self::new(locator, PlaybackStatus::Ready)
    }

    pub fn loading(locator: &str) -> Self {
        Self::new(locator, PlaybackStatus::Loading)
    }

    pub fn set_status(&self, status: PlaybackStatus) {
        self.state.lock().status = status;
    }

    /// Simulate playback progressing
    pub fn advance(&self, by: Duration) {
        let mut state = self.state.lock();
        if state.playing {
            state.position += by;
        }
    }

    /// Simulate the media reaching its natural end
    pub fn finish_playback(&self) {
        let mut state = self.state.lock();
        state.playing = false;
        state.status = PlaybackStatus::Ended;
    }

    pub fn fail_play(&self) {
        self.state.lock().fail_play = true;
    }

    /// Make `pause` fail and leave the media playing
    pub fn fail_pause(&self) {
        self.state.lock().fail_pause = true;
    }

    pub fn calls(&self) -> Vec<PlaybackCall> {
        self.state.lock().calls.clone()
    }

    pub fn playing(&self) -> bool {
        self.state.lock().playing
    }

    pub fn position(&self) -> Duration {
        self.state.lock().position
    }
}

#[async_trait]
impl PlaybackHandle for FakePlayback {
    fn locator(&self) -> &MediaLocator {
        &self.locator
    }

    fn status(&self) -> PlaybackStatus {
        self.state.lock().status.clone()
    }

    fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    fn current_time(&self) -> Duration {
        self.state.lock().position
    }

    async fn seek(&mut self, position: Duration) -> CaptureResult<()> {
        let mut state = self.state.lock();
        state.calls.push(PlaybackCall::Seek(position));
        state.position = position;
        if state.status == PlaybackStatus::Ended {
            state.status = PlaybackStatus::Ready;
        }
        Ok(())
    }

    async fn play(&mut self) -> CaptureResult<()> {
        let mut state = self.state.lock();
        state.calls.push(PlaybackCall::Play);
        if state.fail_play {
            return Err(CaptureError::Playback("injected play failure".to_string()));
        }
        if !state.status.is_ready() {
            return Err(CaptureError::Playback("media not loaded".to_string()));
        }
        state.playing = true;
        Ok(())
    }

    async fn pause(&mut self) -> CaptureResult<()> {
        let mut state = self.state.lock();
        state.calls.push(PlaybackCall::Pause);
        if state.fail_pause {
            return Err(CaptureError::Playback("injected pause failure".to_string()));
        }
        state.playing = false;
        Ok(())
    }
}

/// Upload collaborator that keeps every payload it receives
#[derive(Clone, Default)]
pub struct RecordingUploader {
    payloads: Arc<Mutex<Vec<UploadPayload>>>,
    failure: Option<String>,
}

impl RecordingUploader {
    pub fn failing(reason: &str) -> Self {
        Self {
            payloads: Arc::default(),
            failure: Some(reason.to_string()),
        }
    }

    pub fn payloads(&self) -> Vec<UploadPayload> {
        self.payloads.lock().clone()
    }
}

#[async_trait]
impl UploadCollaborator for RecordingUploader {
    async fn submit(&self, payload: UploadPayload) -> anyhow::Result<()> {
        if let Some(reason) = &self.failure {
            anyhow::bail!("{}", reason);
        }
        self.payloads.lock().push(payload);
        Ok(())
    }
}
