//! Duet synchronization
//!
//! Pairs a duet [`RecordingSession`] with the reference video's playback
//! handle. The reference plays only while the session is recording: the
//! two start, pause and resume together, and only a fresh start rewinds
//! the reference to zero.

use super::layout::DuetLayout;
use super::review::ReviewPlaybackSync;
use crate::capture::traits::{DeviceEvent, MediaLocator, PlaybackHandle, PlaybackStatus};
use crate::handoff::UploadPayload;
use crate::recorder::session::{RecordingEvent, RecordingSession};
use crate::recorder::state::{CancelOutcome, CaptureMode, CaptureOutput, SessionState, Transition};
use crate::utils::error::{CaptureError, CaptureResult};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use uuid::Uuid;

/// Everything downstream needs once a duet capture finishes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuetHandoff {
    pub session_id: Uuid,
    pub captured: MediaLocator,
    pub reference: MediaLocator,
    pub layout: DuetLayout,
    pub total_active_duration_ms: u64,
}

impl DuetHandoff {
    fn new(output: &CaptureOutput, reference: MediaLocator, layout: DuetLayout) -> Self {
        Self {
            session_id: output.session_id,
            captured: output.captured.clone(),
            reference,
            layout,
            total_active_duration_ms: output.total_active_duration_ms,
        }
    }
}

impl From<&DuetHandoff> for UploadPayload {
    fn from(handoff: &DuetHandoff) -> Self {
        UploadPayload {
            captured_media_locator: handoff.captured.clone(),
            reference_media_locator: Some(handoff.reference.clone()),
            layout: Some(handoff.layout),
            total_active_duration_ms: handoff.total_active_duration_ms,
        }
    }
}

/// Drives one duet capture against its reference video
pub struct DuetSyncController {
    session: RecordingSession,
    reference: Box<dyn PlaybackHandle>,
    layout: DuetLayout,
    handoff: Option<DuetHandoff>,
}

impl DuetSyncController {
    pub fn new(session: RecordingSession, reference: Box<dyn PlaybackHandle>) -> CaptureResult<Self> {
        if session.mode() != CaptureMode::Duet {
            return Err(CaptureError::Config(
                "duet sync needs a duet capture session".to_string(),
            ));
        }
        let layout = session.config().layout;
        tracing::debug!(
            session = %session.id(),
            "Duet paired with reference {}",
            reference.locator()
        );
        Ok(Self {
            session,
            reference,
            layout,
            handoff: None,
        })
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn session(&self) -> &RecordingSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut RecordingSession {
        &mut self.session
    }

    pub fn reference(&self) -> &dyn PlaybackHandle {
        self.reference.as_ref()
    }

    pub fn layout(&self) -> DuetLayout {
        self.layout
    }

    pub fn handoff(&self) -> Option<&DuetHandoff> {
        self.handoff.as_ref()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.session.subscribe()
    }

    /// Whether the start control should be offered (reference loaded)
    pub fn is_reference_ready(&self) -> bool {
        self.reference.status().is_ready()
    }

    /// Rewind the reference and start both streams together.
    ///
    /// While the reference is still loading nothing happens and
    /// [`CaptureError::ReferenceMediaNotReady`] comes back; the screen keeps
    /// showing its loading state and does not alert.
    pub async fn start(&mut self) -> CaptureResult<Transition> {
        if self.session.state() != SessionState::Idle {
            return self.session.begin().await;
        }
        if !self.is_reference_ready() {
            tracing::debug!("Ignoring duet start: reference still loading");
            return Err(CaptureError::ReferenceMediaNotReady);
        }

        self.handoff = None;
        self.reference.seek(Duration::ZERO).await?;
        self.reference.play().await?;

        match self.session.begin().await {
            Ok(Transition::Applied(state)) => {
                self.check_sync()?;
                Ok(Transition::Applied(state))
            }
            Ok(Transition::Ignored) => {
                self.halt_reference().await;
                Ok(Transition::Ignored)
            }
            Err(e) => {
                self.halt_reference().await;
                Err(e)
            }
        }
    }

    /// Pause capture and reference together.
    ///
    /// If the reference refuses to pause the recording is aborted into
    /// `Errored`, so the pair never rests paused with the reference running.
    pub async fn pause(&mut self) -> CaptureResult<Transition> {
        let transition = match self.session.pause().await {
            Ok(transition) => transition,
            Err(e) => {
                self.halt_reference().await;
                return Err(e);
            }
        };
        if transition.is_applied() {
            if let Err(e) = self.reference.pause().await {
                let detail = format!("reference did not pause: {}", e);
                self.session.abort(detail.clone()).await;
                return Err(CaptureError::SyncInvariantViolation(detail));
            }
            self.check_sync()?;
        }
        Ok(transition)
    }

    /// Resume capture and reference together, from where both paused
    pub async fn resume(&mut self) -> CaptureResult<Transition> {
        if self.session.state() != SessionState::Paused {
            return self.session.resume().await;
        }

        self.reference.play().await?;
        match self.session.resume().await {
            Ok(Transition::Applied(state)) => {
                self.check_sync()?;
                Ok(Transition::Applied(state))
            }
            Ok(Transition::Ignored) => {
                self.halt_reference().await;
                Ok(Transition::Ignored)
            }
            Err(e) => {
                self.halt_reference().await;
                Err(e)
            }
        }
    }

    /// Hold engaged on the record button
    pub async fn engage_hold(&mut self) -> CaptureResult<Transition> {
        match self.session.state() {
            SessionState::Idle => self.start().await,
            SessionState::Paused => self.resume().await,
            _ => Ok(Transition::Ignored),
        }
    }

    /// Hold released on the record button
    pub async fn release_hold(&mut self) -> CaptureResult<Transition> {
        match self.session.state() {
            SessionState::Recording => self.pause().await,
            _ => Ok(Transition::Ignored),
        }
    }

    /// Stop capture. The reference keeps its position.
    pub async fn finish(&mut self) -> CaptureResult<Transition> {
        let result = self.session.finish().await;
        self.halt_reference().await;
        let transition = result?;
        if transition.is_applied() {
            self.check_sync()?;
        }
        Ok(transition)
    }

    /// UI tick; an auto-stop also halts the reference
    pub async fn tick(&mut self, now: Instant) -> CaptureResult<Transition> {
        let result = self.session.tick(now).await;
        match &result {
            Ok(Transition::Applied(_)) | Err(_) => self.halt_reference().await,
            Ok(Transition::Ignored) => {}
        }
        result
    }

    /// Feed one device callback; yields the handoff once the file is ready
    pub async fn on_device_event(&mut self, event: DeviceEvent) -> CaptureResult<Option<DuetHandoff>> {
        let result = self.session.handle_device_event(event).await;
        self.settle(result).await
    }

    /// Drain callbacks that have already arrived
    pub async fn poll_device_events(&mut self) -> CaptureResult<Option<DuetHandoff>> {
        let result = self.session.poll_device_events().await;
        self.settle(result).await
    }

    /// Wait for the device to hand over the file after a stop
    pub async fn wait_for_handoff(&mut self) -> CaptureResult<DuetHandoff> {
        let result = self.session.wait_for_output().await.map(Some);
        self.settle(result)
            .await?
            .ok_or_else(|| CaptureError::Recording("recording finished without media".to_string()))
    }

    async fn settle(
        &mut self,
        result: CaptureResult<Option<CaptureOutput>>,
    ) -> CaptureResult<Option<DuetHandoff>> {
        match result {
            Ok(Some(output)) => {
                self.halt_reference().await;
                let handoff = DuetHandoff::new(&output, self.reference.locator().clone(), self.layout);
                tracing::info!(
                    session = %handoff.session_id,
                    "Duet capture ready: {} over {}",
                    handoff.captured,
                    handoff.reference
                );
                self.handoff = Some(handoff.clone());
                Ok(Some(handoff))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                self.halt_reference().await;
                Err(e)
            }
        }
    }

    /// Cancel the duet. Recorded content is only discarded when `confirmed`.
    pub async fn cancel(&mut self, confirmed: bool) -> CaptureResult<CancelOutcome> {
        let outcome = self.session.cancel(confirmed).await?;
        if outcome == CancelOutcome::Cancelled {
            self.handoff = None;
            // Rewind even when the pause fails
            let paused = self.reference.pause().await;
            let rewound = self.reference.seek(Duration::ZERO).await;
            if let Err(e) = paused.and(rewound) {
                tracing::error!("Reference not reset after cancel: {}", e);
                return Err(CaptureError::SyncInvariantViolation(format!(
                    "reference not reset after cancel: {}",
                    e
                )));
            }
        }
        Ok(outcome)
    }

    /// Flip between side-by-side and stacked
    pub fn toggle_layout(&mut self) -> CaptureResult<DuetLayout> {
        self.set_layout(self.layout.toggled())
    }

    pub fn set_layout(&mut self, layout: DuetLayout) -> CaptureResult<DuetLayout> {
        let state = self.session.state();
        if state.is_terminal() {
            return Err(CaptureError::InvalidTransition {
                action: "change layout",
                state: state.to_string(),
            });
        }
        self.layout = layout;
        Ok(layout)
    }

    /// Verify the reference plays exactly when the session records
    pub fn check_sync(&self) -> CaptureResult<()> {
        let state = self.session.state();
        let playing = self.reference.is_playing();
        let consistent = match state {
            // A reference shorter than the capture may end on its own
            SessionState::Recording => playing || self.reference.status() == PlaybackStatus::Ended,
            _ => !playing,
        };
        if consistent {
            return Ok(());
        }

        let detail = format!(
            "reference {} while session is {}",
            if playing { "playing" } else { "paused" },
            state
        );
        tracing::error!(session = %self.session.id(), "Duet out of sync: {}", detail);
        Err(CaptureError::SyncInvariantViolation(detail))
    }

    /// Move to joint review once the capture has finished
    pub fn into_review(self, captured: Box<dyn PlaybackHandle>) -> CaptureResult<ReviewPlaybackSync> {
        let state = self.session.state();
        match self.handoff {
            Some(handoff) if state == SessionState::Finished => Ok(ReviewPlaybackSync::new(
                self.session,
                self.reference,
                captured,
                handoff,
            )),
            _ => Err(CaptureError::InvalidTransition {
                action: "review",
                state: state.to_string(),
            }),
        }
    }

    /// Screen unmounted: abort any capture and stop the reference
    pub async fn unmount(&mut self) {
        if !self.session.state().is_terminal() {
            if let Err(e) = self.cancel(true).await {
                tracing::warn!("Failed to cancel duet on unmount: {}", e);
            }
        }
        self.halt_reference().await;
        self.session.release();
    }

    async fn halt_reference(&mut self) {
        if self.reference.is_playing() {
            if let Err(e) = self.reference.pause().await {
                tracing::warn!("Failed to pause reference {}: {}", self.reference.locator(), e);
            }
        }
    }
}
