//! Post-capture review
//!
//! Plays the reference and the fresh capture side by side so the user can
//! check the duet before publishing or retaking it.

use super::sync::{DuetHandoff, DuetSyncController};
use crate::capture::traits::{PlaybackHandle, PlaybackStatus};
use crate::handoff::{submit_payload, UploadCollaborator, UploadPayload};
use crate::recorder::session::RecordingSession;
use crate::utils::error::{CaptureError, CaptureResult};
use std::time::Duration;

/// Joint playback of reference and captured media
pub struct ReviewPlaybackSync {
    session: RecordingSession,
    reference: Box<dyn PlaybackHandle>,
    captured: Box<dyn PlaybackHandle>,
    handoff: DuetHandoff,
    playing: bool,
}

impl ReviewPlaybackSync {
    pub(crate) fn new(
        session: RecordingSession,
        reference: Box<dyn PlaybackHandle>,
        captured: Box<dyn PlaybackHandle>,
        handoff: DuetHandoff,
    ) -> Self {
        Self {
            session,
            reference,
            captured,
            handoff,
            playing: false,
        }
    }

    pub fn handoff(&self) -> &DuetHandoff {
        &self.handoff
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Play controls stay disabled until both streams have loaded
    pub fn controls_enabled(&self) -> bool {
        self.reference.status().is_ready() && self.captured.status().is_ready()
    }

    /// Start both streams from zero, or pause both
    pub async fn toggle_play_pause(&mut self) -> CaptureResult<bool> {
        if self.playing {
            self.pause_both().await?;
            return Ok(false);
        }

        if !self.reference.status().is_ready() {
            return Err(CaptureError::ReferenceMediaNotReady);
        }
        if let PlaybackStatus::Failed(reason) = self.captured.status() {
            return Err(CaptureError::Playback(reason));
        }
        if !self.captured.status().is_ready() {
            return Err(CaptureError::Playback("captured media still loading".to_string()));
        }

        self.reference.seek(Duration::ZERO).await?;
        self.captured.seek(Duration::ZERO).await?;
        self.reference.play().await?;
        if let Err(e) = self.captured.play().await {
            if let Err(pause_err) = self.reference.pause().await {
                tracing::warn!("Failed to pause reference after captured play failed: {}", pause_err);
            }
            return Err(e);
        }

        self.playing = true;
        Ok(true)
    }

    /// Poll playback; when the reference ends both streams stop.
    ///
    /// Returns true if playback was stopped by this call.
    pub async fn refresh(&mut self) -> CaptureResult<bool> {
        if self.playing && self.reference.status() == PlaybackStatus::Ended {
            self.on_reference_ended().await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Reference reached its end
    pub async fn on_reference_ended(&mut self) -> CaptureResult<()> {
        tracing::debug!("Reference ended, pausing review playback");
        self.pause_both().await
    }

    /// Discard the capture and go back to recording with the same reference
    pub async fn retake(mut self) -> CaptureResult<DuetSyncController> {
        if let Err(e) = self.pause_both().await {
            tracing::warn!("Failed to stop review playback: {}", e);
        }
        tracing::info!(
            session = %self.handoff.session_id,
            "Discarding capture {} for retake",
            self.handoff.captured
        );

        self.session.reset()?;
        self.reference.seek(Duration::ZERO).await?;
        let mut controller = DuetSyncController::new(self.session, self.reference)?;
        controller.set_layout(self.handoff.layout)?;
        Ok(controller)
    }

    /// Hand the duet to the upload pipeline
    pub async fn publish(&self, uploader: &dyn UploadCollaborator) -> CaptureResult<()> {
        submit_payload(uploader, UploadPayload::from(&self.handoff)).await
    }

    async fn pause_both(&mut self) -> CaptureResult<()> {
        self.playing = false;
        let reference = self.reference.pause().await;
        let captured = self.captured.pause().await;
        reference.and(captured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::traits::MediaLocator;
    use crate::config::CaptureConfig;
    use crate::duet::layout::DuetLayout;
    use crate::recorder::state::{CaptureMode, SessionState};
    use crate::testing::{
        DeviceCall, FakeDevice, FakeDeviceProvider, FakePlayback, PlaybackCall, RecordingUploader,
        StaticPermissions,
    };
    use std::sync::Arc;

    async fn finished_duet(device: &FakeDevice, reference: &FakePlayback) -> DuetSyncController {
        let session = RecordingSession::new(
            CaptureMode::Duet,
            CaptureConfig::for_mode(CaptureMode::Duet),
            Arc::new(FakeDeviceProvider::front(device.clone())),
            Arc::new(StaticPermissions::granted()),
        )
        .unwrap();
        let mut duet = DuetSyncController::new(session, Box::new(reference.clone())).unwrap();
        duet.start().await.unwrap();
        duet.finish().await.unwrap();
        duet.wait_for_handoff().await.unwrap();
        duet
    }

    #[tokio::test]
    async fn test_controls_wait_for_both_streams() {
        let device = FakeDevice::new("cam");
        let reference = FakePlayback::ready("ref");
        let captured = FakePlayback::loading("file:///cam-1.mp4");
        let duet = finished_duet(&device, &reference).await;
        let mut review = duet.into_review(Box::new(captured.clone())).unwrap();

        assert!(!review.controls_enabled());
        assert!(review.toggle_play_pause().await.is_err());
        assert!(captured.calls().is_empty());

        captured.set_status(PlaybackStatus::Ready);
        assert!(review.controls_enabled());
        assert!(review.toggle_play_pause().await.unwrap());
        assert!(reference.playing());
        assert!(captured.playing());
        assert_eq!(captured.calls()[0], PlaybackCall::Seek(Duration::ZERO));
    }

    #[tokio::test]
    async fn test_toggle_restarts_from_zero() {
        let device = FakeDevice::new("cam");
        let reference = FakePlayback::ready("ref");
        let captured = FakePlayback::ready("file:///cam-1.mp4");
        let duet = finished_duet(&device, &reference).await;
        let mut review = duet.into_review(Box::new(captured.clone())).unwrap();

        review.toggle_play_pause().await.unwrap();
        reference.advance(Duration::from_secs(2));
        captured.advance(Duration::from_secs(2));

        assert!(!review.toggle_play_pause().await.unwrap());
        assert!(!reference.playing());
        assert_eq!(captured.position(), Duration::from_secs(2));

        assert!(review.toggle_play_pause().await.unwrap());
        assert_eq!(reference.position(), Duration::ZERO);
        assert_eq!(captured.position(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_captured_play_failure_stops_reference() {
        let device = FakeDevice::new("cam");
        let reference = FakePlayback::ready("ref");
        let captured = FakePlayback::ready("file:///cam-1.mp4");
        captured.fail_play();
        let duet = finished_duet(&device, &reference).await;
        let mut review = duet.into_review(Box::new(captured.clone())).unwrap();

        assert!(matches!(
            review.toggle_play_pause().await,
            Err(CaptureError::Playback(_))
        ));
        assert!(!review.is_playing());
        assert!(!reference.playing());
        assert_eq!(reference.calls().last(), Some(&PlaybackCall::Pause));
    }

    #[tokio::test]
    async fn test_reference_end_pauses_both() {
        let device = FakeDevice::new("cam");
        let reference = FakePlayback::ready("ref");
        let captured = FakePlayback::ready("file:///cam-1.mp4");
        let duet = finished_duet(&device, &reference).await;
        let mut review = duet.into_review(Box::new(captured.clone())).unwrap();

        review.toggle_play_pause().await.unwrap();
        assert!(!review.refresh().await.unwrap());

        reference.finish_playback();
        assert!(review.refresh().await.unwrap());
        assert!(!review.is_playing());
        assert!(!captured.playing());

        // Replay rewinds past the end
        assert!(review.toggle_play_pause().await.unwrap());
        assert!(reference.playing());
    }

    #[tokio::test]
    async fn test_retake_reuses_reference() {
        let device = FakeDevice::new("cam");
        let reference = FakePlayback::ready("ref");
        let captured = FakePlayback::ready("file:///cam-1.mp4");
        let duet = finished_duet(&device, &reference).await;
        let review = duet.into_review(Box::new(captured.clone())).unwrap();

        let mut duet = review.retake().await.unwrap();
        assert_eq!(duet.state(), SessionState::Idle);
        assert_eq!(duet.reference().locator(), &MediaLocator::new("ref"));
        assert!(duet.handoff().is_none());

        assert!(duet.start().await.unwrap().is_applied());
        assert_eq!(device.count(DeviceCall::Start), 2);
    }

    #[tokio::test]
    async fn test_retake_keeps_layout() {
        let device = FakeDevice::new("cam");
        let reference = FakePlayback::ready("ref");
        let session = RecordingSession::new(
            CaptureMode::Duet,
            CaptureConfig::for_mode(CaptureMode::Duet),
            Arc::new(FakeDeviceProvider::front(device.clone())),
            Arc::new(StaticPermissions::granted()),
        )
        .unwrap();
        let mut duet = DuetSyncController::new(session, Box::new(reference.clone())).unwrap();
        duet.set_layout(DuetLayout::Stacked).unwrap();
        duet.start().await.unwrap();
        duet.finish().await.unwrap();
        duet.wait_for_handoff().await.unwrap();

        let review = duet
            .into_review(Box::new(FakePlayback::ready("file:///cam-1.mp4")))
            .unwrap();
        let duet = review.retake().await.unwrap();
        assert_eq!(duet.layout(), DuetLayout::Stacked);
    }

    #[tokio::test]
    async fn test_publish_hands_off_duet_payload() {
        let device = FakeDevice::new("cam");
        let reference = FakePlayback::ready("ref");
        let duet = finished_duet(&device, &reference).await;
        let review = duet
            .into_review(Box::new(FakePlayback::ready("file:///cam-1.mp4")))
            .unwrap();

        let uploader = RecordingUploader::default();
        review.publish(&uploader).await.unwrap();

        let payloads = uploader.payloads();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].captured_media_locator.as_str(), "file:///cam-1.mp4");
        assert_eq!(payloads[0].reference_media_locator, Some(MediaLocator::new("ref")));
        assert_eq!(payloads[0].layout, Some(DuetLayout::SideBySide));
    }

    #[tokio::test]
    async fn test_review_requires_finished_capture() {
        let device = FakeDevice::new("cam");
        let reference = FakePlayback::ready("ref");
        let session = RecordingSession::new(
            CaptureMode::Duet,
            CaptureConfig::for_mode(CaptureMode::Duet),
            Arc::new(FakeDeviceProvider::front(device)),
            Arc::new(StaticPermissions::granted()),
        )
        .unwrap();
        let duet = DuetSyncController::new(session, Box::new(reference)).unwrap();

        let result = duet.into_review(Box::new(FakePlayback::ready("x")));
        assert!(matches!(result, Err(CaptureError::InvalidTransition { .. })));
    }
}
