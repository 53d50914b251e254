//! Session driver
//!
//! Runs a [`RecordingSession`] on its own task. Screen input arrives as
//! commands, the UI tick fires on a fixed interval, and device callbacks are
//! drained after every wake-up. The driver also owns the zoom controller so
//! gesture updates reach the device on the same task that records.

use super::session::{RecordingEvent, RecordingSession};
use super::state::{CancelOutcome, CaptureMode, SessionState, Transition};
use crate::capture::traits::CameraFacing;
use crate::utils::error::{CaptureError, CaptureResult};
use crate::zoom::{GestureEvent, ZoomController, ZoomSnapshot};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

type Reply<T> = oneshot::Sender<CaptureResult<T>>;

enum Command {
    EngageHold(Reply<Transition>),
    ReleaseHold(Reply<Transition>),
    Finish(Reply<Transition>),
    Cancel {
        confirmed: bool,
        reply: Reply<CancelOutcome>,
    },
    Reset(Reply<()>),
    SwitchCamera {
        facing: CameraFacing,
        reply: Reply<()>,
    },
    Gesture(GestureEvent),
    Unmount,
}

fn closed() -> CaptureError {
    CaptureError::Recording("capture session closed".to_string())
}

/// Spawns session tasks
pub struct SessionDriver;

impl SessionDriver {
    /// Move a standalone session onto a background task and return its handle.
    ///
    /// Duet sessions are driven through [`crate::duet::DuetSyncController`],
    /// which keeps the reference video in step; they are rejected here.
    pub fn spawn(session: RecordingSession) -> CaptureResult<SessionHandle> {
        if session.mode() == CaptureMode::Duet {
            return Err(CaptureError::Config(
                "duet sessions need a reference video; use DuetSyncController".to_string(),
            ));
        }

        let (commands, rx) = mpsc::unbounded_channel();
        let state = session.shared_state();
        let busy = session.busy_flag();
        let events = session.subscribe();

        let zoom = ZoomController::new(session.capabilities(), &session.config().zoom);
        let zoom_rx = zoom.subscribe();

        let task = tokio::spawn(run(session, zoom, rx));

        Ok(SessionHandle {
            commands,
            state,
            busy,
            events,
            zoom: zoom_rx,
            task,
        })
    }
}

async fn run(
    mut session: RecordingSession,
    mut zoom: ZoomController,
    mut commands: mpsc::UnboundedReceiver<Command>,
) -> RecordingSession {
    let mut ticker = tokio::time::interval(session.config().poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tracing::debug!(session = %session.id(), "Session driver started");

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Unmount) | None => break,
                Some(command) => dispatch(&mut session, &mut zoom, command).await,
            },
            _ = ticker.tick() => {
                let now = Instant::now();
                zoom.tick(now);
                if let Err(e) = session.tick(now).await {
                    tracing::error!("Auto-stop failed: {}", e);
                }
            }
        }

        if let Err(e) = session.poll_device_events().await {
            tracing::error!("Device callback failed the recording: {}", e);
        }
    }

    shut_down(&mut session).await;
    session
}

async fn dispatch(session: &mut RecordingSession, zoom: &mut ZoomController, command: Command) {
    match command {
        Command::EngageHold(reply) => {
            zoom.set_record_held(true);
            let _ = reply.send(session.engage_hold().await);
        }
        Command::ReleaseHold(reply) => {
            zoom.set_record_held(false);
            let _ = reply.send(session.release_hold().await);
        }
        Command::Finish(reply) => {
            let _ = reply.send(session.finish().await);
        }
        Command::Cancel { confirmed, reply } => {
            let _ = reply.send(session.cancel(confirmed).await);
        }
        Command::Reset(reply) => {
            let _ = reply.send(session.reset());
        }
        Command::SwitchCamera { facing, reply } => {
            let result = session.set_camera_facing(facing);
            if result.is_ok() {
                let hard_max = session.config().zoom.hard_max_zoom;
                zoom.set_capabilities(session.capabilities(), hard_max, Instant::now());
                session.apply_zoom(zoom.current_zoom());
            }
            let _ = reply.send(result);
        }
        Command::Gesture(event) => {
            let before = zoom.current_zoom();
            zoom.handle(event, Instant::now());
            if zoom.current_zoom() != before {
                session.apply_zoom(zoom.current_zoom());
            }
        }
        Command::Unmount => {}
    }
}

/// Stop any capture in flight and let go of the device
async fn shut_down(session: &mut RecordingSession) {
    if !session.state().is_terminal() {
        if let Err(e) = session.cancel(true).await {
            tracing::warn!("Failed to cancel capture on unmount: {}", e);
        }
    }
    session.release();
}

/// Screen-side handle to a running session
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: Arc<RwLock<SessionState>>,
    busy: Arc<AtomicBool>,
    events: broadcast::Receiver<RecordingEvent>,
    zoom: watch::Receiver<ZoomSnapshot>,
    task: JoinHandle<RecordingSession>,
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Whether a device call is in flight; the record button shows a spinner
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.events.resubscribe()
    }

    pub fn zoom(&self) -> watch::Receiver<ZoomSnapshot> {
        self.zoom.clone()
    }

    pub async fn engage_hold(&self) -> CaptureResult<Transition> {
        self.request(Command::EngageHold).await
    }

    pub async fn release_hold(&self) -> CaptureResult<Transition> {
        self.request(Command::ReleaseHold).await
    }

    pub async fn finish(&self) -> CaptureResult<Transition> {
        self.request(Command::Finish).await
    }

    pub async fn cancel(&self, confirmed: bool) -> CaptureResult<CancelOutcome> {
        self.request(|reply| Command::Cancel { confirmed, reply }).await
    }

    pub async fn reset(&self) -> CaptureResult<()> {
        self.request(Command::Reset).await
    }

    pub async fn switch_camera(&self, facing: CameraFacing) -> CaptureResult<()> {
        self.request(|reply| Command::SwitchCamera { facing, reply }).await
    }

    /// Forward a gesture to the zoom controller
    pub fn gesture(&self, event: GestureEvent) -> CaptureResult<()> {
        self.commands
            .send(Command::Gesture(event))
            .map_err(|_| closed())
    }

    /// Tear down the session task, cancelling any capture in flight
    pub async fn unmount(self) -> CaptureResult<RecordingSession> {
        let _ = self.commands.send(Command::Unmount);
        self.task
            .await
            .map_err(|e| CaptureError::Recording(format!("session task failed: {}", e)))
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> CaptureResult<T> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(build(tx)).map_err(|_| closed())?;
        rx.await.map_err(|_| closed())?
    }
}
