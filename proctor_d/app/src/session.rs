//! Session lifecycle: owns the engine, the perception adapters and the
//! three tasks that feed the engine (vision, object detection, focus).

use api::{FaceDetector, FrameSource, LandmarkDetector, ObjectDetector};
use common::{EngineState, EventSink, FocusSignal, ProctorConfig, ProctorEngine};
use log::{debug, error, info, warn};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::scheduler::{spawn_repeating, CancelToken, Cancellation, SessionClock};

pub type SharedEngine = Arc<Mutex<ProctorEngine>>;

fn lock(engine: &SharedEngine) -> MutexGuard<'_, ProctorEngine> {
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session is already running")]
    AlreadyStarted,
    #[error("session has been stopped")]
    Stopped,
    #[error("no tokio runtime available to schedule session tasks")]
    NoRuntime,
    #[error("failed to acquire media source: {0:#}")]
    MediaAcquisition(anyhow::Error),
}

/// The external perception collaborators of one session.
#[derive(Clone)]
pub struct Perception {
    pub frames: Arc<dyn FrameSource>,
    pub faces: Arc<dyn FaceDetector>,
    pub landmarks: Arc<dyn LandmarkDetector>,
    pub objects: Arc<dyn ObjectDetector>,
}

impl Perception {
    /// Uses one adapter for every capability.
    pub fn from_module<M>(module: Arc<M>) -> Self
    where
        M: FrameSource + FaceDetector + LandmarkDetector + ObjectDetector + 'static,
    {
        Self {
            frames: module.clone(),
            faces: module.clone(),
            landmarks: module.clone(),
            objects: module,
        }
    }
}

/// Push side of the page visibility/focus listeners.
#[derive(Debug, Clone)]
pub struct FocusNotifier {
    tx: mpsc::UnboundedSender<FocusSignal>,
}

impl FocusNotifier {
    /// Returns false once the session has detached its listeners.
    pub fn notify(&self, signal: FocusSignal) -> bool {
        self.tx.send(signal).is_ok()
    }
}

#[derive(Clone)]
struct LoopContext {
    engine: SharedEngine,
    perception: Perception,
    clock: SessionClock,
}

impl LoopContext {
    async fn vision_step(&self) {
        if catch_unwind(AssertUnwindSafe(|| self.vision_cycle())).is_err() {
            warn!("Vision adapter panicked, skipping cycle");
        }
    }

    fn vision_cycle(&self) {
        let p = &self.perception;
        if !p.frames.is_ready() || !p.faces.is_ready() || !p.landmarks.is_ready() {
            return;
        }
        let Some(frame) = p.frames.current_frame() else {
            return;
        };

        let ts = self.clock.now_ms();
        let faces = match p.faces.detect_faces(&frame, ts) {
            Ok(faces) => faces,
            Err(e) => {
                debug!("Face detection skipped: {:#}", e);
                return;
            }
        };
        let landmarks = if faces.len() == 1 {
            match p.landmarks.detect_landmarks(&frame, ts) {
                Ok(landmarks) => landmarks,
                Err(e) => {
                    debug!("Landmark detection skipped: {:#}", e);
                    return;
                }
            }
        } else {
            None
        };

        lock(&self.engine).process_faces(ts, &faces, landmarks.as_ref());
    }

    async fn object_step(&self) {
        let p = &self.perception;
        if !p.frames.is_ready() || !p.objects.is_ready() {
            return;
        }
        let Some(frame) = p.frames.current_frame() else {
            return;
        };

        let detector = Arc::clone(&p.objects);
        let objects = match tokio::task::spawn_blocking(move || detector.detect_objects(&frame)).await
        {
            Ok(Ok(objects)) => objects,
            Ok(Err(e)) => {
                debug!("Object detection skipped: {:#}", e);
                return;
            }
            Err(e) => {
                warn!("Object detection task failed: {}", e);
                return;
            }
        };

        let ts = self.clock.now_ms();
        lock(&self.engine).process_objects(ts, &objects);
    }

    async fn listen_focus(
        self,
        mut rx: mpsc::UnboundedReceiver<FocusSignal>,
        mut token: CancelToken,
    ) {
        loop {
            let signal = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                signal = rx.recv() => signal,
            };
            let Some(signal) = signal else {
                break;
            };
            let ts = self.clock.now_ms();
            lock(&self.engine).process_focus(signal, ts);
        }
        debug!("Focus listener detached");
    }
}

/// One proctored session.
///
/// `start` acquires the media source and launches the loops; `stop` tears
/// everything down in one pass and may be called any number of times. The
/// session is also stopped when dropped.
pub struct ProctorSession {
    engine: SharedEngine,
    perception: Option<Perception>,
    cancellation: Cancellation,
    tasks: Vec<JoinHandle<()>>,
    focus_tx: Option<mpsc::UnboundedSender<FocusSignal>>,
    focus_rx: Option<mpsc::UnboundedReceiver<FocusSignal>>,
}

impl ProctorSession {
    pub fn new(config: ProctorConfig, perception: Perception) -> Self {
        let (focus_tx, focus_rx) = mpsc::unbounded_channel();
        Self {
            engine: Arc::new(Mutex::new(ProctorEngine::new(config))),
            perception: Some(perception),
            cancellation: Cancellation::new(),
            tasks: Vec::new(),
            focus_tx: Some(focus_tx),
            focus_rx: Some(focus_rx),
        }
    }

    pub fn engine(&self) -> SharedEngine {
        Arc::clone(&self.engine)
    }

    pub fn state(&self) -> EngineState {
        lock(&self.engine).state()
    }

    pub fn register_sink(&self, sink: Box<dyn EventSink>) {
        lock(&self.engine).register_sink(sink);
    }

    /// Handle for the visibility/focus listeners; `None` once stopped.
    /// Signals sent before `start` are discarded.
    pub fn focus_notifier(&self) -> Option<FocusNotifier> {
        self.focus_tx
            .as_ref()
            .map(|tx| FocusNotifier { tx: tx.clone() })
    }

    pub fn start(&mut self) -> Result<(), SessionError> {
        match self.state() {
            EngineState::Running => return Err(SessionError::AlreadyStarted),
            EngineState::Stopped => return Err(SessionError::Stopped),
            EngineState::Idle => {}
        }
        let runtime = Handle::try_current().map_err(|_| SessionError::NoRuntime)?;
        let perception = self.perception.clone().ok_or(SessionError::Stopped)?;
        let mut focus_rx = self.focus_rx.take().ok_or(SessionError::Stopped)?;

        if let Err(e) = perception.frames.open() {
            error!("Media acquisition failed: {:#}", e);
            self.stop();
            return Err(SessionError::MediaAcquisition(e));
        }

        let config = lock(&self.engine).config().clone();
        let ctx = LoopContext {
            engine: Arc::clone(&self.engine),
            perception,
            clock: SessionClock::start(),
        };
        lock(&self.engine).start();

        let mut stale = 0usize;
        while focus_rx.try_recv().is_ok() {
            stale += 1;
        }
        if stale > 0 {
            debug!("Discarded {} focus signals received before start", stale);
        }

        let vision = ctx.clone();
        self.tasks.push(spawn_repeating(
            "vision",
            Duration::from_millis(config.vision.frame_interval_ms.max(1)),
            self.cancellation.token(),
            move || {
                let ctx = vision.clone();
                async move { ctx.vision_step().await }
            },
        ));

        let objects = ctx.clone();
        self.tasks.push(spawn_repeating(
            "object-detection",
            Duration::from_millis(config.phone.interval_ms.max(1)),
            self.cancellation.token(),
            move || {
                let ctx = objects.clone();
                async move { ctx.object_step().await }
            },
        ));

        self.tasks
            .push(runtime.spawn(ctx.listen_focus(focus_rx, self.cancellation.token())));

        info!("Proctoring session started");
        Ok(())
    }

    /// Stops the engine first so results still in flight are discarded, then
    /// cancels the loops, detaches listeners and releases the media source.
    pub fn stop(&mut self) {
        let was_stopped = {
            let mut engine = lock(&self.engine);
            let was_stopped = engine.state() == EngineState::Stopped;
            engine.stop();
            was_stopped
        };

        self.cancellation.cancel();
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.focus_tx = None;
        self.focus_rx = None;

        if let Some(perception) = self.perception.take() {
            match catch_unwind(AssertUnwindSafe(|| perception.frames.release())) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Failed to release media source: {:#}", e),
                Err(_) => error!("Media source panicked during release"),
            }
        }

        if !was_stopped {
            info!("Proctoring session stopped");
        }
    }
}

impl Drop for ProctorSession {
    fn drop(&mut self) {
        self.stop();
    }
}
