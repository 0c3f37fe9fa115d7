use api::{BoundingBox, FaceLandmarks, ObjectDetection};
use log::{info, warn};

use crate::config::ProctorConfig;
use crate::cooldown::CooldownGate;
use crate::dispatcher::{EventDispatcher, EventSink};
use crate::gaze::GazeEstimator;
use crate::signal_tracker::{LookingAwayTracker, SignalTracker};
use crate::{EventPayload, FocusSignal, ProctoringEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Stopped,
}

/// Everything the perception adapters produced for one cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionCycleInput {
    pub ts: u64,
    pub faces: Vec<BoundingBox>,
    /// Only present when exactly one face was tracked.
    pub landmarks: Option<FaceLandmarks>,
    /// Present only on cycles where the object detector ran.
    pub objects: Option<Vec<ObjectDetection>>,
}

/// Fuses per-cycle detections into debounced, rate-limited events.
///
/// All detection state lives here and is only touched through the
/// `process_*` methods, so the scheduler can share one engine behind a
/// single lock. Nothing is processed unless the engine is running.
pub struct ProctorEngine {
    config: ProctorConfig,
    state: EngineState,
    gaze: GazeEstimator,
    face_missing: SignalTracker,
    multiple_faces: SignalTracker,
    looking_away: LookingAwayTracker,
    gate: CooldownGate,
    dispatcher: EventDispatcher,
}

impl ProctorEngine {
    pub fn new(config: ProctorConfig) -> Self {
        Self {
            state: EngineState::Idle,
            gaze: GazeEstimator::new(config.gaze.clone()),
            face_missing: SignalTracker::with_grace(
                config.face_missing.grace_ms,
                config.face_missing.required_frames,
            ),
            multiple_faces: SignalTracker::new(config.multiple_faces.required_frames),
            looking_away: LookingAwayTracker::new(config.looking_away.required_frames),
            gate: CooldownGate::new(config.cooldown_ms),
            dispatcher: EventDispatcher::new(),
            config,
        }
    }

    pub fn config(&self) -> &ProctorConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == EngineState::Running
    }

    pub fn register_sink(&mut self, sink: Box<dyn EventSink>) {
        self.dispatcher.register(sink);
    }

    pub fn sink_count(&self) -> usize {
        self.dispatcher.len()
    }

    /// IDLE -> RUNNING. Returns false if the engine was not idle.
    pub fn start(&mut self) -> bool {
        if self.state != EngineState::Idle {
            warn!("Engine start ignored in state {:?}", self.state);
            return false;
        }
        self.state = EngineState::Running;
        info!("Proctoring engine running");
        true
    }

    /// Moves to the terminal STOPPED state and drops all detection state
    /// and sinks. Calling it again is a no-op.
    pub fn stop(&mut self) {
        if self.state == EngineState::Stopped {
            return;
        }
        self.state = EngineState::Stopped;
        self.face_missing.reset();
        self.multiple_faces.reset();
        self.looking_away.reset();
        self.dispatcher.clear();
        info!("Proctoring engine stopped");
    }

    pub fn face_missing(&self) -> &SignalTracker {
        &self.face_missing
    }

    pub fn multiple_faces(&self) -> &SignalTracker {
        &self.multiple_faces
    }

    pub fn looking_away(&self) -> &LookingAwayTracker {
        &self.looking_away
    }

    pub fn cooldown(&self) -> &CooldownGate {
        &self.gate
    }

    pub fn process_cycle(&mut self, input: &DetectionCycleInput) -> Vec<ProctoringEvent> {
        let mut events = Vec::new();
        events.extend(self.process_faces(input.ts, &input.faces, input.landmarks.as_ref()));
        if let Some(objects) = &input.objects {
            events.extend(self.process_objects(input.ts, objects));
        }
        events
    }

    /// Runs the face trackers in priority order: missing face, then multiple
    /// faces, then gaze. At most one of them can fire per cycle.
    pub fn process_faces(
        &mut self,
        ts: u64,
        faces: &[BoundingBox],
        landmarks: Option<&FaceLandmarks>,
    ) -> Option<ProctoringEvent> {
        if !self.is_running() {
            return None;
        }

        #[cfg(feature = "xtralog")]
        log::trace!(
            "cycle ts={} faces={} landmarks={}",
            ts,
            faces.len(),
            landmarks.is_some()
        );

        if faces.is_empty() {
            self.multiple_faces.reset();
            self.looking_away.reset();
            if !self.face_missing.update(true, ts) {
                return None;
            }
            let started = self.face_missing.grace_started_at().unwrap_or(ts);
            let missing_ms = ts.saturating_sub(started);
            return self.offer(EventPayload::FaceMissing { missing_ms }, ts);
        }

        self.face_missing.update(false, ts);

        if faces.len() > 1 {
            if !self.multiple_faces.update(true, ts) {
                return None;
            }
            return self.offer(
                EventPayload::MultipleFaces {
                    count: faces.len(),
                },
                ts,
            );
        }

        self.multiple_faces.update(false, ts);

        let landmarks = landmarks?;
        let direction = self.gaze.estimate(landmarks);
        if !self.looking_away.update(direction, ts) {
            return None;
        }
        self.offer(EventPayload::LookingAway { direction }, ts)
    }

    /// Offers the strongest qualifying phone detection, if any.
    pub fn process_objects(
        &mut self,
        ts: u64,
        objects: &[ObjectDetection],
    ) -> Option<ProctoringEvent> {
        if !self.is_running() {
            return None;
        }

        let phone = &self.config.phone;
        let confidence = objects
            .iter()
            .filter(|o| o.label == phone.label && o.confidence > phone.min_confidence)
            .map(|o| o.confidence)
            .max_by(|a, b| a.total_cmp(b))?;

        self.offer(EventPayload::PhoneDetected { confidence }, ts)
    }

    pub fn process_focus(&mut self, signal: FocusSignal, ts: u64) -> Option<ProctoringEvent> {
        if !self.is_running() {
            return None;
        }
        let payload = match signal {
            FocusSignal::VisibilityHidden => EventPayload::TabSwitch,
            FocusSignal::WindowBlur => EventPayload::WindowBlur,
        };
        self.offer(payload, ts)
    }

    fn offer(&mut self, payload: EventPayload, ts: u64) -> Option<ProctoringEvent> {
        let kind = payload.kind();
        if !self.gate.try_accept(kind, ts) {
            #[cfg(feature = "xtralog")]
            log::trace!("{} suppressed by cooldown", kind);
            return None;
        }

        let event = ProctoringEvent::new(payload, ts);
        let delivered = self.dispatcher.dispatch(&event);
        if delivered < self.dispatcher.len() {
            warn!(
                "{} delivered to {}/{} sinks",
                kind,
                delivered,
                self.dispatcher.len()
            );
        }
        Some(event)
    }
}
