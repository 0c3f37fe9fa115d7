//! Scenario tests for the engine, driven with synthetic timestamps.

use anyhow::{anyhow, Result};
use common::{
    BoundingBox, DetectionCycleInput, EngineState, EventKind, EventPayload, EventSink,
    FaceLandmarks, FocusSignal, GazeDirection, ObjectDetection, ProctorConfig, ProctorEngine,
    ProctoringEvent,
};
use glam::Vec3;
use std::sync::{Arc, Mutex};

const FRAME_MS: u64 = 100;

#[derive(Clone, Default)]
struct RecordingSink {
    events: Arc<Mutex<Vec<ProctoringEvent>>>,
}

impl RecordingSink {
    fn events(&self) -> Vec<ProctoringEvent> {
        self.events.lock().unwrap().clone()
    }

    fn count(&self, kind: EventKind) -> usize {
        self.events().iter().filter(|e| e.kind() == kind).count()
    }
}

impl EventSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn deliver(&self, event: &ProctoringEvent) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

struct FailingSink;

impl EventSink for FailingSink {
    fn name(&self) -> &str {
        "failing"
    }

    fn deliver(&self, _event: &ProctoringEvent) -> Result<()> {
        Err(anyhow!("transport not connected"))
    }
}

struct PanickingSink;

impl EventSink for PanickingSink {
    fn name(&self) -> &str {
        "panicking"
    }

    fn deliver(&self, _event: &ProctoringEvent) -> Result<()> {
        panic!("ui callback blew up");
    }
}

fn running_engine() -> (ProctorEngine, RecordingSink) {
    let mut engine = ProctorEngine::new(ProctorConfig::default());
    let sink = RecordingSink::default();
    engine.register_sink(Box::new(sink.clone()));
    assert!(engine.start());
    (engine, sink)
}

fn one_face() -> Vec<BoundingBox> {
    vec![BoundingBox {
        x: 0.3,
        y: 0.2,
        width: 0.4,
        height: 0.5,
    }]
}

fn two_faces() -> Vec<BoundingBox> {
    let mut faces = one_face();
    faces.push(BoundingBox {
        x: 0.7,
        ..faces[0]
    });
    faces
}

fn landmarks(nose_x: f32, nose_y: f32) -> FaceLandmarks {
    let mut points = vec![Vec3::ZERO; 468];
    points[1] = Vec3::new(nose_x, nose_y, 0.0);
    points[234] = Vec3::new(0.4, 0.5, 0.0);
    points[454] = Vec3::new(0.6, 0.5, 0.0);
    FaceLandmarks::new(points)
}

mod face_missing {
    use super::*;

    #[test]
    fn sustained_absence_emits_once_per_window() {
        let (mut engine, sink) = running_engine();
        let t0 = 10_000;

        let mut first = None;
        let mut t = t0;
        while first.is_none() && t <= t0 + 5000 {
            if let Some(event) = engine.process_faces(t, &[], None) {
                first = Some(event);
            }
            t += FRAME_MS;
        }

        let event = first.expect("face missing should fire");
        assert_eq!(event.ts, t0 + 1200 + 10 * FRAME_MS);
        assert_eq!(
            event.payload,
            EventPayload::FaceMissing {
                missing_ms: 1200 + 10 * FRAME_MS
            }
        );

        for _ in 0..10 {
            assert!(engine.process_faces(t, &[], None).is_none());
            t += FRAME_MS;
        }
        assert_eq!(sink.count(EventKind::FaceMissing), 1);
    }

    #[test]
    fn nothing_before_grace_plus_required_frames() {
        let (mut engine, sink) = running_engine();
        let t0 = 0;
        let deadline = t0 + 1200 + 10 * FRAME_MS;
        let mut t = t0;
        while t < deadline {
            assert!(engine.process_faces(t, &[], None).is_none(), "fired at {}", t);
            t += FRAME_MS;
        }
        assert!(sink.events().is_empty());
    }

    #[test]
    fn face_returning_restarts_grace() {
        let (mut engine, sink) = running_engine();
        let mut t = 0;
        for _ in 0..20 {
            engine.process_faces(t, &[], None);
            t += FRAME_MS;
        }
        assert!(engine.face_missing().consecutive() > 0);

        engine.process_faces(t, &one_face(), None);
        assert_eq!(engine.face_missing().consecutive(), 0);
        assert_eq!(engine.face_missing().grace_started_at(), None);

        t += FRAME_MS;
        engine.process_faces(t, &[], None);
        assert_eq!(engine.face_missing().grace_started_at(), Some(t));
        assert_eq!(engine.face_missing().consecutive(), 0);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn condition_keeps_reemitting_every_window() {
        let (mut engine, sink) = running_engine();
        let mut t = 0;
        while t <= 20_000 {
            engine.process_faces(t, &[], None);
            t += FRAME_MS;
        }
        let times: Vec<u64> = sink.events().iter().map(|e| e.ts).collect();
        assert_eq!(times, vec![2200, 7200, 12_200, 17_200]);
    }

    #[test]
    fn absence_force_resets_other_trackers() {
        let (mut engine, _sink) = running_engine();
        engine.process_faces(0, &two_faces(), None);
        engine.process_faces(100, &one_face(), Some(&landmarks(0.7, 0.5)));
        assert_eq!(engine.looking_away().signal().consecutive(), 1);

        engine.process_faces(200, &[], None);
        assert_eq!(engine.multiple_faces().consecutive(), 0);
        assert_eq!(engine.looking_away().signal().consecutive(), 0);
    }
}

mod multiple_faces {
    use super::*;

    #[test]
    fn ten_cycles_of_two_faces_emit_once() {
        let (mut engine, sink) = running_engine();
        for i in 0..10 {
            engine.process_faces(i * FRAME_MS, &two_faces(), None);
        }
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload, EventPayload::MultipleFaces { count: 2 });
    }

    #[test]
    fn single_face_frame_resets_counter() {
        let (mut engine, sink) = running_engine();
        for i in 0..9 {
            engine.process_faces(i * FRAME_MS, &two_faces(), None);
        }
        engine.process_faces(900, &one_face(), None);
        assert_eq!(engine.multiple_faces().consecutive(), 0);
        engine.process_faces(1000, &two_faces(), None);
        assert!(sink.events().is_empty());
    }
}

mod looking_away {
    use super::*;

    #[test]
    fn fourteen_off_center_frames_emit_with_direction() {
        let (mut engine, sink) = running_engine();
        for i in 0..13 {
            assert!(engine
                .process_faces(i * FRAME_MS, &one_face(), Some(&landmarks(0.4, 0.5)))
                .is_none());
        }
        let event = engine
            .process_faces(1300, &one_face(), Some(&landmarks(0.6, 0.5)))
            .expect("14th frame should fire");
        assert_eq!(
            event.payload,
            EventPayload::LookingAway {
                direction: GazeDirection::Right
            }
        );
        assert_eq!(sink.count(EventKind::LookingAway), 1);
    }

    #[test]
    fn center_gaze_drops_counter() {
        let (mut engine, _sink) = running_engine();
        for i in 0..10 {
            engine.process_faces(i * FRAME_MS, &one_face(), Some(&landmarks(0.5, 0.9)));
        }
        assert_eq!(engine.looking_away().signal().consecutive(), 10);
        engine.process_faces(1000, &one_face(), Some(&landmarks(0.5, 0.5)));
        assert_eq!(engine.looking_away().signal().consecutive(), 0);
    }

    #[test]
    fn not_evaluated_without_landmarks() {
        let (mut engine, _sink) = running_engine();
        engine.process_faces(0, &one_face(), Some(&landmarks(0.7, 0.5)));
        engine.process_faces(100, &one_face(), None);
        assert_eq!(engine.looking_away().signal().consecutive(), 1);
    }
}

mod phone {
    use super::*;

    #[test]
    fn phone_then_cooldown_suppresses_next_tick() {
        let (mut engine, sink) = running_engine();
        let objects = vec![ObjectDetection::new("cell phone", 0.61)];

        let event = engine.process_objects(0, &objects).expect("phone should fire");
        assert_eq!(event.payload, EventPayload::PhoneDetected { confidence: 0.61 });
        assert!(engine.process_objects(1200, &objects).is_none());
        assert!(engine.process_objects(5000, &objects).is_some());
        assert_eq!(sink.count(EventKind::PhoneDetected), 2);
    }

    #[test]
    fn picks_highest_qualifying_confidence() {
        let (mut engine, _sink) = running_engine();
        let objects = vec![
            ObjectDetection::new("cell phone", 0.58),
            ObjectDetection::new("book", 0.99),
            ObjectDetection::new("cell phone", 0.83),
            ObjectDetection::new("cell phone", 0.40),
        ];
        let event = engine.process_objects(0, &objects).unwrap();
        assert_eq!(event.payload, EventPayload::PhoneDetected { confidence: 0.83 });
    }

    #[test]
    fn threshold_is_exclusive() {
        let (mut engine, _sink) = running_engine();
        let objects = vec![ObjectDetection::new("cell phone", 0.55)];
        assert!(engine.process_objects(0, &objects).is_none());
    }

    #[test]
    fn cycle_input_carries_objects() {
        let (mut engine, _sink) = running_engine();
        let input = DetectionCycleInput {
            ts: 0,
            faces: one_face(),
            landmarks: None,
            objects: Some(vec![ObjectDetection::new("cell phone", 0.9)]),
        };
        let events = engine.process_cycle(&input);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), EventKind::PhoneDetected);
    }
}

mod focus {
    use super::*;

    #[test]
    fn tab_switch_is_immediate_and_gated() {
        let (mut engine, sink) = running_engine();
        let event = engine
            .process_focus(FocusSignal::VisibilityHidden, 100)
            .expect("tab switch should fire immediately");
        assert_eq!(event.payload, EventPayload::TabSwitch);
        assert!(engine.process_focus(FocusSignal::VisibilityHidden, 2000).is_none());
        assert!(engine.process_focus(FocusSignal::WindowBlur, 2000).is_some());
        assert!(engine.process_focus(FocusSignal::VisibilityHidden, 5100).is_some());
        assert_eq!(sink.count(EventKind::TabSwitch), 2);
        assert_eq!(sink.count(EventKind::WindowBlur), 1);
    }
}

mod lifecycle {
    use super::*;

    #[test]
    fn idle_engine_ignores_input() {
        let mut engine = ProctorEngine::new(ProctorConfig::default());
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.process_focus(FocusSignal::WindowBlur, 0).is_none());
        assert!(engine.cooldown().registry().get(EventKind::WindowBlur).is_none());
    }

    #[test]
    fn stop_is_terminal_and_idempotent() {
        let (mut engine, sink) = running_engine();
        for i in 0..5 {
            engine.process_faces(i * FRAME_MS, &two_faces(), None);
        }
        engine.stop();
        engine.stop();
        assert_eq!(engine.state(), EngineState::Stopped);
        assert!(engine.multiple_faces().is_idle());
        assert_eq!(engine.sink_count(), 0);

        assert!(!engine.start());
        assert!(engine.process_focus(FocusSignal::VisibilityHidden, 0).is_none());
        assert!(sink.events().is_empty());
    }
}

mod sink_isolation {
    use super::*;

    #[test]
    fn failing_sinks_do_not_block_others() {
        let mut engine = ProctorEngine::new(ProctorConfig::default());
        let sink = RecordingSink::default();
        engine.register_sink(Box::new(FailingSink));
        engine.register_sink(Box::new(PanickingSink));
        engine.register_sink(Box::new(sink.clone()));
        engine.start();

        assert!(engine.process_focus(FocusSignal::WindowBlur, 0).is_some());
        assert!(engine.process_focus(FocusSignal::VisibilityHidden, 0).is_some());
        assert_eq!(sink.events().len(), 2);
    }
}
