pub use api::{BoundingBox, FaceLandmarks, ObjectDetection};

pub mod config;
mod cooldown;
mod dispatcher;
mod engine;
mod event;
mod gaze;
mod signal_tracker;

pub use config::ProctorConfig;
pub use cooldown::{CooldownGate, CooldownRegistry};
pub use dispatcher::{EventDispatcher, EventSink};
pub use engine::{DetectionCycleInput, EngineState, ProctorEngine};
pub use event::{EventKind, EventPayload, FocusSignal, GazeDirection, ProctoringEvent};
pub use gaze::GazeEstimator;
pub use signal_tracker::{LookingAwayTracker, SignalTracker};
