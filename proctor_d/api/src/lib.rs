mod replay;
pub use replay::{
    FocusCue, FocusEntry, ReplayFrame, ReplayModule, ReplayScript, MAX_LANDMARK_INDEX,
};

use anyhow::Result;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A decoded video frame handed out by a [`FrameSource`].
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Milliseconds since the source was opened.
    pub captured_at_ms: u64,
    pub pixels: Arc<[u8]>,
}

impl Frame {
    pub fn empty(captured_at_ms: u64) -> Self {
        Self {
            width: 0,
            height: 0,
            captured_at_ms,
            pixels: Arc::from(Vec::new()),
        }
    }
}

/// Axis-aligned face box in normalized image coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Face mesh points, indexed the way the landmark model emits them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceLandmarks {
    pub points: Vec<Vec3>,
}

impl FaceLandmarks {
    pub fn new(points: Vec<Vec3>) -> Self {
        Self { points }
    }

    pub fn point(&self, index: usize) -> Option<Vec3> {
        self.points.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDetection {
    pub label: String,
    pub confidence: f32,
}

impl ObjectDetection {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Camera or other media source. Acquisition happens in `open`; a failure
/// there is fatal to the session.
pub trait FrameSource: Send + Sync {
    fn open(&self) -> Result<()>;
    fn is_ready(&self) -> bool;
    fn current_frame(&self) -> Option<Frame>;
    fn release(&self) -> Result<()>;
}

pub trait FaceDetector: Send + Sync {
    fn is_ready(&self) -> bool {
        true
    }
    fn detect_faces(&self, frame: &Frame, ts: u64) -> Result<Vec<BoundingBox>>;
}

/// Only consulted when exactly one face box was found in the frame.
pub trait LandmarkDetector: Send + Sync {
    fn is_ready(&self) -> bool {
        true
    }
    fn detect_landmarks(&self, frame: &Frame, ts: u64) -> Result<Option<FaceLandmarks>>;
}

/// Comparatively slow; polled on its own cadence.
pub trait ObjectDetector: Send + Sync {
    fn is_ready(&self) -> bool {
        true
    }
    fn detect_objects(&self, frame: &Frame) -> Result<Vec<ObjectDetection>>;
}
