//! Adapter that plays back a recorded detection script.
//!
//! Implements every perception trait from one JSON file so the daemon can run
//! without a camera or an inference runtime.

use anyhow::{bail, Context, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use crate::{
    BoundingBox, FaceDetector, FaceLandmarks, Frame, FrameSource, LandmarkDetector,
    ObjectDetection, ObjectDetector,
};

/// Highest mesh index a script may name.
pub const MAX_LANDMARK_INDEX: usize = 4096;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayFrame {
    pub at_ms: u64,
    #[serde(default)]
    pub faces: Vec<BoundingBox>,
    /// Sparse landmark map, keyed by mesh index.
    #[serde(default)]
    pub landmarks: Option<BTreeMap<usize, Vec3>>,
    #[serde(default)]
    pub objects: Option<Vec<ObjectDetection>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusCue {
    Hidden,
    Blur,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusEntry {
    pub at_ms: u64,
    pub signal: FocusCue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayScript {
    #[serde(default)]
    pub frames: Vec<ReplayFrame>,
    #[serde(default)]
    pub focus: Vec<FocusEntry>,
}

impl ReplayScript {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Failed to open replay {:?}", path))?;
        let reader = BufReader::new(file);
        let script: ReplayScript =
            serde_json::from_reader(reader).context("Failed to parse replay script")?;
        script.validate()?;
        Ok(script.normalized())
    }

    pub fn validate(&self) -> Result<()> {
        for frame in &self.frames {
            let Some(landmarks) = &frame.landmarks else {
                continue;
            };
            if let Some(&index) = landmarks.keys().next_back() {
                if index > MAX_LANDMARK_INDEX {
                    bail!(
                        "Landmark index {} at {}ms exceeds limit {}",
                        index,
                        frame.at_ms,
                        MAX_LANDMARK_INDEX
                    );
                }
            }
        }
        Ok(())
    }

    pub fn normalized(mut self) -> Self {
        self.frames.sort_by_key(|f| f.at_ms);
        self.focus.sort_by_key(|f| f.at_ms);
        self
    }

    /// Time of the last scripted frame or focus cue.
    pub fn duration_ms(&self) -> u64 {
        let last_frame = self.frames.last().map(|f| f.at_ms).unwrap_or(0);
        let last_focus = self.focus.last().map(|f| f.at_ms).unwrap_or(0);
        last_frame.max(last_focus)
    }

    fn frame_at(&self, elapsed_ms: u64) -> Option<&ReplayFrame> {
        let idx = self.frames.partition_point(|f| f.at_ms <= elapsed_ms);
        idx.checked_sub(1).map(|i| &self.frames[i])
    }

    fn exact(&self, at_ms: u64) -> Option<&ReplayFrame> {
        self.frames
            .binary_search_by_key(&at_ms, |f| f.at_ms)
            .ok()
            .map(|i| &self.frames[i])
    }
}

fn dense_landmarks(sparse: &BTreeMap<usize, Vec3>) -> FaceLandmarks {
    let len = sparse
        .keys()
        .next_back()
        .map(|&k| k.min(MAX_LANDMARK_INDEX) + 1)
        .unwrap_or(0);
    // Unlisted indices stay NaN so they read as missing geometry.
    let mut points = vec![Vec3::NAN; len];
    for (&i, &p) in sparse.range(..len) {
        points[i] = p;
    }
    FaceLandmarks::new(points)
}

pub struct ReplayModule {
    script: ReplayScript,
    opened_at: Mutex<Option<Instant>>,
}

impl ReplayModule {
    pub fn new(script: ReplayScript) -> Self {
        Self {
            script: script.normalized(),
            opened_at: Mutex::new(None),
        }
    }

    pub fn script(&self) -> &ReplayScript {
        &self.script
    }

    fn elapsed_ms(&self) -> Option<u64> {
        let guard = self.opened_at.lock().unwrap_or_else(PoisonError::into_inner);
        guard.map(|t| t.elapsed().as_millis() as u64)
    }

    fn scripted(&self, frame: &Frame) -> Result<&ReplayFrame> {
        self.script
            .exact(frame.captured_at_ms)
            .with_context(|| format!("No scripted frame at {}ms", frame.captured_at_ms))
    }
}

impl FrameSource for ReplayModule {
    fn open(&self) -> Result<()> {
        if self.script.frames.is_empty() {
            bail!("Replay script has no frames");
        }
        self.script.validate()?;
        let mut guard = self.opened_at.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(Instant::now());
        log::info!("Replay source opened with {} frames", self.script.frames.len());
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.elapsed_ms().is_some()
    }

    fn current_frame(&self) -> Option<Frame> {
        let elapsed = self.elapsed_ms()?;
        self.script
            .frame_at(elapsed)
            .map(|f| Frame::empty(f.at_ms))
    }

    fn release(&self) -> Result<()> {
        let mut guard = self.opened_at.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.take().is_some() {
            log::info!("Replay source released");
        }
        Ok(())
    }
}

impl FaceDetector for ReplayModule {
    fn detect_faces(&self, frame: &Frame, _ts: u64) -> Result<Vec<BoundingBox>> {
        Ok(self.scripted(frame)?.faces.clone())
    }
}

impl LandmarkDetector for ReplayModule {
    fn detect_landmarks(&self, frame: &Frame, _ts: u64) -> Result<Option<FaceLandmarks>> {
        Ok(self.scripted(frame)?.landmarks.as_ref().map(dense_landmarks))
    }
}

impl ObjectDetector for ReplayModule {
    fn detect_objects(&self, frame: &Frame) -> Result<Vec<ObjectDetection>> {
        Ok(self.scripted(frame)?.objects.clone().unwrap_or_default())
    }
}
