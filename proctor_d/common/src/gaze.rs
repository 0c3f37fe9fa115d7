use api::FaceLandmarks;
use glam::Vec3;

use crate::config::GazeConfig;
use crate::GazeDirection;

/// Classifies head orientation from three mesh points: the nose tip and the
/// two cheek outlines.
#[derive(Debug, Clone, PartialEq)]
pub struct GazeEstimator {
    config: GazeConfig,
}

impl Default for GazeEstimator {
    fn default() -> Self {
        Self::new(GazeConfig::default())
    }
}

impl GazeEstimator {
    pub fn new(config: GazeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GazeConfig {
        &self.config
    }

    fn point(&self, landmarks: &FaceLandmarks, index: usize) -> Option<Vec3> {
        landmarks.point(index).filter(|p| p.x.is_finite() && p.y.is_finite())
    }

    /// Missing or non-finite geometry yields `Center`.
    pub fn estimate(&self, landmarks: &FaceLandmarks) -> GazeDirection {
        let (Some(nose), Some(left), Some(right)) = (
            self.point(landmarks, self.config.nose_index),
            self.point(landmarks, self.config.left_cheek_index),
            self.point(landmarks, self.config.right_cheek_index),
        ) else {
            return GazeDirection::Center;
        };

        let center_x = (left.x + right.x) / 2.0;
        let offset_x = nose.x - center_x;

        if offset_x > self.config.horizontal_threshold {
            GazeDirection::Right
        } else if offset_x < -self.config.horizontal_threshold {
            GazeDirection::Left
        } else if nose.y > self.config.vertical_threshold {
            GazeDirection::Down
        } else {
            GazeDirection::Center
        }
    }
}
