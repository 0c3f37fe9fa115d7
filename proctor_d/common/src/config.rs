use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VisionConfig {
    /// Period of the vision loop; stands in for the display refresh.
    pub frame_interval_ms: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 33,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FaceMissingConfig {
    pub grace_ms: u64,
    pub required_frames: u32,
}

impl Default for FaceMissingConfig {
    fn default() -> Self {
        Self {
            grace_ms: 1200,
            required_frames: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MultipleFacesConfig {
    pub required_frames: u32,
}

impl Default for MultipleFacesConfig {
    fn default() -> Self {
        Self {
            required_frames: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LookingAwayConfig {
    pub required_frames: u32,
}

impl Default for LookingAwayConfig {
    fn default() -> Self {
        Self {
            required_frames: 14,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GazeConfig {
    pub horizontal_threshold: f32,
    pub vertical_threshold: f32,
    pub nose_index: usize,
    pub left_cheek_index: usize,
    pub right_cheek_index: usize,
}

impl Default for GazeConfig {
    fn default() -> Self {
        Self {
            horizontal_threshold: 0.055,
            vertical_threshold: 0.72,
            nose_index: 1,
            left_cheek_index: 234,
            right_cheek_index: 454,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PhoneConfig {
    pub label: String,
    pub min_confidence: f32,
    /// Period of the object-detection loop.
    pub interval_ms: u64,
}

impl Default for PhoneConfig {
    fn default() -> Self {
        Self {
            label: "cell phone".to_string(),
            min_confidence: 0.55,
            interval_ms: 1200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub udp_target: Option<String>,
    pub webhook_url: Option<String>,
    pub http_port: Option<u16>,
    pub log_capacity: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            udp_target: None,
            webhook_url: None,
            http_port: None,
            log_capacity: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProctorConfig {
    pub cooldown_ms: u64,
    pub vision: VisionConfig,
    pub face_missing: FaceMissingConfig,
    pub multiple_faces: MultipleFacesConfig,
    pub looking_away: LookingAwayConfig,
    pub gaze: GazeConfig,
    pub phone: PhoneConfig,
    pub output: OutputConfig,
}

impl Default for ProctorConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 5000,
            vision: VisionConfig::default(),
            face_missing: FaceMissingConfig::default(),
            multiple_faces: MultipleFacesConfig::default(),
            looking_away: LookingAwayConfig::default(),
            gaze: GazeConfig::default(),
            phone: PhoneConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl ProctorConfig {
    /// Reads the config at `path`, writing the defaults there first if the
    /// file does not exist yet.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading config from {:?}", path);
            let file = fs::File::open(path)?;
            let reader = std::io::BufReader::new(file);
            let config = serde_json::from_reader(reader)?;
            Ok(config)
        } else {
            info!("Config not found. Creating default at {:?}", path);
            let config = Self::default();
            let file = fs::File::create(path)?;
            let writer = std::io::BufWriter::new(file);
            serde_json::to_writer_pretty(writer, &config)?;
            Ok(config)
        }
    }
}
