use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(usize)]
pub enum EventKind {
    FaceMissing = 0,
    MultipleFaces,
    LookingAway,
    PhoneDetected,
    TabSwitch,
    WindowBlur,
}

impl EventKind {
    pub const COUNT: usize = 6;

    pub const ALL: [EventKind; Self::COUNT] = [
        EventKind::FaceMissing,
        EventKind::MultipleFaces,
        EventKind::LookingAway,
        EventKind::PhoneDetected,
        EventKind::TabSwitch,
        EventKind::WindowBlur,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FaceMissing => "FACE_MISSING",
            Self::MultipleFaces => "MULTIPLE_FACES",
            Self::LookingAway => "LOOKING_AWAY",
            Self::PhoneDetected => "PHONE_DETECTED",
            Self::TabSwitch => "TAB_SWITCH",
            Self::WindowBlur => "WINDOW_BLUR",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GazeDirection {
    #[default]
    Center,
    Left,
    Right,
    Down,
}

/// Push-based page focus notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusSignal {
    /// The page became hidden (tab switched or minimized).
    VisibilityHidden,
    WindowBlur,
}

impl FocusSignal {
    pub fn kind(self) -> EventKind {
        match self {
            Self::VisibilityHidden => EventKind::TabSwitch,
            Self::WindowBlur => EventKind::WindowBlur,
        }
    }
}

/// Type-specific fields; the tag doubles as the wire `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPayload {
    FaceMissing {
        #[serde(rename = "missingMs")]
        missing_ms: u64,
    },
    MultipleFaces {
        count: usize,
    },
    LookingAway {
        direction: GazeDirection,
    },
    PhoneDetected {
        confidence: f32,
    },
    TabSwitch,
    WindowBlur,
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::FaceMissing { .. } => EventKind::FaceMissing,
            Self::MultipleFaces { .. } => EventKind::MultipleFaces,
            Self::LookingAway { .. } => EventKind::LookingAway,
            Self::PhoneDetected { .. } => EventKind::PhoneDetected,
            Self::TabSwitch => EventKind::TabSwitch,
            Self::WindowBlur => EventKind::WindowBlur,
        }
    }
}

/// An accepted anomaly. Serializes as
/// `{"type":"PHONE_DETECTED","ts":1234567890,"confidence":0.61}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProctoringEvent {
    #[serde(flatten)]
    pub payload: EventPayload,
    pub ts: u64,
}

impl ProctoringEvent {
    pub fn new(payload: EventPayload, ts: u64) -> Self {
        Self { payload, ts }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Short human-readable line for operator logs.
    pub fn describe(&self) -> String {
        match &self.payload {
            EventPayload::FaceMissing { missing_ms } => {
                format!("Face not visible for {:.1}s", *missing_ms as f64 / 1000.0)
            }
            EventPayload::MultipleFaces { count } => {
                format!("Multiple faces detected ({})", count)
            }
            EventPayload::LookingAway { direction } => {
                format!("Looking away from screen ({:?})", direction)
            }
            EventPayload::PhoneDetected { confidence } => {
                format!("Phone detected ({:.0}% confidence)", confidence * 100.0)
            }
            EventPayload::TabSwitch => "Switched to another tab".to_string(),
            EventPayload::WindowBlur => "Interview window lost focus".to_string(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
