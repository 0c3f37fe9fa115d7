use crate::GazeDirection;

/// Hysteresis for one monitored condition.
///
/// Counts consecutive observations of a condition and reports it as sustained
/// once `required_frames` is reached. With a grace period, counting only
/// begins after the condition has held for longer than `grace_ms`. Any
/// observation where the condition is false resets the tracker to its
/// initial state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalTracker {
    consecutive: u32,
    grace_started_at: Option<u64>,
    grace_ms: Option<u64>,
    required_frames: u32,
}

impl SignalTracker {
    pub fn new(required_frames: u32) -> Self {
        Self {
            consecutive: 0,
            grace_started_at: None,
            grace_ms: None,
            required_frames,
        }
    }

    pub fn with_grace(grace_ms: u64, required_frames: u32) -> Self {
        Self {
            grace_ms: Some(grace_ms),
            ..Self::new(required_frames)
        }
    }

    pub fn update(&mut self, condition_holds: bool, now: u64) -> bool {
        if !condition_holds {
            self.reset();
            return false;
        }

        match self.grace_ms {
            None => self.consecutive = self.consecutive.saturating_add(1),
            Some(grace_ms) => {
                let started = *self.grace_started_at.get_or_insert(now);
                if now.saturating_sub(started) > grace_ms {
                    self.consecutive = self.consecutive.saturating_add(1);
                }
            }
        }

        self.is_sustained()
    }

    pub fn reset(&mut self) {
        self.consecutive = 0;
        self.grace_started_at = None;
    }

    pub fn is_sustained(&self) -> bool {
        self.consecutive >= self.required_frames
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    pub fn grace_started_at(&self) -> Option<u64> {
        self.grace_started_at
    }

    pub fn required_frames(&self) -> u32 {
        self.required_frames
    }

    pub fn is_idle(&self) -> bool {
        self.consecutive == 0 && self.grace_started_at.is_none()
    }
}

/// Tracks an off-center gaze and remembers the latest direction for the
/// event payload. Switching between off-center directions keeps counting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookingAwayTracker {
    signal: SignalTracker,
    last_direction: GazeDirection,
}

impl LookingAwayTracker {
    pub fn new(required_frames: u32) -> Self {
        Self {
            signal: SignalTracker::new(required_frames),
            last_direction: GazeDirection::Center,
        }
    }

    pub fn update(&mut self, direction: GazeDirection, now: u64) -> bool {
        self.last_direction = direction;
        self.signal.update(direction != GazeDirection::Center, now)
    }

    pub fn reset(&mut self) {
        self.signal.reset();
        self.last_direction = GazeDirection::Center;
    }

    pub fn last_direction(&self) -> GazeDirection {
        self.last_direction
    }

    pub fn signal(&self) -> &SignalTracker {
        &self.signal
    }
}
