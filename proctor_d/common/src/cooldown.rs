use crate::EventKind;

/// Last acceptance time per event kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CooldownRegistry {
    last_emitted: [Option<u64>; EventKind::COUNT],
}

impl CooldownRegistry {
    pub fn get(&self, kind: EventKind) -> Option<u64> {
        self.last_emitted[kind.index()]
    }

    fn record(&mut self, kind: EventKind, now: u64) {
        self.last_emitted[kind.index()] = Some(now);
    }
}

/// Per-kind rate limiter that every candidate event passes through.
#[derive(Debug, Clone)]
pub struct CooldownGate {
    window_ms: u64,
    registry: CooldownRegistry,
}

impl CooldownGate {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            registry: CooldownRegistry::default(),
        }
    }

    /// Accepts `kind` at `now` if nothing of that kind was accepted within
    /// the window, and records the acceptance.
    pub fn try_accept(&mut self, kind: EventKind, now: u64) -> bool {
        let open = match self.registry.get(kind) {
            None => true,
            // A timestamp older than the last acceptance never reopens the gate.
            Some(last) => now >= last && now - last >= self.window_ms,
        };
        if open {
            self.registry.record(kind, now);
        }
        open
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    pub fn registry(&self) -> &CooldownRegistry {
        &self.registry
    }
}
