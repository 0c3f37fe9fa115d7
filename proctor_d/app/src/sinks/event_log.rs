use anyhow::Result;
use common::{EventSink, ProctoringEvent};
use log::warn;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};

/// Writes accepted events to the process log.
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn deliver(&self, event: &ProctoringEvent) -> Result<()> {
        warn!(target: "proctor_d::events", "[{}] {}", event.kind(), event.describe());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub event: ProctoringEvent,
    pub message: String,
}

/// Bounded, shareable history of accepted events for display.
#[derive(Debug, Clone)]
pub struct EventLog {
    entries: Arc<RwLock<VecDeque<LogEntry>>>,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(capacity.min(1024)))),
            capacity: capacity.max(1),
        }
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        let guard = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        guard.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for EventLog {
    fn name(&self) -> &str {
        "event-log"
    }

    fn deliver(&self, event: &ProctoringEvent) -> Result<()> {
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if guard.len() == self.capacity {
            guard.pop_front();
        }
        guard.push_back(LogEntry {
            event: event.clone(),
            message: event.describe(),
        });
        Ok(())
    }
}
