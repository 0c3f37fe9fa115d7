use anyhow::Result;
use log::error;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::ProctoringEvent;

/// A consumer of accepted events.
///
/// `deliver` runs on the detection path and must not block; sinks that talk
/// to slow peers hand the event off to their own worker.
pub trait EventSink: Send + Sync {
    fn name(&self) -> &str;
    fn deliver(&self, event: &ProctoringEvent) -> Result<()>;
}

#[derive(Default)]
pub struct EventDispatcher {
    sinks: Vec<Box<dyn EventSink>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, sink: Box<dyn EventSink>) {
        log::debug!("Registered event sink: {}", sink.name());
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn clear(&mut self) {
        self.sinks.clear();
    }

    /// Hands `event` to every sink. A failing or panicking sink is logged and
    /// skipped. Returns how many sinks accepted the event.
    pub fn dispatch(&self, event: &ProctoringEvent) -> usize {
        let mut delivered = 0;
        for sink in &self.sinks {
            match catch_unwind(AssertUnwindSafe(|| sink.deliver(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => error!("Sink '{}' failed to deliver {}: {}", sink.name(), event.kind(), e),
                Err(_) => error!("Sink '{}' panicked while delivering {}", sink.name(), event.kind()),
            }
        }
        delivered
    }
}
