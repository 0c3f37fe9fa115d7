use anyhow::Result;
use common::{EventSink, ProctoringEvent};

type Callback = Box<dyn Fn(&ProctoringEvent) + Send + Sync>;

/// Forwards events to a closure, e.g. a UI notification hook.
pub struct CallbackSink {
    name: String,
    callback: Callback,
}

impl CallbackSink {
    pub fn new<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&ProctoringEvent) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            callback: Box::new(callback),
        }
    }
}

impl EventSink for CallbackSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn deliver(&self, event: &ProctoringEvent) -> Result<()> {
        (self.callback)(event);
        Ok(())
    }
}
