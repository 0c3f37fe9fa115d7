use anyhow::{anyhow, Result};
use common::{EventSink, ProctoringEvent};
use log::{debug, info, warn};
use std::sync::mpsc::{sync_channel, SyncSender, TrySendError};
use std::thread;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// POSTs wire JSON to an HTTP endpoint from a worker thread.
///
/// Events that do not fit in the queue are dropped, not retried.
pub struct WebhookSink {
    url: String,
    tx: SyncSender<ProctoringEvent>,
}

impl WebhookSink {
    pub fn spawn(url: impl Into<String>, queue_len: usize) -> Result<Self> {
        let url = url.into();
        let (tx, rx) = sync_channel::<ProctoringEvent>(queue_len.max(1));
        let target = url.clone();

        thread::Builder::new()
            .name("webhook-sink".to_string())
            .spawn(move || {
                info!("Webhook sink posting to {}", target);
                for event in rx {
                    let response = ureq::post(&target)
                        .timeout(REQUEST_TIMEOUT)
                        .send_json(&event);
                    if let Err(e) = response {
                        warn!("Webhook delivery of {} failed: {}", event.kind(), e);
                    }
                }
                debug!("Webhook worker for {} exiting", target);
            })?;

        Ok(Self { url, tx })
    }
}

impl EventSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    fn deliver(&self, event: &ProctoringEvent) -> Result<()> {
        match self.tx.try_send(event.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(anyhow!("queue for {} full, event dropped", self.url)),
            Err(TrySendError::Disconnected(_)) => {
                Err(anyhow!("worker for {} is gone", self.url))
            }
        }
    }
}
