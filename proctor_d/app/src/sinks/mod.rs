pub mod callback;
pub mod event_log;
pub mod udp;
pub mod webhook;

pub use callback::CallbackSink;
pub use event_log::{EventLog, LogEntry, LogSink};
pub use udp::UdpSink;
pub use webhook::WebhookSink;

use common::config::OutputConfig;
use common::EventSink;
use log::error;

const WEBHOOK_QUEUE_LEN: usize = 64;

/// Builds the transport sinks named in the output config. Transports that
/// fail to come up are logged and still registered, so they report as
/// disconnected instead of vanishing silently.
pub fn create_transport_sinks(output: &OutputConfig) -> Vec<Box<dyn EventSink>> {
    let mut sinks: Vec<Box<dyn EventSink>> = Vec::new();

    if let Some(target) = &output.udp_target {
        let mut udp = UdpSink::new(target.clone());
        if let Err(e) = udp.connect() {
            error!("UDP event sink unavailable: {:#}", e);
        }
        sinks.push(Box::new(udp));
    }

    if let Some(url) = &output.webhook_url {
        match WebhookSink::spawn(url.clone(), WEBHOOK_QUEUE_LEN) {
            Ok(sink) => sinks.push(Box::new(sink)),
            Err(e) => error!("Webhook sink unavailable: {:#}", e),
        }
    }

    sinks
}
