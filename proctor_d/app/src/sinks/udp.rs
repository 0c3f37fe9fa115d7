use anyhow::{bail, Context, Result};
use common::{EventSink, ProctoringEvent};
use log::info;
use std::net::UdpSocket;

/// Sends each event's wire JSON as a single datagram.
pub struct UdpSink {
    socket: Option<UdpSocket>,
    target_address: String,
}

impl UdpSink {
    pub fn new(target_address: impl Into<String>) -> Self {
        Self {
            socket: None,
            target_address: target_address.into(),
        }
    }

    pub fn connect(&mut self) -> Result<()> {
        let socket = UdpSocket::bind("0.0.0.0:0").context("UDP event sink: bind")?;
        socket
            .connect(&self.target_address)
            .with_context(|| format!("UDP event sink: unreachable target {}", self.target_address))?;
        // deliver runs under the engine lock and must never wait on the network.
        socket.set_nonblocking(true)?;

        info!("Sending events as UDP datagrams to {}", self.target_address);
        self.socket = Some(socket);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }
}

impl EventSink for UdpSink {
    fn name(&self) -> &str {
        "udp"
    }

    fn deliver(&self, event: &ProctoringEvent) -> Result<()> {
        let Some(socket) = &self.socket else {
            bail!("transport not connected ({})", self.target_address);
        };
        let json_data = serde_json::to_vec(event)?;
        socket.send(&json_data)?;
        Ok(())
    }
}
