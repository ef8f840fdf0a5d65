//! MIDI output: raw bytes and SysEx toward hardware controllers.
//!
//! The synthesizer drives a control surface with CC, note and SysEx
//! messages (display text, button lights). Open failures are fatal at
//! startup; send failures during streaming are logged and the message is
//! dropped, never surfaced into the audio path.

use crate::{Error, Result};

/// The MIDI output adapter, one connection per driver port.
#[derive(Default)]
pub struct MidiOutput {
    connections: Vec<Option<midir::MidiOutputConnection>>,
}

impl MidiOutput {
    /// An adapter with no ports attached; every write is a logged no-op.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open every available midir output port.
    ///
    /// Returns the number of ports opened.
    pub fn connect(&mut self, client_name: &str) -> Result<usize> {
        let probe =
            midir::MidiOutput::new(client_name).map_err(|e| Error::Midi(e.to_string()))?;
        let driver_ports = probe.ports();
        tracing::info!(available = driver_ports.len(), "MIDI output ports");

        for (index, driver_port) in driver_ports.iter().enumerate() {
            let output = midir::MidiOutput::new(&format!("{client_name}-out-{index}"))
                .map_err(|e| Error::Midi(e.to_string()))?;
            let port_name = output
                .port_name(driver_port)
                .unwrap_or_else(|_| format!("port {index}"));
            tracing::info!(port = index, name = %port_name, "opening MIDI output");
            let connection = output
                .connect(driver_port, &port_name)
                .map_err(|e| Error::Midi(e.to_string()))?;
            self.connections.push(Some(connection));
        }
        Ok(self.connections.len())
    }

    pub fn port_count(&self) -> usize {
        self.connections.len()
    }

    /// Send raw bytes to a port.
    ///
    /// A missing port or a driver send error is logged and the message
    /// dropped.
    pub fn write(&mut self, port: usize, bytes: &[u8]) {
        match self.connections.get_mut(port) {
            Some(Some(connection)) => {
                if let Err(error) = connection.send(bytes) {
                    tracing::warn!(port, %error, "MIDI send failed, dropping message");
                }
            }
            _ => tracing::debug!(port, "no MIDI output on port, dropping message"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_without_ports_is_a_quiet_no_op() {
        let mut out = MidiOutput::new();
        assert_eq!(out.port_count(), 0);
        out.write(1, &[0xf0, 0xf7]);
    }
}
