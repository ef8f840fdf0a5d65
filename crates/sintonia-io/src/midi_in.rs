//! MIDI input adapter: per-port FIFOs and the action registry.
//!
//! Each port carries two bounded FIFOs fed by the driver callback:
//!
//! - the *read* FIFO, consumed explicitly by the synthesis loop (the
//!   sustain filter pumps it);
//! - the *dispatch* FIFO, drained by
//!   [`MidiInput::dispatch_registered_actions`] so registered actions run
//!   on the synthesis thread, never inside the driver callback.
//!
//! The callback only ever `try_send`s; a full FIFO drops the newest
//! message with a warning. Arpeggiators re-enter synthetic notes through a
//! cloneable [`MidiInsert`] handle.

use std::collections::BTreeMap;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use sintonia_core::midi::{self, Header, Message};

use crate::{Error, Result};

/// Index of a MIDI input port, used as an address in action dispatch.
pub type PortIndex = usize;

/// Capacity of each per-port FIFO.
const FIFO_CAPACITY: usize = 64;

type Action = Box<dyn FnMut(&Message)>;

struct PortQueues {
    read_tx: Sender<Message>,
    read_rx: Receiver<Message>,
    dispatch_tx: Sender<Message>,
    dispatch_rx: Receiver<Message>,
}

impl PortQueues {
    fn new() -> Self {
        let (read_tx, read_rx) = bounded(FIFO_CAPACITY);
        let (dispatch_tx, dispatch_rx) = bounded(FIFO_CAPACITY);
        Self { read_tx, read_rx, dispatch_tx, dispatch_rx }
    }
}

/// A cloneable handle for inserting messages into a port's input flow.
///
/// Sends never block; when the FIFO is full the message is dropped with a
/// warning, like any other producer.
#[derive(Clone)]
pub struct MidiInsert {
    port: PortIndex,
    tx: Sender<Message>,
}

impl MidiInsert {
    /// Insert a synthetic message as if the port had received it.
    pub fn insert(&self, message: Message) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(message) {
            tracing::warn!(port = self.port, "input FIFO full, dropping inserted message");
        }
    }
}

/// The MIDI input adapter.
pub struct MidiInput {
    ports: Vec<PortQueues>,
    actions: BTreeMap<(PortIndex, Header), Vec<Action>>,
    /// Keeps driver connections alive for the adapter's lifetime.
    connections: Vec<midir::MidiInputConnection<()>>,
}

impl MidiInput {
    /// An adapter with `port_count` ports and no device attached.
    ///
    /// Messages arrive either from [`MidiInput::connect`] or through
    /// [`MidiInput::feed`]/[`MidiInput::insert`].
    pub fn new(port_count: usize) -> Self {
        Self {
            ports: (0..port_count).map(|_| PortQueues::new()).collect(),
            actions: BTreeMap::new(),
            connections: Vec::new(),
        }
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// Attach midir input ports, lowest port number first, at most one
    /// driver port per adapter port.
    ///
    /// Returns the number of ports connected. Failing to open the driver
    /// is fatal for the caller; per-message errors later are logged and
    /// the message dropped.
    pub fn connect(&mut self, client_name: &str) -> Result<usize> {
        let probe =
            midir::MidiInput::new(client_name).map_err(|e| Error::Midi(e.to_string()))?;
        let driver_ports = probe.ports();
        tracing::info!(available = driver_ports.len(), "MIDI input sources");

        for (index, driver_port) in driver_ports.iter().take(self.ports.len()).enumerate() {
            let mut input = midir::MidiInput::new(&format!("{client_name}-in-{index}"))
                .map_err(|e| Error::Midi(e.to_string()))?;
            // Deliver sysex, time and sensing bytes too
            input.ignore(midir::Ignore::None);

            let port_name = input
                .port_name(driver_port)
                .unwrap_or_else(|_| format!("port {index}"));
            tracing::info!(port = index, name = %port_name, "opening MIDI input");

            let read_tx = self.ports[index].read_tx.clone();
            let dispatch_tx = self.ports[index].dispatch_tx.clone();
            let connection = input
                .connect(
                    driver_port,
                    &port_name,
                    move |_timestamp, bytes, _| {
                        push_parsed(index, bytes, &read_tx, &dispatch_tx);
                    },
                    (),
                )
                .map_err(|e| Error::Midi(e.to_string()))?;
            self.connections.push(connection);
        }
        Ok(self.connections.len())
    }

    /// Feed raw driver bytes into a port, exactly as the callback does.
    pub fn feed(&self, port: PortIndex, bytes: &[u8]) {
        push_parsed(port, bytes, &self.ports[port].read_tx, &self.ports[port].dispatch_tx);
    }

    /// A handle for inserting messages into `port` from elsewhere.
    pub fn insert_handle(&self, port: PortIndex) -> MidiInsert {
        MidiInsert { port, tx: self.ports[port].read_tx.clone() }
    }

    /// Insert a synthetic message into a port's read flow.
    pub fn insert(&self, port: PortIndex, message: Message) {
        self.insert_handle(port).insert(message);
    }

    /// Read one message, blocking until one arrives.
    pub fn read(&self, port: PortIndex) -> Message {
        // The adapter keeps a sender alive, so the channel cannot close
        self.ports[port].read_rx.recv().unwrap_or_default()
    }

    /// Read one message without blocking.
    ///
    /// Returns whether `message` was filled in.
    pub fn try_read(&self, port: PortIndex, message: &mut Message) -> bool {
        match self.ports[port].read_rx.try_recv() {
            Ok(m) => {
                *message = m;
                true
            }
            Err(_) => false,
        }
    }

    /// Register an action for every message on `port` whose header equals
    /// `header`.
    ///
    /// Several actions may share one header; they run in registration
    /// order.
    pub fn add_action(
        &mut self,
        port: PortIndex,
        header: Header,
        action: impl FnMut(&Message) + 'static,
    ) {
        self.actions.entry((port, header)).or_default().push(Box::new(action));
    }

    /// Register an action for a control change, receiving the 7-bit value.
    pub fn cc_action(
        &mut self,
        port: PortIndex,
        channel: midi::Channel,
        controller: i8,
        mut action: impl FnMut(i8) + 'static,
    ) {
        let header = Header::ControlChange { channel, controller };
        self.add_action(port, header, move |message| {
            if let Message::ControlChange(cc) = message {
                action(cc.value);
            }
        });
    }

    /// Drain every port's dispatch FIFO and run the matching actions.
    ///
    /// Called once per frame by the synthesis loop, so registered actions
    /// mutate parameters on the same thread that reads them.
    pub fn dispatch_registered_actions(&mut self) {
        for port in 0..self.ports.len() {
            while let Ok(message) = self.ports[port].dispatch_rx.try_recv() {
                let key = (port, message.header());
                if let Some(actions) = self.actions.get_mut(&key) {
                    for action in actions.iter_mut() {
                        action(&message);
                    }
                }
            }
        }
    }
}

/// Parse and fan a driver message out to both FIFOs.
///
/// Runs on the driver thread: no blocking, no allocation beyond the parse
/// itself, drops on overflow.
fn push_parsed(
    port: PortIndex,
    bytes: &[u8],
    read_tx: &Sender<Message>,
    dispatch_tx: &Sender<Message>,
) {
    let message = midi::parse(bytes);
    if message == Message::None {
        tracing::debug!(port, len = bytes.len(), "discarding unrecognized MIDI bytes");
        return;
    }
    if let Err(TrySendError::Full(_)) = dispatch_tx.try_send(message.clone()) {
        tracing::warn!(port, "dispatch FIFO full, dropping message");
    }
    if let Err(TrySendError::Full(_)) = read_tx.try_send(message) {
        tracing::warn!(port, "input FIFO full, dropping message");
    }
}
