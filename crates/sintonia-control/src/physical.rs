//! Physical control items.
//!
//! A physical item stands for one hardware control, identified by the
//! MIDI events it emits. Constructing one registers the matching action
//! with the MIDI input adapter; when the hardware fires, the action runs
//! on the synthesis thread during dispatch, updates the item's latest
//! 7-bit value, invokes the item's listeners in insertion order, and
//! finally offers the item to the user-interface layer stack.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use sintonia_core::midi::{Header, Velocity};
use sintonia_io::MidiInput;

use crate::item::Item;
use crate::ui::UiHandle;

/// Port watched for CC and pad events.
const CONTROL_PORT: usize = 0;
/// Port watched for button note events.
const BUTTON_PORT: usize = 1;
/// Channel pads speak on (the percussion channel).
const PAD_CHANNEL: i8 = 9;

static NEXT_ID: AtomicU32 = AtomicU32::new(0);

/// Stable identity of a physical item, the key of group dispatch tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhysicalId(u32);

/// What kind of control the hardware presents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhysicalKind {
    Button,
    Knob,
    Slider,
    Pad,
}

/// The MIDI event a physical item is identified by.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhysicalEvent {
    /// An absolute controller.
    Cc(i8),
    /// A relative (increment) encoder controller.
    CcInc(i8),
    /// A note from the button port.
    Note(i8),
    /// A colored pad note with its three light codes.
    Pad { note: i8, red: u8, green: u8, blue: u8 },
}

/// Shared state between the item and its registered adapter action.
struct PhysicalState {
    id: PhysicalId,
    value: Cell<Velocity>,
    listeners: RefCell<Vec<Box<dyn Fn(Velocity)>>>,
    ui: UiHandle,
}

impl PhysicalState {
    /// Listener fan-out, then the layer stack.
    ///
    /// Runs with the interface borrowed; group actions must not re-enter
    /// the interface.
    fn fire(&self) {
        let value = self.value.get();
        for listener in self.listeners.borrow().iter() {
            listener(value);
        }
        self.ui.borrow().dispatch(self.id);
    }
}

/// A physical control on the surface.
pub struct PhysicalItem {
    pub kind: PhysicalKind,
    pub event: PhysicalEvent,
    pub name: String,
    state: Rc<PhysicalState>,
}

impl PhysicalItem {
    /// Create the item and register its adapter action.
    pub fn new(
        midi: &mut MidiInput,
        ui: UiHandle,
        kind: PhysicalKind,
        event: PhysicalEvent,
        name: &str,
    ) -> Self {
        let id = PhysicalId(NEXT_ID.fetch_add(1, Ordering::Relaxed));
        let state = Rc::new(PhysicalState {
            id,
            value: Cell::new(0),
            listeners: RefCell::new(Vec::new()),
            ui,
        });

        match event {
            PhysicalEvent::Cc(number) => {
                let state = state.clone();
                midi.cc_action(CONTROL_PORT, 0, number, move |value| {
                    state.value.set(value);
                    state.fire();
                });
            }
            PhysicalEvent::CcInc(number) => {
                let state = state.clone();
                midi.cc_action(CONTROL_PORT, 0, number, move |value| {
                    // Two's-complement relative encoding around 64
                    let delta = if value < 64 { value as i32 } else { value as i32 - 128 };
                    let next = (state.value.get() as i32 + delta).clamp(0, 127);
                    state.value.set(next as Velocity);
                    state.fire();
                });
            }
            PhysicalEvent::Note(note) => {
                let state = state.clone();
                midi.add_action(
                    BUTTON_PORT,
                    Header::NoteOn { channel: 0, note },
                    move |_| {
                        // A button press toggles the recycled value
                        state.value.set(if state.value.get() == 0 { 127 } else { 0 });
                        state.fire();
                    },
                );
            }
            PhysicalEvent::Pad { note, .. } => {
                let state = state.clone();
                midi.add_action(
                    CONTROL_PORT,
                    Header::NoteOn { channel: PAD_CHANNEL, note },
                    move |_| {
                        state.value.set(if state.value.get() == 0 { 127 } else { 0 });
                        state.fire();
                    },
                );
            }
        }

        Self { kind, event, name: name.into(), state }
    }

    pub fn id(&self) -> PhysicalId {
        self.state.id
    }

    /// Latest 7-bit value received from the hardware.
    pub fn value(&self) -> Velocity {
        self.state.value.get()
    }

    /// Latest value normalized to [0, 1].
    pub fn value_unit(&self) -> f64 {
        sintonia_core::midi::value_unit(self.value())
    }

    /// Attach a listener invoked with the new value on every event, in
    /// insertion order, before the layer-stack dispatch.
    pub fn add_action(&self, action: impl Fn(Velocity) + 'static) {
        self.state.listeners.borrow_mut().push(Box::new(action));
    }

    /// Connect this control directly to a logical item, bypassing the
    /// layer stack.
    pub fn connect(&self, item: &Item) {
        let item = item.clone();
        self.add_action(move |value| item.set_from_controller(value));
    }

    /// A reader of this item's latest value for group bindings.
    pub fn reader(&self) -> impl Fn() -> Velocity + 'static {
        let state = self.state.clone();
        move || state.value.get()
    }
}
