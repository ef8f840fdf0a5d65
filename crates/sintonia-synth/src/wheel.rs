//! Pitch-bend and modulation broadcast scalars.
//!
//! Both wheels are shared [`Param`] handles with last-writer-wins
//! semantics. The registered actions run during
//! `dispatch_registered_actions` on the synthesis thread, so a value
//! written by a wheel move is stable for the whole frame that reads it.

use sintonia_core::midi::{Channel, Header, Message};
use sintonia_core::param::Param;
use sintonia_io::{MidiInput, PortIndex};

/// Controller number of the modulation wheel.
const MODULATION_CC: i8 = 1;

/// Register the pitch-bend wheel of `(port, channel)`.
///
/// Returns the broadcast scalar in [-1, +1], at rest initially. Clone it
/// into every parameter set that should follow the wheel.
pub fn register_pitch_bend(midi: &mut MidiInput, port: PortIndex, channel: Channel) -> Param {
    let wheel = Param::new(0.0);
    let writer = wheel.clone();
    midi.add_action(port, Header::PitchBend { channel }, move |message| {
        if let Message::PitchBend(bend) = message {
            writer.set(bend.value);
        }
    });
    wheel
}

/// Register the modulation wheel (CC 1) of `(port, channel)`.
///
/// Returns the broadcast scalar in [0, 1].
pub fn register_modulation_wheel(
    midi: &mut MidiInput,
    port: PortIndex,
    channel: Channel,
) -> Param {
    let wheel = Param::new(0.0);
    let writer = wheel.clone();
    midi.cc_action(port, channel, MODULATION_CC, move |value| {
        writer.set(sintonia_core::midi::value_unit(value));
    });
    wheel
}
