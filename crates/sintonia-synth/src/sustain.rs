//! Sustain pedal semantics.
//!
//! A stateful transform between the raw MIDI input and the voice map.
//! While the pedal (CC 64) is down, note-offs are parked under their note
//! header; releasing the pedal replays them one per call, oldest key
//! first. Retriggering a parked note emits its deferred note-off *now* and
//! holds the fresh note-on in a single-slot pending field, so the order
//! note-off then note-on is deterministic and no two voices ever coexist
//! under one `(channel, note)`.

use std::collections::BTreeMap;

use sintonia_core::midi::{Message, NoteHeader, NoteOff, NoteOn};
use sintonia_io::{MidiInput, PortIndex};

/// Controller number of the sustain pedal.
const SUSTAIN_PEDAL_CC: i8 = 64;

/// The sustain filter.
#[derive(Default)]
pub struct Sustain {
    /// Pedal state, true while held down.
    state: bool,
    /// True from the down→up edge until the backlog has drained.
    just_released: bool,
    /// Note-offs deferred while the pedal is down.
    sustained_notes: BTreeMap<NoteHeader, NoteOff>,
    /// At most one note-on waiting to follow its replayed note-off.
    postponed_note_on: Option<NoteOn>,
}

impl Sustain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current pedal state.
    pub fn pedal(&self) -> bool {
        self.state
    }

    /// Number of note-offs currently parked.
    pub fn held_notes(&self) -> usize {
        self.sustained_notes.len()
    }

    fn set_pedal(&mut self, down: bool) {
        // A down→up transition books the backlog drain
        if self.state && !down {
            self.just_released = true;
        }
        self.state = down;
    }

    /// Produce the next message of the sustained flow, if any.
    ///
    /// Priority order: the postponed note-on, then one parked note-off
    /// when the pedal was just released, then a fresh message from the
    /// port. Returns whether `out` was filled in.
    pub fn process(&mut self, midi: &MidiInput, port: PortIndex, out: &mut Message) -> bool {
        if let Some(on) = self.postponed_note_on.take() {
            *out = Message::NoteOn(on);
            return true;
        }

        if self.just_released {
            if let Some((_, off)) = self.sustained_notes.pop_first() {
                if self.sustained_notes.is_empty() {
                    self.just_released = false;
                }
                *out = Message::NoteOff(off);
                return true;
            }
            self.just_released = false;
        }

        let mut message = Message::None;
        if !midi.try_read(port, &mut message) {
            return false;
        }

        match message {
            Message::ControlChange(cc) if cc.controller == SUSTAIN_PEDAL_CC => {
                self.set_pedal(cc.value != 0);
                *out = Message::ControlChange(cc);
                true
            }
            Message::NoteOff(off) if self.state => {
                // Park the note-off; nothing flows out this call
                self.sustained_notes.insert(off.note_header(), off);
                false
            }
            Message::NoteOn(on) if self.state => {
                match self.sustained_notes.remove(&on.note_header()) {
                    Some(off) => {
                        // Retrigger of a held note: its deferred note-off
                        // goes out first, the note-on follows next call
                        self.postponed_note_on = Some(on);
                        *out = Message::NoteOff(off);
                        true
                    }
                    None => {
                        *out = Message::NoteOn(on);
                        true
                    }
                }
            }
            other => {
                *out = other;
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sintonia_core::midi::ControlChange;

    /// Keep calling `process` the way successive frames would: a `false`
    /// return (a parked note-off, an empty FIFO) does not end the test
    /// drain, only exhaustion does.
    fn pump(sustain: &mut Sustain, midi: &MidiInput) -> Vec<Message> {
        let mut out = Vec::new();
        for _ in 0..64 {
            let mut msg = Message::None;
            if sustain.process(midi, 0, &mut msg) {
                out.push(msg);
            }
        }
        out
    }

    fn note_on(note: i8, velocity: i8) -> Message {
        Message::NoteOn(NoteOn::new(0, note, velocity))
    }

    fn note_off(note: i8) -> Message {
        Message::NoteOff(NoteOff::new(0, note, 0))
    }

    fn pedal(value: i8) -> Message {
        Message::ControlChange(ControlChange::new(0, SUSTAIN_PEDAL_CC, value))
    }

    #[test]
    fn pedal_up_passes_everything_through() {
        let midi = MidiInput::new(1);
        let mut sustain = Sustain::new();
        midi.insert(0, note_on(60, 100));
        midi.insert(0, note_off(60));
        let out = pump(&mut sustain, &midi);
        assert_eq!(out, vec![note_on(60, 100), note_off(60)]);
    }

    #[test]
    fn pedal_down_defers_note_offs() {
        let midi = MidiInput::new(1);
        let mut sustain = Sustain::new();
        midi.insert(0, pedal(127));
        midi.insert(0, note_on(60, 100));
        midi.insert(0, note_off(60));

        let out = pump(&mut sustain, &midi);
        // The note-off was swallowed
        assert_eq!(out, vec![pedal(127), note_on(60, 100)]);
        assert!(sustain.pedal());
        assert_eq!(sustain.held_notes(), 1);
    }

    #[test]
    fn pedal_release_replays_deferred_offs_in_order() {
        let midi = MidiInput::new(1);
        let mut sustain = Sustain::new();
        midi.insert(0, pedal(127));
        for note in [64, 60, 67] {
            midi.insert(0, note_on(note, 100));
            midi.insert(0, note_off(note));
        }
        pump(&mut sustain, &midi);
        assert_eq!(sustain.held_notes(), 3);

        midi.insert(0, pedal(0));
        let out = pump(&mut sustain, &midi);
        // The pedal edge passes through, then the backlog drains in key
        // order, one per call
        assert_eq!(out, vec![pedal(0), note_off(60), note_off(64), note_off(67)]);
        assert_eq!(sustain.held_notes(), 0);
    }

    #[test]
    fn exactly_one_off_per_held_note() {
        let midi = MidiInput::new(1);
        let mut sustain = Sustain::new();
        for _ in 0..3 {
            midi.insert(0, pedal(127));
            midi.insert(0, note_on(72, 90));
            midi.insert(0, note_off(72));
            midi.insert(0, pedal(0));
        }
        let out = pump(&mut sustain, &midi);
        let offs = out.iter().filter(|m| matches!(m, Message::NoteOff(_))).count();
        let ons = out.iter().filter(|m| matches!(m, Message::NoteOn(_))).count();
        assert_eq!(offs, 3, "one-for-one note-offs across cycles");
        assert_eq!(ons, 3);
    }

    #[test]
    fn retrigger_of_held_note_orders_off_before_on() {
        let midi = MidiInput::new(1);
        let mut sustain = Sustain::new();
        midi.insert(0, note_on(60, 100));
        midi.insert(0, pedal(127));
        midi.insert(0, note_off(60));
        midi.insert(0, note_on(60, 80));

        let out = pump(&mut sustain, &midi);
        assert_eq!(
            out,
            vec![note_on(60, 100), pedal(127), note_off(60), note_on(60, 80)],
            "deferred off must precede the retriggered on"
        );
        assert_eq!(sustain.held_notes(), 0, "retrigger consumed the parked off");
    }

    #[test]
    fn retriggered_note_stays_sustained_afterwards() {
        let midi = MidiInput::new(1);
        let mut sustain = Sustain::new();
        midi.insert(0, pedal(127));
        midi.insert(0, note_on(60, 100));
        midi.insert(0, note_off(60));
        midi.insert(0, note_on(60, 80));
        midi.insert(0, note_off(60));
        pump(&mut sustain, &midi);
        // The second note-off is parked again
        assert_eq!(sustain.held_notes(), 1);

        midi.insert(0, pedal(0));
        let out = pump(&mut sustain, &midi);
        assert_eq!(out, vec![pedal(0), note_off(60)]);
    }

    #[test]
    fn fresh_notes_during_pedal_down_pass_through() {
        let midi = MidiInput::new(1);
        let mut sustain = Sustain::new();
        midi.insert(0, pedal(127));
        midi.insert(0, note_on(60, 100));
        let out = pump(&mut sustain, &midi);
        assert_eq!(out, vec![pedal(127), note_on(60, 100)]);
    }

    #[test]
    fn non_note_messages_flow_during_pedal_down() {
        let midi = MidiInput::new(1);
        let mut sustain = Sustain::new();
        midi.insert(0, pedal(127));
        let cc = Message::ControlChange(ControlChange::new(0, 7, 42));
        midi.insert(0, cc.clone());
        let out = pump(&mut sustain, &midi);
        assert_eq!(out, vec![pedal(127), cc]);
    }
}
