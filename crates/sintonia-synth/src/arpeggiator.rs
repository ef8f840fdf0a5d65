//! Arpeggiator: a note bag emptied onto the MIDI clock grid.
//!
//! The arpeggiator observes every incoming MIDI message, collecting held
//! notes that fall inside its channel and note range into a bag. A
//! `midi_clock` subscription drives the emitter: on each tick the engine
//! callable decides what to play and re-enters synthetic note-ons through
//! the input adapter, so downstream processing cannot tell them from
//! played notes. Several arpeggiators may run at once, each with its own
//! bag, range and engine.

use sintonia_core::clock::Tick;
use sintonia_core::midi::{CLOCKS_PER_QUARTER, Channel, Message, Note, NoteOn};
use sintonia_io::MidiInsert;

/// A pluggable arpeggiator engine, invoked on every MIDI clock while
/// running.
pub type ArpEngine = Box<dyn FnMut(&mut Arpeggiator, &Tick)>;

/// MIDI ticks between emissions of the default engine: a 16th-note grid.
const DEFAULT_GRID: u8 = CLOCKS_PER_QUARTER / 4;

/// The arpeggiator state machine.
pub struct Arpeggiator {
    /// Lowest note observed (inclusive).
    pub low_input_limit: Note,
    /// End of the observed range (exclusive).
    pub high_input_end: Note,
    /// Channel the bag listens on.
    pub input_channel: Channel,
    /// Currently held input notes, in arrival order.
    notes: Vec<NoteOn>,
    /// Next bag position the default engine will play.
    note_index: usize,
    /// The synthetic note currently sounding, if any.
    current_note: Option<NoteOn>,
    running: bool,
    engine: Option<ArpEngine>,
    insert: MidiInsert,
}

impl Arpeggiator {
    /// An arpeggiator watching channel 0 notes below 60, with the default
    /// engine.
    pub fn new(insert: MidiInsert) -> Self {
        Self::with_range(insert, 0, 60)
    }

    /// An arpeggiator watching `[low, high)` on channel 0.
    pub fn with_range(insert: MidiInsert, low: Note, high: Note) -> Self {
        Self {
            low_input_limit: low,
            high_input_end: high,
            input_channel: 0,
            notes: Vec::new(),
            note_index: 0,
            current_note: None,
            running: false,
            engine: None,
            insert,
        }
    }

    /// Replace the default engine with a custom callable.
    pub fn set_engine(&mut self, engine: impl FnMut(&mut Arpeggiator, &Tick) + 'static) {
        self.engine = Some(Box::new(engine));
    }

    /// The notes currently in the bag, in arrival order.
    pub fn notes(&self) -> &[NoteOn] {
        &self.notes
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// The synthetic note currently sounding.
    pub fn current_note(&self) -> Option<NoteOn> {
        self.current_note
    }

    /// Observe one MIDI message.
    ///
    /// Note-ons inside the filter are appended to the bag; note-offs
    /// remove by `(channel, note)` whatever the velocity; everything else
    /// is ignored.
    pub fn midi(&mut self, message: &Message) {
        match message {
            Message::NoteOn(on)
                if on.channel == self.input_channel
                    && (self.low_input_limit..self.high_input_end).contains(&on.note) =>
            {
                self.notes.push(*on);
            }
            Message::NoteOff(off)
                if off.channel == self.input_channel
                    && (self.low_input_limit..self.high_input_end).contains(&off.note) =>
            {
                self.notes
                    .retain(|n| !(n.channel == off.channel && n.note == off.note));
            }
            _ => {}
        }
    }

    /// Start or stop the emitter.
    ///
    /// Stopping emits the pending note-off for the current note so
    /// nothing is left hanging.
    pub fn run(&mut self, running: bool) {
        if self.running && !running {
            self.stop_current_note();
        }
        self.running = running;
    }

    /// Emit the note-off for the sounding synthetic note, if any.
    pub fn stop_current_note(&mut self) {
        if let Some(note) = self.current_note.take() {
            self.insert.insert(Message::NoteOff(note.as_off()));
        }
    }

    /// Insert a synthetic note-on and remember it as the current note.
    ///
    /// Engines call this to emit.
    pub fn emit(&mut self, note: NoteOn) {
        self.current_note = Some(note);
        self.insert.insert(Message::NoteOn(note));
    }

    /// The MIDI clock notification; wire this to a `midi_clock`
    /// subscription.
    pub fn on_midi_clock(&mut self, tick: &Tick) {
        if !self.running {
            return;
        }
        if let Some(mut engine) = self.engine.take() {
            engine(self, tick);
            if self.engine.is_none() {
                self.engine = Some(engine);
            }
            return;
        }
        self.default_engine(tick);
    }

    /// The built-in engine: 16th-note grid, bass on the measure start,
    /// otherwise cycling the bag in arrival order.
    ///
    /// The channel and velocity rules are idiosyncratic but match the
    /// presets this synth ships with: channel 2 on the measure, channel 3
    /// on the third beat (which also forces full velocity), channel 1
    /// elsewhere; transposed up two octaves off-measure and down one on
    /// the measure.
    fn default_engine(&mut self, tick: &Tick) {
        if tick.midi_clock_index % DEFAULT_GRID != 0 {
            return;
        }
        self.stop_current_note();
        if self.notes.is_empty() {
            return;
        }

        let bass = self
            .notes
            .iter()
            .enumerate()
            .min_by_key(|(_, n)| n.note)
            .map(|(i, _)| i)
            .unwrap_or(0);
        if self.note_index >= self.notes.len() {
            self.note_index = 0;
        }

        let mut note = self.notes[if tick.measure { bass } else { self.note_index }];
        note.channel = if tick.measure {
            2
        } else if tick.beat_index == 2 {
            3
        } else {
            1
        };
        let transposed = note.note as i32 + if tick.measure { -12 } else { 24 };
        note.note = transposed.clamp(0, 127) as Note;
        if tick.beat_index == 2 {
            note.velocity = 127;
        }
        self.emit(note);
        self.note_index += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sintonia_core::midi::NoteOff;
    use sintonia_io::MidiInput;

    fn on(channel: i8, note: i8, velocity: i8) -> Message {
        Message::NoteOn(NoteOn::new(channel, note, velocity))
    }

    fn off(channel: i8, note: i8) -> Message {
        Message::NoteOff(NoteOff::new(channel, note, 0))
    }

    /// A tick at the given MIDI clock position.
    fn tick_at(clock_index: u8, beat_index: u32) -> Tick {
        Tick {
            midi_clock_index: clock_index,
            beat_index,
            midi_clock: true,
            beat: clock_index == 0,
            measure: clock_index == 0 && beat_index == 0,
        }
    }

    fn drain(midi: &MidiInput) -> Vec<Message> {
        let mut out = Vec::new();
        let mut msg = Message::None;
        while midi.try_read(0, &mut msg) {
            out.push(msg.clone());
        }
        out
    }

    #[test]
    fn bag_follows_note_lifecycle() {
        let midi = MidiInput::new(1);
        let mut arp = Arpeggiator::new(midi.insert_handle(0));
        arp.midi(&on(0, 48, 100));
        arp.midi(&on(0, 52, 100));
        assert_eq!(arp.notes().len(), 2);
        // Velocity of the off does not matter for removal
        arp.midi(&off(0, 48));
        assert_eq!(arp.notes().len(), 1);
        assert_eq!(arp.notes()[0].note, 52);
    }

    #[test]
    fn bag_filters_channel_and_range() {
        let midi = MidiInput::new(1);
        let mut arp = Arpeggiator::with_range(midi.insert_handle(0), 40, 60);
        arp.midi(&on(0, 39, 100)); // below range
        arp.midi(&on(0, 60, 100)); // high end is exclusive
        arp.midi(&on(1, 50, 100)); // wrong channel
        assert!(arp.notes().is_empty());
        arp.midi(&on(0, 40, 100)); // low end is inclusive
        assert_eq!(arp.notes().len(), 1);
    }

    #[test]
    fn idle_until_run() {
        let midi = MidiInput::new(1);
        let mut arp = Arpeggiator::new(midi.insert_handle(0));
        arp.midi(&on(0, 48, 100));
        arp.on_midi_clock(&tick_at(0, 0));
        assert!(drain(&midi).is_empty());
    }

    #[test]
    fn default_engine_emits_on_the_16th_grid() {
        let midi = MidiInput::new(1);
        let mut arp = Arpeggiator::new(midi.insert_handle(0));
        arp.midi(&on(0, 48, 100));
        arp.run(true);

        // A full beat of MIDI clocks on beat 1 (off-measure)
        for clock in 0..24 {
            arp.on_midi_clock(&tick_at(clock, 1));
        }
        let emitted = drain(&midi);
        // 4 emissions per beat; each one after the first also stops the
        // previous note
        let ons = emitted.iter().filter(|m| matches!(m, Message::NoteOn(_))).count();
        let offs = emitted.iter().filter(|m| matches!(m, Message::NoteOff(_))).count();
        assert_eq!(ons, 4);
        assert_eq!(offs, 3);
    }

    #[test]
    fn measure_start_plays_the_bass_down_an_octave_on_channel_2() {
        let midi = MidiInput::new(1);
        let mut arp = Arpeggiator::new(midi.insert_handle(0));
        arp.midi(&on(0, 52, 100));
        arp.midi(&on(0, 48, 100));
        arp.midi(&on(0, 55, 100));
        arp.run(true);

        arp.on_midi_clock(&tick_at(0, 0));
        let emitted = drain(&midi);
        assert_eq!(emitted.len(), 1);
        match &emitted[0] {
            Message::NoteOn(n) => {
                assert_eq!(n.note, 48 - 12, "bass transposed down an octave");
                assert_eq!(n.channel, 2);
            }
            other => panic!("expected note-on, got {other:?}"),
        }
    }

    #[test]
    fn off_measure_cycles_the_bag_up_two_octaves() {
        let midi = MidiInput::new(1);
        let mut arp = Arpeggiator::new(midi.insert_handle(0));
        arp.midi(&on(0, 48, 100));
        arp.midi(&on(0, 52, 100));
        arp.run(true);

        // Three grid points on beat 1: cycles 48, 52, then wraps to 48
        for clock in [0, 6, 12] {
            arp.on_midi_clock(&tick_at(clock, 1));
        }
        let notes: Vec<i8> = drain(&midi)
            .iter()
            .filter_map(|m| match m {
                Message::NoteOn(n) => Some(n.note),
                _ => None,
            })
            .collect();
        assert_eq!(notes, vec![48 + 24, 52 + 24, 48 + 24]);
    }

    #[test]
    fn third_beat_forces_velocity_and_channel_3() {
        let midi = MidiInput::new(1);
        let mut arp = Arpeggiator::new(midi.insert_handle(0));
        arp.midi(&on(0, 48, 60));
        arp.run(true);

        arp.on_midi_clock(&tick_at(6, 2));
        let emitted = drain(&midi);
        match &emitted[0] {
            Message::NoteOn(n) => {
                assert_eq!(n.velocity, 127);
                assert_eq!(n.channel, 3);
            }
            other => panic!("expected note-on, got {other:?}"),
        }
    }

    #[test]
    fn each_emission_stops_the_previous_note() {
        let midi = MidiInput::new(1);
        let mut arp = Arpeggiator::new(midi.insert_handle(0));
        arp.midi(&on(0, 48, 100));
        arp.run(true);

        arp.on_midi_clock(&tick_at(6, 1));
        arp.on_midi_clock(&tick_at(12, 1));
        let emitted = drain(&midi);
        assert_eq!(emitted.len(), 3);
        assert!(matches!(emitted[0], Message::NoteOn(_)));
        match (&emitted[1], &emitted[2]) {
            (Message::NoteOff(off), Message::NoteOn(on)) => {
                assert_eq!(off.note, 48 + 24);
                assert_eq!(on.note, 48 + 24);
            }
            other => panic!("expected off/on pair, got {other:?}"),
        }
    }

    #[test]
    fn stopping_emits_a_trailing_note_off() {
        let midi = MidiInput::new(1);
        let mut arp = Arpeggiator::new(midi.insert_handle(0));
        arp.midi(&on(0, 48, 100));
        arp.run(true);
        arp.on_midi_clock(&tick_at(6, 1));
        drain(&midi);

        arp.run(false);
        let emitted = drain(&midi);
        assert_eq!(emitted.len(), 1);
        assert!(matches!(emitted[0], Message::NoteOff(_)));
        assert!(arp.current_note().is_none());

        // Clocks while stopped emit nothing more
        arp.on_midi_clock(&tick_at(12, 1));
        assert!(drain(&midi).is_empty());
    }

    #[test]
    fn custom_engine_replaces_the_default() {
        let midi = MidiInput::new(1);
        let mut arp = Arpeggiator::new(midi.insert_handle(0));
        arp.set_engine(|arp, tick| {
            if tick.midi_clock_index == 0 {
                arp.emit(NoteOn::new(5, 100, 99));
            }
        });
        arp.run(true);
        arp.on_midi_clock(&tick_at(0, 0));
        arp.on_midi_clock(&tick_at(1, 0));
        let emitted = drain(&midi);
        assert_eq!(emitted, vec![Message::NoteOn(NoteOn::new(5, 100, 99))]);
    }

    #[test]
    fn independent_instances_keep_independent_bags() {
        let midi = MidiInput::new(1);
        let mut low = Arpeggiator::with_range(midi.insert_handle(0), 0, 48);
        let mut high = Arpeggiator::with_range(midi.insert_handle(0), 48, 96);
        let msg = on(0, 50, 100);
        low.midi(&msg);
        high.midi(&msg);
        assert!(low.notes().is_empty());
        assert_eq!(high.notes().len(), 1);
    }
}
