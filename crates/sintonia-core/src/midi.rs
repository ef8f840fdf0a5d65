//! MIDI message model and parsing.
//!
//! Follows the MIDI 1.0 Detailed Specification (document 96-1-4, revised
//! February 1996): 3-byte channel voice messages plus multi-byte system
//! exclusive. Numeric fields use signed storage so downstream arithmetic
//! (transposition, scaling) never trips on unsigned wrap.

use libm::{exp, log, pow};

/// Number of notes MIDI can address.
pub const NOTE_COUNT: usize = 128;

/// MIDI clocks per quarter note.
pub const CLOCKS_PER_QUARTER: u8 = 24;

/// MIDI channel number, 0 to 15 (logical channels above 15 exist only
/// inside the synthesizer, never on the wire).
pub type Channel = i8;

/// MIDI note number, 0 to 127. Middle C is 60.
pub type Note = i8;

/// MIDI velocity, 0 to 127.
pub type Velocity = i8;

/// Identity of a note independent of its on/off direction.
///
/// Sustain bookkeeping and arpeggiator bags key on this: a note replayed on
/// another channel is a different note.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NoteHeader {
    pub channel: Channel,
    pub note: Note,
}

/// A "note on" channel voice message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoteOn {
    pub channel: Channel,
    pub note: Note,
    pub velocity: Velocity,
}

impl NoteOn {
    pub const fn new(channel: Channel, note: Note, velocity: Velocity) -> Self {
        Self { channel, note, velocity }
    }

    /// Velocity normalized to [0, 1].
    #[inline]
    pub fn velocity_unit(&self) -> f64 {
        self.velocity as f64 / 127.0
    }

    /// The note-off that ends this note.
    pub fn as_off(&self) -> NoteOff {
        NoteOff { channel: self.channel, note: self.note, velocity: self.velocity }
    }

    pub fn note_header(&self) -> NoteHeader {
        NoteHeader { channel: self.channel, note: self.note }
    }
}

/// A "note off" channel voice message, same shape as [`NoteOn`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoteOff {
    pub channel: Channel,
    pub note: Note,
    pub velocity: Velocity,
}

impl NoteOff {
    pub const fn new(channel: Channel, note: Note, velocity: Velocity) -> Self {
        Self { channel, note, velocity }
    }

    pub fn note_header(&self) -> NoteHeader {
        NoteHeader { channel: self.channel, note: self.note }
    }
}

/// A "control change" message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControlChange {
    pub channel: Channel,
    /// Controller number, 0 to 127. 1 is the modulation wheel, 64 the
    /// sustain pedal.
    pub controller: i8,
    pub value: i8,
}

impl ControlChange {
    pub const fn new(channel: Channel, controller: i8, value: i8) -> Self {
        Self { channel, controller, value }
    }

    /// The value normalized to [0, 1].
    #[inline]
    pub fn value_unit(&self) -> f64 {
        value_unit(self.value)
    }

    /// The value scaled linearly into [low, high].
    #[inline]
    pub fn value_in(&self, low: f64, high: f64) -> f64 {
        value_in(self.value, low, high)
    }

    /// The value scaled logarithmically into [low, high].
    #[inline]
    pub fn log_value_in(&self, low: f64, high: f64) -> f64 {
        log_value_in(self.value, low, high)
    }
}

/// A 7-bit controller value normalized to [0, 1].
#[inline]
pub fn value_unit(v: i8) -> f64 {
    v as f64 / 127.0
}

/// A 7-bit controller value scaled linearly into [low, high].
#[inline]
pub fn value_in(v: i8, low: f64, high: f64) -> f64 {
    low + value_unit(v) * (high - low)
}

/// A 7-bit controller value scaled logarithmically into [low, high].
///
/// Both bounds must be strictly positive.
#[inline]
pub fn log_value_in(v: i8, low: f64, high: f64) -> f64 {
    low * exp(log(high / low) * value_unit(v))
}

/// A pitch-bend message, normalized around the 14-bit center 8192.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PitchBend {
    pub channel: Channel,
    /// Bend amount in [-1, +1], 0 at rest.
    pub value: f64,
}

impl PitchBend {
    pub fn new(channel: Channel, value: f64) -> Self {
        Self { channel, value }
    }

    /// Reconstruct the 14-bit wire value.
    pub fn raw(&self) -> u16 {
        ((self.value * 8192.0 + 8192.0).round() as i32).clamp(0, 16383) as u16
    }
}

/// A parsed MIDI message.
///
/// A closed sum type: the dispatch machinery matches on the variant, no
/// open polymorphism is involved. `None` is the monostate for anything the
/// parser does not understand.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Message {
    /// Empty or unrecognized message.
    #[default]
    None,
    NoteOn(NoteOn),
    NoteOff(NoteOff),
    ControlChange(ControlChange),
    PitchBend(PitchBend),
    /// Opaque system-exclusive payload, `F0 … F7` inclusive.
    SysEx(Vec<u8>),
}

impl Message {
    /// The dispatch header of this message: type plus addressing fields,
    /// excluding the value.
    pub fn header(&self) -> Header {
        match self {
            Message::None => Header::None,
            Message::NoteOn(on) => Header::NoteOn { channel: on.channel, note: on.note },
            Message::NoteOff(off) => Header::NoteOff { channel: off.channel, note: off.note },
            Message::ControlChange(cc) => {
                Header::ControlChange { channel: cc.channel, controller: cc.controller }
            }
            Message::PitchBend(pb) => Header::PitchBend { channel: pb.channel },
            Message::SysEx(_) => Header::SysEx,
        }
    }

    /// Encode the message back to wire bytes.
    ///
    /// Returns `None` for the empty message. Header fields survive a
    /// parse/encode round trip unchanged.
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Message::None => None,
            Message::NoteOn(on) => Some(vec![
                0x90 | (on.channel as u8 & 0x0f),
                on.note as u8,
                on.velocity as u8,
            ]),
            Message::NoteOff(off) => Some(vec![
                0x80 | (off.channel as u8 & 0x0f),
                off.note as u8,
                off.velocity as u8,
            ]),
            Message::ControlChange(cc) => Some(vec![
                0xb0 | (cc.channel as u8 & 0x0f),
                cc.controller as u8,
                cc.value as u8,
            ]),
            Message::PitchBend(pb) => {
                let raw = pb.raw();
                Some(vec![
                    0xe0 | (pb.channel as u8 & 0x0f),
                    (raw & 0x7f) as u8,
                    (raw >> 7) as u8,
                ])
            }
            Message::SysEx(bytes) => Some(bytes.clone()),
        }
    }
}

/// Message identity used as a dispatch key.
///
/// Headers are totally ordered so they can key the `(port, header)` action
/// registry; the empty header is the least element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Header {
    #[default]
    None,
    NoteOn { channel: Channel, note: Note },
    NoteOff { channel: Channel, note: Note },
    ControlChange { channel: Channel, controller: i8 },
    PitchBend { channel: Channel },
    SysEx,
}

/// The 4 MSB of the status byte, identifying the command kind.
#[inline]
pub fn status_high(first_byte: u8) -> u8 {
    first_byte >> 4
}

/// The channel number carried in the status byte.
#[inline]
pub fn status_channel(first_byte: u8) -> Channel {
    (first_byte & 0x0f) as Channel
}

/// Parse raw MIDI bytes into a [`Message`].
///
/// Channel voice messages are 3 bytes; a note-on with zero velocity is a
/// note-off. System exclusive (`F0 … F7`) is kept verbatim. Anything else
/// parses to [`Message::None`].
pub fn parse(bytes: &[u8]) -> Message {
    if bytes.is_empty() {
        return Message::None;
    }
    if bytes[0] == 0xf0 {
        return Message::SysEx(bytes.to_vec());
    }
    if bytes.len() != 3 {
        return Message::None;
    }
    let channel = status_channel(bytes[0]);
    let data1 = bytes[1] as i8;
    let data2 = bytes[2] as i8;
    match status_high(bytes[0]) {
        0x9 if bytes[2] != 0 => Message::NoteOn(NoteOn::new(channel, data1, data2)),
        0x8 | 0x9 => Message::NoteOff(NoteOff::new(channel, data1, data2)),
        0xb => Message::ControlChange(ControlChange::new(channel, data1, data2)),
        0xe => {
            let raw = ((bytes[2] as u16) << 7) | bytes[1] as u16;
            Message::PitchBend(PitchBend::new(channel, (raw as f64 - 8192.0) / 8192.0))
        }
        _ => Message::None,
    }
}

/// Frequency of a MIDI note in a 12-tone equal temperament scale with the
/// 440 Hz A being note 69, with an optional transposition in semitones.
#[inline]
pub fn frequency(note: Note, transpose_semitones: f64) -> f64 {
    440.0 * pow(2.0, (note as f64 + transpose_semitones - 69.0) / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_note_on() {
        let m = parse(&[0x91, 60, 100]);
        assert_eq!(m, Message::NoteOn(NoteOn::new(1, 60, 100)));
        assert_eq!(m.header(), Header::NoteOn { channel: 1, note: 60 });
    }

    #[test]
    fn parse_note_off_both_encodings() {
        let explicit = parse(&[0x82, 60, 64]);
        assert_eq!(explicit, Message::NoteOff(NoteOff::new(2, 60, 64)));
        // A note-on with zero velocity is a note-off
        let implicit = parse(&[0x92, 60, 0]);
        assert_eq!(implicit, Message::NoteOff(NoteOff::new(2, 60, 0)));
    }

    #[test]
    fn parse_control_change() {
        let m = parse(&[0xb0, 64, 127]);
        match m {
            Message::ControlChange(cc) => {
                assert_eq!(cc.controller, 64);
                assert_eq!(cc.value, 127);
                assert!((cc.value_unit() - 1.0).abs() < 1e-12);
            }
            other => panic!("expected control change, got {other:?}"),
        }
    }

    #[test]
    fn parse_pitch_bend_extremes() {
        // Center (8192) is zero
        let center = parse(&[0xe0, 0x00, 0x40]);
        match center {
            Message::PitchBend(pb) => assert!(pb.value.abs() < 1e-12),
            other => panic!("expected pitch bend, got {other:?}"),
        }
        // All data bits set is just below +1
        let max = parse(&[0xe0, 0x7f, 0x7f]);
        match max {
            Message::PitchBend(pb) => assert!((pb.value - 8191.0 / 8192.0).abs() < 1e-12),
            other => panic!("expected pitch bend, got {other:?}"),
        }
        // Zero is exactly -1
        let min = parse(&[0xe0, 0x00, 0x00]);
        match min {
            Message::PitchBend(pb) => assert!((pb.value + 1.0).abs() < 1e-12),
            other => panic!("expected pitch bend, got {other:?}"),
        }
    }

    #[test]
    fn parse_sysex_verbatim() {
        let bytes = [0xf0, 0x00, 0x20, 0x6b, 0x42, 0xf7];
        match parse(&bytes) {
            Message::SysEx(payload) => assert_eq!(payload, bytes.to_vec()),
            other => panic!("expected sysex, got {other:?}"),
        }
    }

    #[test]
    fn parse_garbage_is_empty() {
        assert_eq!(parse(&[]), Message::None);
        assert_eq!(parse(&[0x91, 60]), Message::None);
        assert_eq!(parse(&[0xa0, 1, 2]), Message::None);
    }

    #[test]
    fn header_round_trip() {
        // Spec invariant: header fields survive byte -> msg -> byte
        let cases: [&[u8]; 4] = [
            &[0x90, 69, 127],
            &[0x83, 60, 0],
            &[0xb5, 7, 99],
            &[0xe1, 0x12, 0x34],
        ];
        for bytes in cases {
            let msg = parse(bytes);
            let round = parse(&msg.to_bytes().expect("encodable"));
            assert_eq!(msg.header(), round.header(), "header changed for {bytes:?}");
        }
    }

    #[test]
    fn header_ordering_none_least() {
        let none = Header::None;
        let on = Header::NoteOn { channel: 0, note: 0 };
        let cc = Header::ControlChange { channel: 0, controller: 0 };
        assert!(none < on);
        assert!(on < cc);
        // Within a variant, addressing fields order lexicographically
        let low = Header::NoteOn { channel: 0, note: 10 };
        let high = Header::NoteOn { channel: 0, note: 20 };
        assert!(low < high);
    }

    #[test]
    fn note_frequency() {
        assert!((frequency(69, 0.0) - 440.0).abs() < 1e-9);
        assert!((frequency(60, 0.0) - 261.625565).abs() < 1e-3);
        // Transposing up an octave doubles the frequency
        assert!((frequency(57, 12.0) - 440.0).abs() < 1e-9);
    }

    #[test]
    fn cc_scaling() {
        assert!((value_in(0, 2.0, 10.0) - 2.0).abs() < 1e-12);
        assert!((value_in(127, 2.0, 10.0) - 10.0).abs() < 1e-12);
        assert!((log_value_in(0, 20.0, 20_000.0) - 20.0).abs() < 1e-9);
        assert!((log_value_in(127, 20.0, 20_000.0) - 20_000.0).abs() < 1e-6);
        // Log midpoint is the geometric mean region, not the arithmetic one
        let mid = log_value_in(64, 20.0, 20_000.0);
        assert!(mid > 500.0 && mid < 700.0, "log midpoint was {mid}");
    }

    #[test]
    fn note_headers_ignore_direction() {
        let on = NoteOn::new(3, 72, 90);
        let off = on.as_off();
        assert_eq!(on.note_header(), off.note_header());
    }
}
