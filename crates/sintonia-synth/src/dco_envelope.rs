//! The DCO wrapped in an amplitude envelope.
//!
//! The envelope owns the note lifecycle: a stop only records the note-off
//! and starts the release; the oscillator keeps sounding until the
//! envelope finishes, at which point the stored note-off is forwarded to
//! the DCO exactly once.

use sintonia_core::audio::MonoFrame;
use sintonia_core::envelope::{Envelope, EnvelopeParams};
use sintonia_core::midi::{NoteOff, NoteOn};

use crate::dco::{Dco, DcoParams};

/// Parameter set for the enveloped oscillator.
#[derive(Clone, Debug, Default)]
pub struct DcoEnvelopeParams {
    pub dco: DcoParams,
    pub envelope: EnvelopeParams,
}

impl DcoEnvelopeParams {
    pub fn new(dco: DcoParams, envelope: EnvelopeParams) -> Self {
        Self { dco, envelope }
    }
}

/// A DCO with an evolving volume envelope.
#[derive(Clone, Debug)]
pub struct DcoEnvelope {
    dco: Dco,
    envelope: Envelope,
    /// Note-off deferred until the envelope completes.
    note_off: NoteOff,
}

impl DcoEnvelope {
    pub fn new(params: DcoEnvelopeParams) -> Self {
        Self {
            dco: Dco::new(params.dco),
            envelope: Envelope::new(params.envelope),
            note_off: NoteOff::default(),
        }
    }

    /// Start the envelope and the oscillator.
    pub fn start(&mut self, on: &NoteOn) {
        self.envelope.start();
        self.dco.start(on);
        self.dco.volume = self.envelope.out();
    }

    /// Record the note-off and enter the release stage.
    pub fn stop(&mut self, off: &NoteOff) {
        self.note_off = *off;
        self.envelope.stop();
        self.dco.volume = self.envelope.out();
    }

    /// Running as long as the envelope is.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.envelope.is_running()
    }

    /// Generate one frame.
    ///
    /// Advances the envelope by one frame period first (the envelope is a
    /// frame-rate device), then renders the oscillator at the new level.
    pub fn audio(&mut self) -> MonoFrame {
        self.envelope.tick_frame();
        self.dco.volume = self.envelope.out();
        if !self.envelope.is_running() && self.dco.is_running() {
            // Finalize the note only when the envelope decides to
            self.dco.stop(&self.note_off);
        }
        self.dco.audio()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sintonia_core::config::FRAME_FREQUENCY;

    fn gate_params() -> DcoEnvelopeParams {
        let params = DcoEnvelopeParams::default();
        params.dco.detune.set(0.0);
        params
    }

    #[test]
    fn gate_preset_sounds_immediately_and_stops_immediately() {
        let mut voice = DcoEnvelope::new(gate_params());
        let on = NoteOn::new(0, 69, 127);
        voice.start(&on);
        assert!(voice.is_running());
        let frame = voice.audio();
        assert!(frame.iter().all(|&s| s.abs() == 1.0));

        voice.stop(&on.as_off());
        let frame = voice.audio();
        assert!(!voice.is_running());
        assert!(frame.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn release_keeps_the_voice_sounding() {
        let params = gate_params();
        params.envelope.release_time.set(0.5);
        let mut voice = DcoEnvelope::new(params);
        let on = NoteOn::new(0, 60, 100);
        voice.start(&on);
        voice.audio();
        voice.stop(&on.as_off());

        // Halfway through the half-second release the voice still sounds
        let mut peak: f64 = 0.0;
        for _ in 0..(0.25 * FRAME_FREQUENCY) as usize {
            assert!(voice.is_running());
            let frame = voice.audio();
            peak = frame.iter().fold(peak, |m, s| m.max(s.abs()));
        }
        assert!(peak > 0.0, "release should still produce sound");

        // And well past the release it has stopped for good
        for _ in 0..(0.5 * FRAME_FREQUENCY) as usize {
            voice.audio();
        }
        assert!(!voice.is_running());
        assert!(voice.audio().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn attack_ramps_volume_up() {
        let params = gate_params();
        params.envelope.attack_time.set(0.5);
        let mut voice = DcoEnvelope::new(params);
        voice.start(&NoteOn::new(0, 69, 127));
        let first_peak = voice.audio().iter().fold(0.0_f64, |m, s| m.max(s.abs()));
        for _ in 0..20 {
            voice.audio();
        }
        let later_peak = voice.audio().iter().fold(0.0_f64, |m, s| m.max(s.abs()));
        assert!(
            later_peak > first_peak,
            "attack should grow: {first_peak} then {later_peak}"
        );
    }

    #[test]
    fn envelope_edits_apply_while_sounding() {
        let params = gate_params();
        let sustain = params.envelope.sustain_level.clone();
        let mut voice = DcoEnvelope::new(params);
        voice.start(&NoteOn::new(0, 69, 127));
        voice.audio();
        sustain.set(0.5);
        let frame = voice.audio();
        assert!(frame.iter().all(|&s| (s.abs() - 0.5).abs() < 1e-12));
    }
}
