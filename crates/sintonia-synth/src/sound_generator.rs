//! The closed set of sound generators.
//!
//! A voice is one of a handful of generator kinds known at build time;
//! dispatch is a match on the variant. The parameter-set enum mirrors the
//! generator enum one to one: a preset is a [`SoundParams`] value, and
//! each note-on instantiates a fresh generator sharing the preset's
//! parameter handles.

use sintonia_core::audio::MonoFrame;
use sintonia_core::midi::{NoteOff, NoteOn};

use crate::dco::{Dco, DcoParams};
use crate::dco_envelope::{DcoEnvelope, DcoEnvelopeParams};
use crate::noise::{Noise, NoiseParams};

/// A sound generator able to play one note.
#[derive(Clone, Debug)]
pub enum SoundGenerator {
    Dco(Dco),
    DcoEnvelope(DcoEnvelope),
    Noise(Noise),
}

impl SoundGenerator {
    /// Start the generator on a note.
    pub fn start(&mut self, on: &NoteOn) {
        match self {
            SoundGenerator::Dco(g) => g.start(on),
            SoundGenerator::DcoEnvelope(g) => g.start(on),
            SoundGenerator::Noise(g) => g.start(on),
        }
    }

    /// Stop the generator; sound may continue through a release phase.
    pub fn stop(&mut self, off: &NoteOff) {
        match self {
            SoundGenerator::Dco(g) => g.stop(off),
            SoundGenerator::DcoEnvelope(g) => g.stop(off),
            SoundGenerator::Noise(g) => g.stop(off),
        }
    }

    /// Generate one frame.
    pub fn audio(&mut self) -> MonoFrame {
        match self {
            SoundGenerator::Dco(g) => g.audio(),
            SoundGenerator::DcoEnvelope(g) => g.audio(),
            SoundGenerator::Noise(g) => g.audio(),
        }
    }

    /// Whether the generator still produces sound.
    pub fn is_running(&self) -> bool {
        match self {
            SoundGenerator::Dco(g) => g.is_running(),
            SoundGenerator::DcoEnvelope(g) => g.is_running(),
            SoundGenerator::Noise(g) => g.is_running(),
        }
    }
}

/// A preset: the parameter set a voice is instantiated from.
///
/// Cloning shares the underlying parameter handles, so edits through the
/// UI reach every running voice built from the same preset.
#[derive(Clone, Debug)]
pub enum SoundParams {
    Dco(DcoParams),
    DcoEnvelope(DcoEnvelopeParams),
    Noise(NoiseParams),
}

impl SoundParams {
    /// Build a fresh generator sharing this preset's parameters.
    pub fn instantiate(&self) -> SoundGenerator {
        match self {
            SoundParams::Dco(p) => SoundGenerator::Dco(Dco::new(p.clone())),
            SoundParams::DcoEnvelope(p) => {
                SoundGenerator::DcoEnvelope(DcoEnvelope::new(p.clone()))
            }
            SoundParams::Noise(p) => SoundGenerator::Noise(Noise::new(p.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instantiate_matches_variant() {
        let dco = SoundParams::Dco(DcoParams::default()).instantiate();
        assert!(matches!(dco, SoundGenerator::Dco(_)));
        let env = SoundParams::DcoEnvelope(DcoEnvelopeParams::default()).instantiate();
        assert!(matches!(env, SoundGenerator::DcoEnvelope(_)));
        let noise = SoundParams::Noise(NoiseParams::default()).instantiate();
        assert!(matches!(noise, SoundGenerator::Noise(_)));
    }

    #[test]
    fn instances_share_the_preset_handles() {
        let params = DcoParams::default();
        params.detune.set(0.0);
        let preset = SoundParams::Dco(params.clone());

        let mut first = preset.instantiate();
        let mut second = preset.instantiate();
        first.start(&NoteOn::new(0, 69, 127));
        second.start(&NoteOn::new(0, 69, 127));

        params.square_volume.set(0.5);
        assert!(first.audio().iter().all(|&s| s.abs() == 0.5));
        assert!(second.audio().iter().all(|&s| s.abs() == 0.5));
    }

    #[test]
    fn generator_lifecycle_through_the_variant() {
        let mut g = SoundParams::DcoEnvelope(DcoEnvelopeParams::default()).instantiate();
        assert!(!g.is_running());
        let on = NoteOn::new(0, 60, 100);
        g.start(&on);
        assert!(g.is_running());
        g.stop(&on.as_off());
        g.audio();
        assert!(!g.is_running());
    }
}
