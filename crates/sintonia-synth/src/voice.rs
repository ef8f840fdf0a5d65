//! The voice map and the frame mixer.
//!
//! Active voices are keyed by `(channel, note)`: the same note replayed on
//! another channel is a distinct voice, and re-striking a key replaces the
//! old voice. A note-off only *stops* a voice (its envelope may still be
//! releasing); the sweep at the end of each frame drops whatever stopped
//! running.
//!
//! The mixer turns the summed voices into the output frame: rectifier
//! blend, per-channel low-pass scaled by the LFO, a `4 + voices` divider
//! against saturation growth, per-channel resonance, master volume.

use std::collections::BTreeMap;

use sintonia_core::audio::{Frame, Stereo};
use sintonia_core::filters::{LadderFilter, LowPassFilter, ResonanceFilter};
use sintonia_core::midi::{Channel, Note, NoteOff, NoteOn};
use sintonia_core::param::Param;

use crate::sound_generator::{SoundGenerator, SoundParams};

/// Identity of an active voice.
pub type VoiceKey = (Channel, Note);

/// The map of currently sounding voices.
#[derive(Default)]
pub struct VoiceMap {
    voices: BTreeMap<VoiceKey, SoundGenerator>,
}

impl VoiceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// The identities of the currently active voices.
    pub fn keys(&self) -> impl Iterator<Item = VoiceKey> + '_ {
        self.voices.keys().copied()
    }

    /// Start a voice from a preset, replacing any voice already holding
    /// the same `(channel, note)`.
    pub fn start_note(&mut self, preset: &SoundParams, on: &NoteOn) {
        let mut generator = preset.instantiate();
        generator.start(on);
        self.voices.insert((on.channel, on.note), generator);
    }

    /// Stop the voice under `(channel, note)`, if any.
    ///
    /// The voice stays in the map until its release completes; a note-off
    /// with no matching voice is logged at debug level and ignored.
    pub fn stop_note(&mut self, off: &NoteOff) {
        match self.voices.get_mut(&(off.channel, off.note)) {
            Some(voice) => voice.stop(off),
            None => tracing::debug!(
                channel = off.channel as i32,
                note = off.note as i32,
                "note-off without matching note-on"
            ),
        }
    }

    /// Sum every voice's frame into `frame` (both channels), then drop the
    /// voices that stopped running.
    ///
    /// Returns the number of voices that contributed, which the mixer's
    /// divider stage needs.
    pub fn render(&mut self, frame: &mut Frame) -> usize {
        let count = self.voices.len();
        for voice in self.voices.values_mut() {
            let mono = voice.audio();
            for (out, sample) in frame.iter_mut().zip(mono) {
                *out += Stereo::splat(sample);
            }
        }
        self.voices.retain(|_, voice| voice.is_running());
        count
    }
}

/// The output mixing chain applied to the summed voice frame.
pub struct Mixer {
    /// Rectifier blend in [0, 1]: `s·(1−r) + r·|s|`.
    pub rectification: Param,
    /// Master output volume in [0, 1].
    pub master_volume: Param,
    /// Scale applied after the low-pass, set from the LFO once per frame.
    pub lfo_level: f64,
    low_pass: [LowPassFilter; 2],
    resonance: [ResonanceFilter; 2],
    /// Optional ladder stage after the resonance filter.
    ladder: Option<[LadderFilter; 2]>,
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new()
    }
}

impl Mixer {
    pub fn new() -> Self {
        Self {
            rectification: Param::new(0.0),
            master_volume: Param::new(1.0),
            lfo_level: 1.0,
            low_pass: [LowPassFilter::new(); 2],
            resonance: [ResonanceFilter::new(); 2],
            ladder: None,
        }
    }

    /// Set the low-pass smoothing factor on both channels.
    pub fn set_low_pass_smoothing(&mut self, factor: f64) {
        for f in &mut self.low_pass {
            f.set_smoothing_factor(factor);
        }
    }

    /// Set the resonance filter frequency and factor on both channels.
    pub fn set_resonance(&mut self, frequency: f64, resonance: f64) {
        for f in &mut self.resonance {
            f.set_frequency(frequency).set_resonance(resonance);
        }
    }

    /// Put a ladder filter at the end of the chain.
    pub fn engage_ladder(&mut self, frequency: f64, resonance: f64) {
        let mut stage = LadderFilter::new();
        stage.set_frequency(frequency).set_resonance(resonance);
        self.ladder = Some([stage; 2]);
    }

    /// Remove the ladder stage.
    pub fn disengage_ladder(&mut self) {
        self.ladder = None;
    }

    /// Run the chain over a frame holding the sum of `voice_count` voices.
    pub fn process(&mut self, frame: &mut Frame, voice_count: usize) {
        let rectification = self.rectification.get();
        let master = self.master_volume.get();
        let divider = 4.0 + voice_count as f64;
        for sample in frame.iter_mut() {
            let channels = [sample.left, sample.right];
            let mut out = [0.0; 2];
            for (side, &s) in channels.iter().enumerate() {
                let rectified = s * (1.0 - rectification) + rectification * s.abs();
                let filtered = self.low_pass[side].filter(rectified) * self.lfo_level;
                let divided = filtered / divider;
                let mut resonant = self.resonance[side].filter(divided);
                if let Some(ladder) = &mut self.ladder {
                    resonant = ladder[side].filter(resonant);
                }
                out[side] = resonant * master;
            }
            *sample = Stereo { left: out[0], right: out[1] };
        }
    }
}
