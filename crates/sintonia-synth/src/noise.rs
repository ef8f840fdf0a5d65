//! Filtered noise generator.
//!
//! White noise shaped by two independent envelopes: one sweeps a low-pass
//! cutoff, the other the frequency of a resonance filter, both scaled from
//! the triggered note's pitch. The same random sample feeds both filter
//! paths and their product is the output, which gives the percussive
//! "pitched air" quality of the original patch.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use sintonia_core::audio::MonoFrame;
use sintonia_core::config::FRAME_SIZE;
use sintonia_core::envelope::{Envelope, EnvelopeParams};
use sintonia_core::filters::{LowPassFilter, ResonanceFilter};
use sintonia_core::midi::{self, NoteOff, NoteOn};
use sintonia_core::param::Param;

/// Gain recovering the level lost in the two filter paths.
const FILTER_MAKEUP_GAIN: f64 = 10.0;

/// Resonance factor of the resonance filter path.
const RESONANCE: f64 = 0.99;

/// Parameter set for the noise generator.
#[derive(Clone, Debug)]
pub struct NoiseParams {
    /// Output volume in [0, 1].
    pub volume: Param,
    /// Envelope sweeping the low-pass cutoff.
    pub lpf_envelope: EnvelopeParams,
    /// Envelope sweeping the resonance frequency.
    pub resonance_envelope: EnvelopeParams,
}

impl Default for NoiseParams {
    /// The percussive shape of the original patch.
    fn default() -> Self {
        Self {
            volume: Param::new(1.0),
            lpf_envelope: EnvelopeParams::new(0.0, 0.1, 0.01, 0.1),
            resonance_envelope: EnvelopeParams::new(0.05, 0.05, 0.1, 0.01),
        }
    }
}

/// The noise generator.
#[derive(Clone, Debug)]
pub struct Noise {
    params: NoiseParams,
    running: bool,
    rng: SmallRng,
    lpf: LowPassFilter,
    lpf_envelope: Envelope,
    resonance_filter: ResonanceFilter,
    resonance_envelope: Envelope,
    velocity: f64,
    frequency: f64,
}

impl Noise {
    pub fn new(params: NoiseParams) -> Self {
        let lpf_envelope = Envelope::new(params.lpf_envelope.clone());
        let resonance_envelope = Envelope::new(params.resonance_envelope.clone());
        Self {
            params,
            running: false,
            rng: SmallRng::from_entropy(),
            lpf: LowPassFilter::new(),
            lpf_envelope,
            resonance_filter: ResonanceFilter::new(),
            resonance_envelope,
            velocity: 0.0,
            frequency: 0.0,
        }
    }

    /// Start a note: capture pitch and velocity, launch both envelopes.
    pub fn start(&mut self, on: &NoteOn) {
        self.velocity = on.velocity_unit();
        self.frequency = midi::frequency(on.note, 0.0);
        self.lpf_envelope.start();
        self.resonance_envelope.start();
        self.running =
            self.lpf_envelope.is_running() || self.resonance_envelope.is_running();
    }

    /// Release both envelopes; the generator dies out with them.
    pub fn stop(&mut self, _off: &NoteOff) {
        self.lpf_envelope.stop();
        self.resonance_envelope.stop();
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Generate one frame.
    pub fn audio(&mut self) -> MonoFrame {
        self.lpf_envelope.tick_frame();
        self.resonance_envelope.tick_frame();
        self.lpf.set_cutoff_frequency(self.frequency * self.lpf_envelope.out());
        self.resonance_filter
            .set_resonance(RESONANCE)
            .set_frequency(2.0 * self.frequency * self.resonance_envelope.out());
        self.running =
            self.lpf_envelope.is_running() || self.resonance_envelope.is_running();

        let mut frame = [0.0; FRAME_SIZE];
        if !self.running {
            return frame;
        }
        let gain = FILTER_MAKEUP_GAIN * self.velocity * self.params.volume.get();
        for sample in &mut frame {
            let random = self.rng.gen_range(-1.0..1.0);
            *sample = self.lpf.filter(random) * self.resonance_filter.filter(random) * gain;
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sintonia_core::config::FRAME_FREQUENCY;

    #[test]
    fn silent_before_start() {
        let mut noise = Noise::new(NoiseParams::default());
        assert!(!noise.is_running());
        assert!(noise.audio().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn produces_sound_after_start() {
        let mut noise = Noise::new(NoiseParams::default());
        noise.start(&NoteOn::new(0, 60, 127));
        assert!(noise.is_running());
        let mut energy = 0.0;
        for _ in 0..10 {
            for s in noise.audio() {
                energy += s * s;
            }
        }
        assert!(energy > 0.0, "started noise must make sound");
    }

    #[test]
    fn dies_out_after_stop() {
        let mut noise = Noise::new(NoiseParams::default());
        let on = NoteOn::new(0, 60, 127);
        noise.start(&on);
        noise.audio();
        noise.stop(&on.as_off());
        // Longest release is 0.1 s; give it 0.5 s
        for _ in 0..(0.5 * FRAME_FREQUENCY) as usize {
            noise.audio();
        }
        assert!(!noise.is_running());
        assert!(noise.audio().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn velocity_zero_is_silent_but_running() {
        let mut noise = Noise::new(NoiseParams::default());
        noise.start(&NoteOn::new(0, 60, 0));
        assert!(noise.is_running());
        let frame = noise.audio();
        assert!(frame.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn runs_while_either_envelope_runs() {
        let params = NoiseParams {
            volume: Param::new(1.0),
            // This one stops instantly on note-off
            lpf_envelope: EnvelopeParams::new(0.0, 0.0, 1.0, 0.0),
            // This one rings for half a second
            resonance_envelope: EnvelopeParams::new(0.0, 0.0, 1.0, 0.5),
        };
        let mut noise = Noise::new(params);
        let on = NoteOn::new(0, 48, 100);
        noise.start(&on);
        noise.audio();
        noise.stop(&on.as_off());
        noise.audio();
        assert!(noise.is_running(), "resonance envelope still releasing");
    }
}
