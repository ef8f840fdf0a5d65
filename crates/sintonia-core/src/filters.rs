//! The filter family: one-pole low-pass, resonance biquad, ladder.
//!
//! All three are per-sample IIR structures owned by a single voice or
//! mixer channel. Coefficients are recomputed on parameter changes, not in
//! the sample loop.

use libm::cos;

use crate::config::SAMPLE_RATE;

/// A low-pass filter built on a single-tap IIR integrator.
///
/// `y = a·x + (1 − a)·y_prev` where the smoothing factor `a` is derived
/// from the cutoff as `a = w / (w + 1)`, `w = 2π·fc/Fs`. A smoothing
/// factor of 1 passes the input through; 0 silences it.
#[derive(Clone, Copy, Debug)]
pub struct LowPassFilter {
    smoothing_factor: f64,
    /// Single tap of output delay.
    iir_tap: f64,
}

impl Default for LowPassFilter {
    fn default() -> Self {
        Self { smoothing_factor: 1.0, iir_tap: 0.0 }
    }
}

impl LowPassFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the smoothing factor directly, in [0, 1].
    pub fn set_smoothing_factor(&mut self, factor: f64) {
        self.smoothing_factor = factor.clamp(0.0, 1.0);
    }

    /// Set the -3 dB cutoff frequency in Hz.
    pub fn set_cutoff_frequency(&mut self, cutoff: f64) {
        let w = 2.0 * std::f64::consts::PI * cutoff / SAMPLE_RATE;
        self.set_smoothing_factor(w / (w + 1.0));
    }

    /// Filter one sample.
    #[inline]
    pub fn filter(&mut self, input: f64) -> f64 {
        let out = self.smoothing_factor * input + (1.0 - self.smoothing_factor) * self.iir_tap;
        self.iir_tap = out;
        out
    }
}

/// A resonance filter: 2-tap IIR with a 2-tap FIR normalizing the
/// resonance level.
///
/// Coefficients per Scavone, "Resonance Filters":
/// `a1 = −2r·cos(2π·f/Fs)`, `a2 = r²`, `b0 = (1 − r²)/2`, `b2 = −b0`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ResonanceFilter {
    frequency: f64,
    resonance: f64,
    // Direct-form delays
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
    a1: f64,
    a2: f64,
    b0: f64,
    b2: f64,
}

impl ResonanceFilter {
    pub fn new() -> Self {
        Self { b0: 1.0, ..Self::default() }
    }

    /// Set the resonance frequency in Hz.
    pub fn set_frequency(&mut self, frequency: f64) -> &mut Self {
        self.frequency = frequency;
        self.update_coefficients();
        self
    }

    /// Set the resonance factor in [0, 1]; 0 is flat, values near 1
    /// sharpen the peak.
    pub fn set_resonance(&mut self, resonance: f64) -> &mut Self {
        self.resonance = resonance.clamp(0.0, 1.0);
        self.update_coefficients();
        self
    }

    fn update_coefficients(&mut self) {
        let r = self.resonance;
        self.a1 = -2.0 * r * cos(2.0 * std::f64::consts::PI * self.frequency / SAMPLE_RATE);
        self.a2 = r * r;
        self.b0 = (1.0 - r * r) / 2.0;
        self.b2 = -self.b0;
    }

    /// Filter one sample.
    #[inline]
    pub fn filter(&mut self, input: f64) -> f64 {
        let y = self.b0 * input + self.b2 * self.x2 - self.a1 * self.y1 - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}

/// A ladder filter, crude approximation of the Moog one: four one-pole
/// low-passes in series with global negative feedback.
///
/// The feedback signal is clamped to [-1, 1]; without the clamp the loop
/// diverges at high resonance.
#[derive(Clone, Copy, Debug, Default)]
pub struct LadderFilter {
    feedback: f64,
    resonance: f64,
    stages: [LowPassFilter; 4],
}

impl LadderFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cutoff frequency shared by all four stages.
    pub fn set_frequency(&mut self, frequency: f64) -> &mut Self {
        for stage in &mut self.stages {
            stage.set_cutoff_frequency(frequency);
        }
        self
    }

    /// Set the resonance factor in [0, 1].
    pub fn set_resonance(&mut self, resonance: f64) -> &mut Self {
        self.resonance = resonance.clamp(0.0, 1.0);
        self
    }

    /// Filter one sample.
    #[inline]
    pub fn filter(&mut self, input: f64) -> f64 {
        let mut signal = input - self.feedback * self.resonance;
        for stage in &mut self.stages {
            signal = stage.filter(signal);
        }
        self.feedback = signal.clamp(-1.0, 1.0);
        self.feedback
    }
}
