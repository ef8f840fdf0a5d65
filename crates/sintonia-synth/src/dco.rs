//! Digitally controlled oscillator.
//!
//! Generates a mix of a square wave and a trapezoidal triangle wave at the
//! note frequency. Parameters are sampled once per frame: changing a knob
//! mid-frame lands on the next frame boundary. The per-sample loop is just
//! phase accumulation and two piecewise shapes.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use sintonia_core::audio::MonoFrame;
use sintonia_core::config::{FRAME_SIZE, SAMPLE_RATE};
use sintonia_core::midi::{self, NoteOff, NoteOn};
use sintonia_core::param::Param;

/// Pitch-bend range in semitones at full wheel deflection.
const PITCH_BEND_SEMITONES: f64 = 24.0;

/// The oscillator's parameter set.
///
/// Cloning shares the underlying handles: a preset and every voice built
/// from it see the same values.
#[derive(Clone, Debug)]
pub struct DcoParams {
    /// Square wave level in [0, 1].
    pub square_volume: Param,
    /// Square duty cycle in [0, 1]; 0 hands the duty cycle to the
    /// modulation wheel (`mod · 0.49 + 0.5`).
    pub square_pwm: Param,
    /// Triangle wave level in [0, 1].
    pub triangle_volume: Param,
    /// Fraction of the period carrying the triangle; the rest sits at the
    /// negative peak.
    pub triangle_ratio: Param,
    /// Fraction of the triangle spent falling; the peak lands at
    /// `triangle_ratio · (1 − fall_ratio)`.
    pub triangle_fall_ratio: Param,
    /// Per-note random detune span (relative, ~0.005 for ±0.5%). Zero
    /// disables detuning.
    pub detune: Param,
    /// Broadcast pitch-bend scalar in [-1, +1].
    pub pitch_bend: Param,
    /// Broadcast modulation scalar in [0, 1].
    pub modulation: Param,
}

impl DcoParams {
    /// A square-only oscillator wired to the given wheels.
    pub fn new(pitch_bend: Param, modulation: Param) -> Self {
        Self {
            square_volume: Param::new(1.0),
            square_pwm: Param::new(0.5),
            triangle_volume: Param::new(0.0),
            triangle_ratio: Param::new(0.5),
            triangle_fall_ratio: Param::new(0.5),
            detune: Param::new(0.005),
            pitch_bend,
            modulation,
        }
    }
}

impl Default for DcoParams {
    /// Parameters with unconnected wheels (both at rest).
    fn default() -> Self {
        Self::new(Param::new(0.0), Param::new(0.0))
    }
}

/// A digitally controlled oscillator.
#[derive(Clone, Debug)]
pub struct Dco {
    params: DcoParams,
    running: bool,
    /// Phase in the waveform, in [0, 1).
    phase: f64,
    note: NoteOn,
    /// Frequency ratio picked at note start, 1 ± detune.
    tune: f64,
    /// Output level, driven by the envelope when one wraps this DCO.
    pub volume: f64,
    rng: SmallRng,
}

impl Dco {
    pub fn new(params: DcoParams) -> Self {
        Self {
            params,
            running: false,
            phase: 0.0,
            note: NoteOn::default(),
            tune: 1.0,
            volume: 1.0,
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn params(&self) -> &DcoParams {
        &self.params
    }

    /// Start a note: record it, pick a fresh detune, start running.
    pub fn start(&mut self, on: &NoteOn) {
        self.note = *on;
        let detune = self.params.detune.get();
        self.tune = if detune > 0.0 {
            1.0 + self.rng.gen_range(-detune..=detune)
        } else {
            1.0
        };
        self.running = true;
    }

    /// Stop the note; output is zero until the next start.
    pub fn stop(&mut self, _off: &NoteOff) {
        self.running = false;
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Generate one frame.
    pub fn audio(&mut self) -> MonoFrame {
        let mut frame = [0.0; FRAME_SIZE];
        if !self.running {
            return frame;
        }

        // Per-frame parameter snapshot
        let bend = self.params.pitch_bend.get();
        let dphase = midi::frequency(self.note.note, PITCH_BEND_SEMITONES * bend) * self.tune
            / SAMPLE_RATE;
        let velocity = self.note.velocity_unit();
        let square_amp = velocity * self.volume * self.params.square_volume.get();
        let pwm_param = self.params.square_pwm.get();
        let pwm = if pwm_param == 0.0 {
            self.params.modulation.get() * 0.49 + 0.5
        } else {
            pwm_param
        };
        let triangle_amp = velocity * self.volume * self.params.triangle_volume.get();
        let triangle_ratio = self.params.triangle_ratio.get();
        let triangle_peak = triangle_ratio * (1.0 - self.params.triangle_fall_ratio.get());

        for sample in &mut frame {
            let square = square_amp * if self.phase > pwm { 1.0 } else { -1.0 };
            let triangle = if self.phase < triangle_peak {
                // Rising edge, negative to positive peak
                triangle_amp * (2.0 * self.phase / triangle_peak - 1.0)
            } else if self.phase < triangle_ratio {
                // Falling edge back to the negative peak
                triangle_amp
                    * (1.0 - 2.0 * (self.phase - triangle_peak) / (triangle_ratio - triangle_peak))
            } else {
                -triangle_amp
            };
            *sample = square + triangle;
            self.phase += dphase;
            if self.phase > 1.0 {
                self.phase -= 1.0;
            }
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Parameters with detuning disabled so frequencies are exact.
    fn exact_params() -> DcoParams {
        let params = DcoParams::default();
        params.detune.set(0.0);
        params
    }

    fn start_note(dco: &mut Dco, note: i8, velocity: i8) {
        dco.start(&NoteOn::new(0, note, velocity));
    }

    /// Count rising zero crossings over `frames` frames.
    fn rising_edges(dco: &mut Dco, frames: usize) -> usize {
        let mut edges = 0;
        let mut last = -1.0;
        for _ in 0..frames {
            for s in dco.audio() {
                if last <= 0.0 && s > 0.0 {
                    edges += 1;
                }
                last = s;
            }
        }
        edges
    }

    #[test]
    fn silent_until_started() {
        let mut dco = Dco::new(exact_params());
        assert!(!dco.is_running());
        assert!(dco.audio().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn square_at_a4_is_440_hz() {
        let mut dco = Dco::new(exact_params());
        start_note(&mut dco, 69, 127);
        // One second of audio: expect 440 cycles, give or take the edges
        let edges = rising_edges(&mut dco, SAMPLE_RATE as usize / FRAME_SIZE);
        assert!(
            (438..=442).contains(&edges),
            "expected ~440 rising edges, got {edges}"
        );
    }

    #[test]
    fn full_velocity_square_has_unit_amplitude() {
        let mut dco = Dco::new(exact_params());
        start_note(&mut dco, 69, 127);
        for s in dco.audio() {
            assert!(s == 1.0 || s == -1.0, "pure square must sit at ±1, got {s}");
        }
    }

    #[test]
    fn velocity_scales_amplitude() {
        let mut dco = Dco::new(exact_params());
        start_note(&mut dco, 60, 64);
        let expected = 64.0 / 127.0;
        for s in dco.audio() {
            assert!((s.abs() - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn stop_silences_output() {
        let mut dco = Dco::new(exact_params());
        let on = NoteOn::new(0, 60, 100);
        dco.start(&on);
        dco.audio();
        dco.stop(&on.as_off());
        assert!(!dco.is_running());
        assert!(dco.audio().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn pitch_bend_shifts_two_octaves() {
        let params = exact_params();
        params.pitch_bend.set(1.0);
        let mut dco = Dco::new(params);
        // Note 45 bent fully up sounds like note 69: 440 Hz
        start_note(&mut dco, 45, 127);
        let edges = rising_edges(&mut dco, SAMPLE_RATE as usize / FRAME_SIZE);
        assert!(
            (438..=442).contains(&edges),
            "expected ~440 rising edges with +24 semitone bend, got {edges}"
        );
    }

    #[test]
    fn zero_pwm_follows_modulation_wheel() {
        let seconds = SAMPLE_RATE as usize / FRAME_SIZE;
        let high_fraction = |dco: &mut Dco| {
            let mut high = 0usize;
            let mut total = 0usize;
            for _ in 0..seconds {
                for s in dco.audio() {
                    total += 1;
                    if s > 0.0 {
                        high += 1;
                    }
                }
            }
            high as f64 / total as f64
        };

        let params = exact_params();
        params.square_pwm.set(0.0);
        params.modulation.set(0.0);
        let mut dco = Dco::new(params.clone());
        start_note(&mut dco, 33, 127);
        // Wheel at rest: duty threshold 0.5, output symmetric
        let fraction = high_fraction(&mut dco);
        assert!((fraction - 0.5).abs() < 0.02, "duty was {fraction}");

        // Wheel fully up: threshold 0.99, output nearly always low
        params.modulation.set(1.0);
        let mut skewed = Dco::new(params);
        start_note(&mut skewed, 33, 127);
        let fraction = high_fraction(&mut skewed);
        assert!(fraction < 0.03, "expected mostly low samples, duty {fraction}");
    }

    #[test]
    fn triangle_spans_its_ratio() {
        let params = exact_params();
        params.square_volume.set(0.0);
        params.triangle_volume.set(1.0);
        params.triangle_ratio.set(0.5);
        params.triangle_fall_ratio.set(0.5);
        let mut dco = Dco::new(params);
        start_note(&mut dco, 69, 127);
        let mut seen_high = f64::MIN;
        let mut seen_low = f64::MAX;
        for _ in 0..20 {
            for s in dco.audio() {
                seen_high = seen_high.max(s);
                seen_low = seen_low.min(s);
                assert!((-1.0..=1.0).contains(&s));
            }
        }
        assert!(seen_high > 0.9, "triangle never neared +1: {seen_high}");
        assert!(seen_low <= -1.0 + 1e-9, "triangle floor missing: {seen_low}");
    }

    #[test]
    fn detune_spreads_restarts() {
        let params = DcoParams::default();
        params.detune.set(0.005);
        let mut dco = Dco::new(params);
        let mut tunes = Vec::new();
        for _ in 0..8 {
            start_note(&mut dco, 69, 127);
            tunes.push(dco.tune);
        }
        assert!(tunes.iter().all(|t| (*t - 1.0).abs() <= 0.005 + 1e-12));
        let first = tunes[0];
        assert!(
            tunes.iter().any(|t| (*t - first).abs() > 1e-9),
            "detune never varied across restarts"
        );
    }

    #[test]
    fn shared_params_reach_running_voice() {
        let params = exact_params();
        let volume = params.square_volume.clone();
        let mut dco = Dco::new(params);
        start_note(&mut dco, 60, 127);
        volume.set(0.25);
        for s in dco.audio() {
            assert!((s.abs() - 0.25).abs() < 1e-12);
        }
    }
}
