//! Stereo flanger.
//!
//! A short delay line whose tap position is swept per channel by an
//! independent sine LFO, the classic comb-filter "whoosh". The two
//! channels run different rates and phases so the image widens; the tap
//! lands between samples, resolved by linear interpolation. The LFO is
//! evaluated per sample inside the frame kernel for a smooth sweep, and
//! the frame's worth of phase is added afterwards.

use libm::{floor, sin};
use sintonia_core::audio::{Frame, Stereo};
use sintonia_core::config::{FRAME_SIZE, SAMPLE_RATE};
use sintonia_core::param::Param;

/// Maximum swept delay in seconds.
const DELAY_LINE_TIME: f64 = 0.05;

/// Floor of the sweep; zero reaches full cancellation at the top of the
/// sweep.
const MINIMUM_DELAY_TIME: f64 = 0.0;

/// Delay line length: the sweep depth plus one frame plus the
/// interpolation neighbor, rounded up to whole frames to keep the shift
/// pass simple.
const DELAY_LINE_LEN: usize = ((DELAY_LINE_TIME * SAMPLE_RATE) as usize + 1 + FRAME_SIZE)
    .div_ceil(FRAME_SIZE)
    * FRAME_SIZE;

/// Default LFO rates in Hz, deliberately incommensurate between channels.
const DEFAULT_RATES: [f64; 2] = [0.5, 0.13];

/// The flanger effect.
pub struct Flanger {
    /// Wet ratio per channel, typically in [-1, 1]; the sign flips the
    /// comb pattern. Zero bypasses that channel.
    pub ratio: [Param; 2],
    /// LFO phase per channel at the start of the frame, in [0, 1).
    phase: [f64; 2],
    /// LFO phase increment per sample, per channel.
    dphase: [f64; 2],
    line: Vec<Stereo>,
}

impl Default for Flanger {
    fn default() -> Self {
        Self::new()
    }
}

impl Flanger {
    /// A flanger with mirrored ±0.7 ratios and slow default sweeps.
    pub fn new() -> Self {
        Self {
            ratio: [Param::new(0.7), Param::new(-0.7)],
            phase: [0.0; 2],
            dphase: [DEFAULT_RATES[0] / SAMPLE_RATE, DEFAULT_RATES[1] / SAMPLE_RATE],
            line: vec![Stereo::splat(0.0); DELAY_LINE_LEN],
        }
    }

    /// Set the sweep rate of one channel in Hz.
    pub fn set_rate(&mut self, side: usize, rate_hz: f64) {
        self.dphase[side] = rate_hz / SAMPLE_RATE;
    }

    /// Process one frame in place.
    pub fn process(&mut self, io: &mut Frame) {
        debug_assert!(self.phase.iter().all(|p| (0.0..1.0).contains(p)));
        let end = self.line.len();

        // Age the line by one frame and append the dry input
        self.line.copy_within(FRAME_SIZE.., 0);
        for i in 0..FRAME_SIZE {
            self.line[end - FRAME_SIZE + i] = io[i];
        }

        let ratio = [self.ratio[0].get(), self.ratio[1].get()];
        for i in 0..FRAME_SIZE {
            for side in 0..2 {
                if ratio[side] == 0.0 {
                    continue;
                }
                let lfo =
                    sin((self.phase[side] + i as f64 * self.dphase[side]) * 2.0 * std::f64::consts::PI);
                // Delay for this sample, in samples, fractional
                let delay_index = ((lfo + 1.0) * (DELAY_LINE_TIME - MINIMUM_DELAY_TIME) / 2.0
                    + MINIMUM_DELAY_TIME)
                    * SAMPLE_RATE;
                let whole = floor(delay_index);
                let frac = delay_index - whole;
                let base = end - FRAME_SIZE + i;
                let tap = base - whole as usize;
                // Linear interpolation between the two neighboring samples
                let delayed = self.line[tap - 1].channel(side) * frac
                    + self.line[tap].channel(side) * (1.0 - frac);
                *io[i].channel_mut(side) += ratio[side] * delayed;
            }
        }

        // Catch the phase up with the frame just rendered
        for side in 0..2 {
            self.phase[side] += FRAME_SIZE as f64 * self.dphase[side];
            self.phase[side] -= floor(self.phase[side]);
        }
    }
}
