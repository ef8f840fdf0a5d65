//! Stereo delay with feedback.
//!
//! A five-second delay line processed in three sequential passes per
//! frame: shift the line left by one frame, append the input plus the
//! fed-back previous output, then tap the line `shift` samples back for
//! the left channel and `2·shift` for the right. The doubled right tap
//! gives the characteristic wide slap of the original patch.

use sintonia_core::audio::{Frame, Stereo, silence};
use sintonia_core::config::{FRAME_SIZE, SAMPLE_RATE};
use sintonia_core::param::Param;

/// Seconds of audio the delay line holds.
const DELAY_LINE_SECONDS: f64 = 5.0;

/// The delay effect.
pub struct Delay {
    /// Delay time of the left tap in seconds; the right tap is doubled.
    pub delay_time: Param,
    /// Gain applied to the tapped-back signal. Zero bypasses.
    pub delay_ratio: Param,
    /// Portion of the previous output frame re-injected into the line.
    pub feedback_ratio: Param,
    line: Vec<Stereo>,
    previous_output: Frame,
}

impl Default for Delay {
    fn default() -> Self {
        Self::new()
    }
}

impl Delay {
    /// A delay with an eighth-note-ish default time and both gains at
    /// zero (bypass).
    pub fn new() -> Self {
        Self {
            delay_time: Param::new(0.245),
            delay_ratio: Param::new(0.0),
            feedback_ratio: Param::new(0.0),
            line: vec![Stereo::splat(0.0); (DELAY_LINE_SECONDS * SAMPLE_RATE) as usize],
            previous_output: silence(),
        }
    }

    /// The left-tap offset in samples for the current delay time, kept
    /// inside the line so the doubled right tap stays valid too.
    fn shift(&self) -> usize {
        let shift = (self.delay_time.get() * SAMPLE_RATE).round().max(0.0) as usize;
        shift.min((self.line.len() - FRAME_SIZE) / 2)
    }

    /// Process one frame in place.
    pub fn process(&mut self, io: &mut Frame) {
        let shift = self.shift();
        let delay_ratio = self.delay_ratio.get();
        let feedback = self.feedback_ratio.get();
        let end = self.line.len();

        // Pass 1: age the line by one frame
        self.line.copy_within(FRAME_SIZE.., 0);

        // Pass 2: append input plus fed-back previous output
        for i in 0..FRAME_SIZE {
            self.line[end - FRAME_SIZE + i] = io[i] + self.previous_output[i] * feedback;
        }

        // Pass 3: mix the taps, right channel twice as far back
        let left_tap = end - FRAME_SIZE - shift;
        let right_tap = end - FRAME_SIZE - 2 * shift;
        for i in 0..FRAME_SIZE {
            io[i].left += delay_ratio * self.line[left_tap + i].left;
            io[i].right += delay_ratio * self.line[right_tap + i].right;
        }

        self.previous_output = *io;
    }
}
