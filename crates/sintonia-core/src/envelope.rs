//! ADSR envelope generator.
//!
//! A five-stage state machine advanced at the frame frequency; an envelope
//! shapes a control value, so there is no need to update it at the audio
//! rate. The per-stage time accumulator carries its excess across
//! transitions, and transitions are re-evaluated in a loop so arbitrarily
//! short stage times collapse within a single frame.

use crate::config::FRAME_PERIOD;
use crate::param::Param;

/// Shape of the envelope, shared between the preset and its voices.
#[derive(Clone, Debug)]
pub struct EnvelopeParams {
    /// Attack time in seconds. Zero means immediate full level.
    pub attack_time: Param,
    /// Decay time in seconds. Zero goes straight to sustain.
    pub decay_time: Param,
    /// Sustain level in [0, 1].
    pub sustain_level: Param,
    /// Release time in seconds. Zero stops the sound immediately.
    pub release_time: Param,
}

impl EnvelopeParams {
    pub fn new(attack: f64, decay: f64, sustain: f64, release: f64) -> Self {
        Self {
            attack_time: Param::new(attack),
            decay_time: Param::new(decay),
            sustain_level: Param::new(sustain),
            release_time: Param::new(release),
        }
    }
}

impl Default for EnvelopeParams {
    /// Immediate attack, no decay, full sustain, immediate release.
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, 0.0)
    }
}

/// The stages of the state machine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EnvelopeStage {
    #[default]
    Stopped,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// An ADSR envelope generator.
#[derive(Clone, Debug, Default)]
pub struct Envelope {
    params: EnvelopeParams,
    stage: EnvelopeStage,
    /// Seconds spent in the current stage.
    state_time: f64,
    output: f64,
    /// Level the release ramp fades down from.
    release_start_level: f64,
}

impl Envelope {
    pub fn new(params: EnvelopeParams) -> Self {
        Self {
            params,
            stage: EnvelopeStage::Stopped,
            state_time: 0.0,
            output: 0.0,
            release_start_level: 0.0,
        }
    }

    pub fn params(&self) -> &EnvelopeParams {
        &self.params
    }

    /// Start the envelope from the beginning of the attack stage.
    pub fn start(&mut self) {
        self.stage = EnvelopeStage::Attack;
        self.state_time = 0.0;
    }

    /// Enter the release stage, fading from the current output level.
    pub fn stop(&mut self) {
        self.release_start_level = self.output;
        self.stage = EnvelopeStage::Release;
        self.state_time = 0.0;
    }

    /// Current output level in [0, 1].
    #[inline]
    pub fn out(&self) -> f64 {
        self.output
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    /// True until the release stage has completed.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.stage != EnvelopeStage::Stopped
    }

    /// Advance by one frame period.
    ///
    /// Several stage transitions may fire in the same frame when the stage
    /// times are shorter than a frame; the loop runs until the stage is
    /// stable.
    pub fn tick_frame(&mut self) {
        self.state_time += FRAME_PERIOD;
        loop {
            let previous = self.stage;
            match self.stage {
                EnvelopeStage::Stopped => {
                    self.output = 0.0;
                }
                EnvelopeStage::Attack => {
                    let attack = self.params.attack_time.get();
                    if self.state_time >= attack {
                        self.state_time -= attack;
                        self.output = 1.0;
                        self.stage = EnvelopeStage::Decay;
                    } else {
                        self.output = self.state_time / attack;
                    }
                }
                EnvelopeStage::Decay => {
                    let decay = self.params.decay_time.get();
                    if self.state_time >= decay {
                        self.state_time -= decay;
                        self.stage = EnvelopeStage::Sustain;
                    } else {
                        self.output = 1.0
                            - (1.0 - self.params.sustain_level.get()) * self.state_time / decay;
                    }
                }
                EnvelopeStage::Sustain => {
                    self.output = self.params.sustain_level.get();
                }
                EnvelopeStage::Release => {
                    let release = self.params.release_time.get();
                    if self.state_time >= release {
                        self.stage = EnvelopeStage::Stopped;
                    } else {
                        self.output =
                            self.release_start_level * (1.0 - self.state_time / release);
                    }
                }
            }
            if self.stage == previous {
                break;
            }
        }
    }
}
