//! Sintonia Synth - voices, sound generators and MIDI event routing
//!
//! The synthesis layer between the device adapters and the mixer:
//!
//! - [`dco`] square/triangle oscillator with PWM, detune and pitch bend
//! - [`dco_envelope`] the oscillator wrapped in an ADSR envelope
//! - [`noise`] dual-envelope filtered noise
//! - [`sound_generator`] the closed variant over all generators
//! - [`voice`] the `(channel, note)` voice map and the frame mixer
//! - [`sustain`] pedal semantics: deferred note-offs and retriggering
//! - [`arpeggiator`] note bag plus MIDI-clock-driven emitters
//! - [`wheel`] pitch-bend and modulation broadcast scalars
//! - [`automate`] tick-paced automation routines

pub mod arpeggiator;
pub mod automate;
pub mod dco;
pub mod dco_envelope;
pub mod noise;
pub mod sound_generator;
pub mod sustain;
pub mod voice;
pub mod wheel;

pub use arpeggiator::Arpeggiator;
pub use automate::{Automate, AutomateContext};
pub use dco::{Dco, DcoParams};
pub use dco_envelope::{DcoEnvelope, DcoEnvelopeParams};
pub use noise::{Noise, NoiseParams};
pub use sound_generator::{SoundGenerator, SoundParams};
pub use sustain::Sustain;
pub use voice::{Mixer, VoiceMap};
pub use wheel::{register_modulation_wheel, register_pitch_bend};
