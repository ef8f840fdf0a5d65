//! Sintonia Core - timing substrate, MIDI model and DSP primitives
//!
//! This crate provides the foundation the synthesizer is built on:
//!
//! - [`config`] process-wide audio constants (sample rate, frame size)
//! - [`audio`] stereo `f64` sample and frame types
//! - [`midi`] tagged MIDI messages, ordered headers and parsing
//! - [`clock`] frame/MIDI-tick/beat/measure clock with subscriptions
//! - [`scheduler`] wall-clock appointment queue
//! - [`envelope`] frame-rate ADSR generator
//! - [`filters`] one-pole low-pass, resonance biquad and ladder filters
//! - [`lfo`] frame-rate low-frequency oscillator
//!
//! Everything here is single-threaded state owned by the synthesis loop;
//! the device-facing adapters live in `sintonia-io`.

pub mod audio;
pub mod clock;
pub mod config;
pub mod envelope;
pub mod filters;
pub mod lfo;
pub mod midi;
pub mod param;
pub mod scheduler;

pub use audio::{Frame, MonoFrame, Stereo, silence};
pub use clock::{Clock, ClockEvent, SubscriberId, Tick};
pub use config::{FRAME_FREQUENCY, FRAME_PERIOD, FRAME_SIZE, SAMPLE_RATE};
pub use envelope::{Envelope, EnvelopeParams, EnvelopeStage};
pub use filters::{LadderFilter, LowPassFilter, ResonanceFilter};
pub use lfo::Lfo;
pub use param::Param;
pub use scheduler::Scheduler;
