//! Device adapters for the sintonia synthesizer.
//!
//! This crate owns everything that talks to drivers:
//! - MIDI input via [`midi_in`]: per-port FIFOs plus the action registry
//! - MIDI output via [`midi_out`]: raw bytes and SysEx to controllers
//! - Audio output via [`audio_out`]: a bounded frame FIFO drained by cpal
//!
//! The synthesis loop never blocks inside a driver callback; driver
//! callbacks never block on the synthesis loop. The only blocking edge is
//! the synthesis thread pushing finished frames, which is the intended
//! backpressure.

pub mod audio_out;
pub mod midi_in;
pub mod midi_out;

pub use audio_out::AudioOutput;
pub use midi_in::{MidiInput, MidiInsert, PortIndex};
pub use midi_out::MidiOutput;

/// Error type for device adapter operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("MIDI device error: {0}")]
    Midi(String),

    #[error("audio stream error: {0}")]
    Stream(String),

    #[error("no audio output device available")]
    NoDevice,

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("audio output closed")]
    OutputClosed,
}

pub type Result<T> = std::result::Result<T, Error>;
