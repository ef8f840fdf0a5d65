//! The sintonia synthesizer: engine loop and standard rig.
//!
//! The binary lives in `main.rs`; everything testable is here:
//! [`engine`] owns the synthesis loop state and renders frames,
//! [`setup`] builds the standard channel/preset/surface rig on top of it.

pub mod engine;
pub mod setup;

pub use engine::Engine;
