//! Logical control items.
//!
//! An [`Item`] is a named, ranged view over a shared parameter scalar.
//! The scalar is usually one a sound generator already reads (an envelope
//! time, an oscillator level), so setting the item from a controller
//! reaches every running voice built from the preset.

use sintonia_core::midi::{self, Velocity};
use sintonia_core::param::Param;

/// A typed parameter with a range and a 7-bit setter.
#[derive(Clone, Debug)]
pub struct Item {
    /// User-facing name, also what the controller display shows.
    pub name: String,
    pub min: f64,
    pub max: f64,
    value: Param,
}

impl Item {
    /// An item over a fresh scalar starting at `default`.
    pub fn new(name: &str, min: f64, max: f64, default: f64) -> Self {
        Self { name: name.into(), min, max, value: Param::new(default) }
    }

    /// An item over an existing shared scalar.
    pub fn bound(name: &str, min: f64, max: f64, value: Param) -> Self {
        Self { name: name.into(), min, max, value }
    }

    /// A level in [0, 1] over an existing scalar.
    pub fn level(name: &str, value: Param) -> Self {
        Self::bound(name, 0.0, 1.0, value)
    }

    /// A time in seconds, 0 to `max_seconds`, over an existing scalar.
    pub fn time(name: &str, max_seconds: f64, value: Param) -> Self {
        Self::bound(name, 0.0, max_seconds, value)
    }

    pub fn value(&self) -> f64 {
        self.value.get()
    }

    /// Set the value, clamped silently into the range.
    pub fn set(&self, value: f64) {
        self.value.set(value.clamp(self.min, self.max));
    }

    /// Set from a 7-bit controller value scaled linearly into the range.
    pub fn set_from_controller(&self, value: Velocity) {
        self.value.set(midi::value_in(value, self.min, self.max));
        tracing::debug!(item = %self.name, value = self.value.get(), "control set");
    }

    /// The underlying shared scalar.
    pub fn param(&self) -> &Param {
        &self.value
    }
}
