//! Sintonia Control - from hardware gestures to parameter changes
//!
//! The control stack in four pieces:
//!
//! - [`physical`] hardware controls, identified by the MIDI events they
//!   emit, holding their latest 7-bit value
//! - [`item`] logical items: typed, ranged parameters settable from a
//!   7-bit controller value
//! - [`group`] named dispatch tables binding physical items to logical
//!   item setters, with sub-groups
//! - [`ui`] the ordered stack of groups; the topmost group that knows a
//!   physical item wins
//!
//! plus the pieces that use it: [`channel_assignment`] mapping MIDI
//! channels to presets, and [`keylab`], the Arturia KeyLab Essential
//! surface (display, button lights, control bank).

pub mod channel_assignment;
pub mod group;
pub mod item;
pub mod keylab;
pub mod physical;
pub mod ui;

pub use channel_assignment::{ChannelAssignment, ChannelPreset};
pub use group::{Group, GroupHandle};
pub use item::Item;
pub use keylab::{Button, KeylabControls, KeylabEssential};
pub use physical::{PhysicalEvent, PhysicalId, PhysicalItem, PhysicalKind};
pub use ui::{UiHandle, UserInterface};
