//! MIDI channel to preset assignment.
//!
//! Maps channel ids to the sound preset notes on that channel play.
//! Channel ids may exceed the 16 wire channels: arpeggiators emit on
//! logical channels of their own so they can carry different sounds. A
//! selection cursor walks the assigned channels with wrap-around; the
//! selected channel's parameter group is what the control surface edits.

use std::collections::BTreeMap;

use sintonia_synth::SoundParams;

use crate::group::GroupHandle;
use crate::ui::UserInterface;

/// A channel's sound: the preset and the group editing it.
pub struct ChannelPreset {
    pub name: String,
    pub params: SoundParams,
    pub group: GroupHandle,
}

/// The channel map and its selection cursor.
#[derive(Default)]
pub struct ChannelAssignment {
    channels: BTreeMap<i32, ChannelPreset>,
    selected: Option<i32>,
}

impl ChannelAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a preset to a channel, replacing any previous assignment.
    pub fn assign(&mut self, channel: i32, preset: ChannelPreset) {
        tracing::info!(channel, preset = %preset.name, "assigning channel");
        self.channels.insert(channel, preset);
    }

    /// The preset assigned to a channel.
    pub fn get(&self, channel: i32) -> Option<&ChannelPreset> {
        self.channels.get(&channel)
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// The currently selected channel, if any.
    pub fn selected(&self) -> Option<i32> {
        self.selected
    }

    /// The preset of the currently selected channel.
    pub fn selected_preset(&self) -> Option<&ChannelPreset> {
        self.selected.and_then(|c| self.channels.get(&c))
    }

    /// Move the selection to the next assigned channel, wrapping to the
    /// first.
    pub fn select_next(&mut self) -> Option<i32> {
        let next = match self.selected {
            Some(current) => self
                .channels
                .range(current + 1..)
                .next()
                .or_else(|| self.channels.iter().next())
                .map(|(c, _)| *c),
            None => self.channels.keys().next().copied(),
        };
        self.selected = next;
        next
    }

    /// Move the selection to the previous assigned channel, wrapping to
    /// the last.
    pub fn select_previous(&mut self) -> Option<i32> {
        let previous = match self.selected {
            Some(current) => self
                .channels
                .range(..current)
                .next_back()
                .or_else(|| self.channels.iter().next_back())
                .map(|(c, _)| *c),
            None => self.channels.keys().next_back().copied(),
        };
        self.selected = previous;
        previous
    }

    /// Bring the selected channel's group to the top of the interface.
    pub fn apply_selection(&self, ui: &mut UserInterface) {
        if let Some(preset) = self.selected_preset() {
            ui.prioritize_layer(&preset.group);
        }
    }
}
