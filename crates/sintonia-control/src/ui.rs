//! The user-interface layer stack.
//!
//! The interface is an ordered stack of groups. When a physical item
//! fires, the stack is walked top-down and the first group with a binding
//! for the item consumes it; lower layers never see it. Selecting an
//! instrument prioritizes its group so the surface's eight knobs always
//! drive the sound currently in focus.

use std::cell::RefCell;
use std::rc::Rc;

use crate::group::GroupHandle;
use crate::physical::PhysicalId;

/// The interface is shared with every physical item's dispatch closure.
pub type UiHandle = Rc<RefCell<UserInterface>>;

/// The ordered stack of active layers; the back of the vector is the top.
#[derive(Default)]
pub struct UserInterface {
    layers: Vec<GroupHandle>,
}

impl UserInterface {
    pub fn new() -> Self {
        Self::default()
    }

    /// A shareable, empty interface.
    pub fn shared() -> UiHandle {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Push a layer on top of the interface.
    pub fn add_layer(&mut self, group: GroupHandle) {
        self.layers.push(group);
    }

    /// Remove a layer wherever it sits in the stack.
    pub fn remove_layer(&mut self, group: &GroupHandle) {
        self.layers.retain(|g| !Rc::ptr_eq(g, group));
    }

    /// Move a layer to the top of the stack, adding it if absent.
    pub fn prioritize_layer(&mut self, group: &GroupHandle) {
        self.remove_layer(group);
        self.layers.push(group.clone());
    }

    /// The name of the topmost layer, for displays.
    pub fn top_layer_name(&self) -> Option<String> {
        self.layers.last().map(|g| g.borrow().name.clone())
    }

    /// Offer a physical item to the stack, topmost layer first.
    ///
    /// Returns whether some layer dispatched it.
    pub fn dispatch(&self, id: PhysicalId) -> bool {
        for layer in self.layers.iter().rev() {
            if layer.borrow().try_dispatch(id) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::Group;
    use crate::item::Item;
    use crate::physical::{PhysicalEvent, PhysicalItem, PhysicalKind};
    use sintonia_io::MidiInput;

    fn knob(midi: &mut MidiInput, ui: &UiHandle, cc: i8) -> PhysicalItem {
        PhysicalItem::new(midi, ui.clone(), PhysicalKind::Knob, PhysicalEvent::Cc(cc), "knob")
    }

    #[test]
    fn topmost_matching_layer_wins() {
        let mut midi = MidiInput::new(1);
        let ui = UserInterface::shared();
        let physical = knob(&mut midi, &ui, 0x4a);

        let bottom_item = Item::new("bottom", 0.0, 1.0, 0.0);
        let top_item = Item::new("top", 0.0, 1.0, 0.0);
        let bottom = Group::new("bottom", None);
        let top = Group::new("top", None);
        bottom.borrow_mut().bind(&physical, bottom_item.clone());
        top.borrow_mut().bind(&physical, top_item.clone());

        ui.borrow_mut().add_layer(bottom);
        ui.borrow_mut().add_layer(top);

        midi.feed(0, &[0xb0, 0x4a, 127]);
        midi.dispatch_registered_actions();

        assert_eq!(top_item.value(), 1.0, "top layer consumed the event");
        assert_eq!(bottom_item.value(), 0.0, "bottom layer never saw it");
    }

    #[test]
    fn events_fall_through_to_lower_layers() {
        let mut midi = MidiInput::new(1);
        let ui = UserInterface::shared();
        let physical = knob(&mut midi, &ui, 0x47);

        let bottom_item = Item::new("bottom", 0.0, 1.0, 0.0);
        let bottom = Group::new("bottom", None);
        bottom.borrow_mut().bind(&physical, bottom_item.clone());
        let top = Group::new("top", None); // knows nothing

        ui.borrow_mut().add_layer(bottom);
        ui.borrow_mut().add_layer(top);

        midi.feed(0, &[0xb0, 0x47, 64]);
        midi.dispatch_registered_actions();
        assert!(bottom_item.value() > 0.0);
    }

    #[test]
    fn prioritize_moves_a_layer_to_the_top() {
        let mut midi = MidiInput::new(1);
        let ui = UserInterface::shared();
        let physical = knob(&mut midi, &ui, 0x10);

        let first_item = Item::new("first", 0.0, 1.0, 0.0);
        let second_item = Item::new("second", 0.0, 1.0, 0.0);
        let first = Group::new("first", None);
        let second = Group::new("second", None);
        first.borrow_mut().bind(&physical, first_item.clone());
        second.borrow_mut().bind(&physical, second_item.clone());

        ui.borrow_mut().add_layer(first.clone());
        ui.borrow_mut().add_layer(second);
        ui.borrow_mut().prioritize_layer(&first);
        assert_eq!(ui.borrow().top_layer_name().as_deref(), Some("first"));

        midi.feed(0, &[0xb0, 0x10, 127]);
        midi.dispatch_registered_actions();
        assert_eq!(first_item.value(), 1.0);
        assert_eq!(second_item.value(), 0.0);
    }

    #[test]
    fn remove_layer_stops_dispatch() {
        let ui = UserInterface::shared();
        let group = Group::new("only", None);
        ui.borrow_mut().add_layer(group.clone());
        assert_eq!(ui.borrow().layer_count(), 1);
        ui.borrow_mut().remove_layer(&group);
        assert_eq!(ui.borrow().layer_count(), 0);
    }

    #[test]
    fn unclaimed_events_report_false() {
        let ui = UserInterface::shared();
        let mut midi = MidiInput::new(1);
        let physical = knob(&mut midi, &ui, 0x11);
        assert!(!ui.borrow().dispatch(physical.id()));
    }
}
