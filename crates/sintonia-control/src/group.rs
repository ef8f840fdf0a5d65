//! Parameter groups.
//!
//! A group is a named dispatch table from physical items to setter
//! closures, the unit the user interface stacks into layers. Groups may
//! nest sub-groups (an instrument's group owns its oscillator and
//! envelope groups) and may carry a MIDI channel affinity so channel
//! selection can find them.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use sintonia_core::midi::Channel;

use crate::item::Item;
use crate::physical::{PhysicalId, PhysicalItem};

/// Groups are shared between the UI stack, channel assignment and their
/// parents.
pub type GroupHandle = Rc<RefCell<Group>>;

/// A named set of control bindings.
#[derive(Default)]
pub struct Group {
    pub name: String,
    /// MIDI channel this group belongs to, when it is an instrument's.
    pub channel: Option<Channel>,
    dispatch: HashMap<PhysicalId, Box<dyn Fn()>>,
    sub_groups: Vec<GroupHandle>,
}

impl Group {
    pub fn new(name: &str, channel: Option<Channel>) -> GroupHandle {
        Rc::new(RefCell::new(Self {
            name: name.into(),
            channel,
            dispatch: HashMap::new(),
            sub_groups: Vec::new(),
        }))
    }

    /// Assign an arbitrary action to a physical item.
    pub fn assign(&mut self, id: PhysicalId, action: impl Fn() + 'static) {
        self.dispatch.insert(id, Box::new(action));
    }

    /// Bind a logical item to a physical item: dispatching the physical
    /// item through this group pushes its latest value into the item.
    pub fn bind(&mut self, physical: &PhysicalItem, item: Item) {
        let read = physical.reader();
        self.assign(physical.id(), move || item.set_from_controller(read()));
    }

    /// Nest a sub-group under this one.
    pub fn add_sub_group(&mut self, group: GroupHandle) {
        self.sub_groups.push(group);
    }

    pub fn sub_groups(&self) -> &[GroupHandle] {
        &self.sub_groups
    }

    /// Run the action bound to a physical item, if this group has one.
    pub fn try_dispatch(&self, id: PhysicalId) -> bool {
        match self.dispatch.get(&id) {
            Some(action) => {
                tracing::debug!(group = %self.name, "dispatch");
                action();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physical::{PhysicalEvent, PhysicalKind};
    use crate::ui::UserInterface;
    use sintonia_io::MidiInput;

    fn knob(midi: &mut MidiInput, cc: i8) -> PhysicalItem {
        PhysicalItem::new(
            midi,
            UserInterface::shared(),
            PhysicalKind::Knob,
            PhysicalEvent::Cc(cc),
            "knob",
        )
    }

    #[test]
    fn dispatch_hits_only_assigned_items() {
        let mut midi = MidiInput::new(2);
        let bound = knob(&mut midi, 1);
        let unbound = knob(&mut midi, 2);

        let group = Group::new("test", None);
        let item = Item::new("level", 0.0, 1.0, 0.0);
        group.borrow_mut().bind(&bound, item.clone());

        assert!(!group.borrow().try_dispatch(unbound.id()));
        assert!(group.borrow().try_dispatch(bound.id()));
    }

    #[test]
    fn bind_pushes_the_physical_value_into_the_item() {
        let mut midi = MidiInput::new(2);
        let physical = knob(&mut midi, 0x47);
        let group = Group::new("filter", Some(0));
        let item = Item::new("resonance", 0.0, 1.0, 0.0);
        group.borrow_mut().bind(&physical, item.clone());

        // Move the hardware, then dispatch through the group
        midi.feed(0, &[0xb0, 0x47, 127]);
        midi.dispatch_registered_actions();
        group.borrow().try_dispatch(physical.id());
        assert_eq!(item.value(), 1.0);
    }

    #[test]
    fn sub_groups_nest() {
        let parent = Group::new("instrument", Some(3));
        let child = Group::new("envelope", None);
        parent.borrow_mut().add_sub_group(child.clone());
        assert_eq!(parent.borrow().sub_groups().len(), 1);
        assert_eq!(parent.borrow().sub_groups()[0].borrow().name, "envelope");
        assert_eq!(parent.borrow().channel, Some(3));
    }
}
