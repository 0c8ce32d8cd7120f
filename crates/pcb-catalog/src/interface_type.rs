use std::fmt;

use crate::ids::{FamilyKey, InterfacePinId, InterfaceTypeId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceType {
    pub id: InterfaceTypeId,
    pub name: String,
    pub label: String,
    pub family: FamilyKey,
    pub function: String,
    /// Requesting side of a bus (a master, a source, a driver).
    pub can_be_required: bool,
    pub can_be_specialised: bool,
    /// Pins in catalog order.
    pub pins: Vec<InterfacePinId>,
    pub parents: Vec<InterfaceTypeId>,
    pub children: Vec<InterfaceTypeId>,
    pub compatible_types: Vec<InterfaceTypeId>,
}

impl InterfaceType {
    /// Two types are compatible if either lists the other as compatible or as
    /// a parent.
    pub fn is_compatible(&self, other: &InterfaceType) -> bool {
        self.compatible_types.contains(&other.id)
            || other.compatible_types.contains(&self.id)
            || self.parents.contains(&other.id)
            || other.parents.contains(&self.id)
    }

    pub fn has_pin(&self, pin: InterfacePinId) -> bool {
        self.pins.contains(&pin)
    }

    pub fn first_pin(&self) -> Option<InterfacePinId> {
        self.pins.first().copied()
    }

    /// Generic types with children are split into one interface per child
    /// when a part is instantiated.
    pub fn is_separable(&self) -> bool {
        !self.children.is_empty()
    }
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
