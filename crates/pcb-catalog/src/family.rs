use std::collections::BTreeSet;
use std::fmt;

use once_cell::sync::OnceCell;

use crate::ids::{FamilyKey, InterfacePinId, InterfaceTypeId};

/// Group of interface types that can be wired into one bus.
#[derive(Debug)]
pub struct InterfaceFamily {
    pub key: FamilyKey,
    pub name: String,
    pub label: String,
    pub interface_types: Vec<InterfaceTypeId>,
    pub(crate) networks: OnceCell<Vec<LogicalNetwork>>,
}

impl InterfaceFamily {
    pub(crate) fn new(key: FamilyKey, name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key,
            name: name.into(),
            label: label.into(),
            interface_types: Vec::new(),
            networks: OnceCell::new(),
        }
    }

    pub(crate) fn do_not_connect() -> Self {
        Self::new(FamilyKey::DoNotConnect, "Do not connect", "DNC")
    }

    pub fn is_implicit(&self) -> bool {
        matches!(self.key, FamilyKey::Implicit(_))
    }
}

impl fmt::Display for InterfaceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// One electrical signal of a family: the requesting pins that drive it and
/// the receiving pins they connect to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogicalNetwork {
    name: String,
    requesting_pins: BTreeSet<InterfacePinId>,
    receiving_pins: BTreeSet<InterfacePinId>,
}

impl LogicalNetwork {
    /// `requesting` and `receiving` are `(id, reference)` pairs.
    pub(crate) fn new(
        requesting: Vec<(InterfacePinId, &str)>,
        receiving: Vec<(InterfacePinId, &str)>,
    ) -> Self {
        let side = |pins: &[(InterfacePinId, &str)]| {
            let mut refs: Vec<&str> = pins.iter().map(|(_, r)| *r).collect();
            refs.sort_unstable();
            refs.dedup();
            refs.join(", ")
        };
        let name = format!("{} -> {}", side(&requesting), side(&receiving));
        Self {
            name,
            requesting_pins: requesting.into_iter().map(|(id, _)| id).collect(),
            receiving_pins: receiving.into_iter().map(|(id, _)| id).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn requesting_pins(&self) -> &BTreeSet<InterfacePinId> {
        &self.requesting_pins
    }

    pub fn receiving_pins(&self) -> &BTreeSet<InterfacePinId> {
        &self.receiving_pins
    }

    pub fn pins(&self) -> BTreeSet<InterfacePinId> {
        self.requesting_pins
            .union(&self.receiving_pins)
            .copied()
            .collect()
    }

    pub fn contains(&self, pin: InterfacePinId) -> bool {
        self.requesting_pins.contains(&pin) || self.receiving_pins.contains(&pin)
    }

    /// True if the network holds `pin` on the given side.
    pub fn has_node(&self, pin: InterfacePinId, is_requesting: bool) -> bool {
        if is_requesting {
            self.requesting_pins.contains(&pin)
        } else {
            self.receiving_pins.contains(&pin)
        }
    }
}

impl fmt::Display for LogicalNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
