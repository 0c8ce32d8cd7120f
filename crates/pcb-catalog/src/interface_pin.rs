use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{InterfacePinId, InterfaceTypeId};
use crate::pin::PinType;

/// Whether a signal may be joined by more than two interfaces of a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusSharing {
    #[default]
    Exclusive,
    Shared,
}

/// A named signal slot of an interface type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfacePin {
    pub id: InterfacePinId,
    pub interface_type: InterfaceTypeId,
    pub reference: String,
    pub pin_type: PinType,
    pub is_required: bool,
    pub sharing: BusSharing,
    pub multiple_use: bool,
    /// Symmetric: if `a` lists `b`, `b` lists `a`.
    pub compatible_pins: BTreeSet<InterfacePinId>,
    pub parent_pins: BTreeSet<InterfacePinId>,
    pub child_pins: BTreeSet<InterfacePinId>,
}

impl InterfacePin {
    pub fn is_shared(&self) -> bool {
        self.sharing == BusSharing::Shared
    }

    pub fn is_compatible_with(&self, other: InterfacePinId) -> bool {
        self.compatible_pins.contains(&other)
    }
}

impl fmt::Display for InterfacePin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reference)
    }
}
