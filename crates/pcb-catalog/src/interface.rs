use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::Result;
use crate::ids::{
    ConnectivityId, InterfaceId, InterfacePinId, InterfaceTypeId, PinAssignmentId, PinId,
};
use crate::pin::Pin;

/// Binds one interface pin of an interface to physical pins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinAssignment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<PinAssignmentId>,
    pub interface_pin: InterfacePinId,
    #[serde(default)]
    pub channel: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_interface_pin: Option<InterfacePinId>,
    pub pins: Vec<PinId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_interface_pin: Option<InterfacePinId>,
}

impl PinAssignment {
    pub fn new(interface_pin: InterfacePinId, pins: Vec<PinId>) -> Self {
        Self {
            id: None,
            interface_pin,
            channel: 0,
            parent_interface_pin: None,
            pins,
            original_interface_pin: None,
        }
    }

    /// Copy of this assignment bound to a different interface pin.
    pub fn with_interface_pin(&self, interface_pin: InterfacePinId) -> Self {
        Self {
            interface_pin,
            ..self.clone()
        }
    }
}

/// An interface as declared on a connectivity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<InterfaceId>,
    pub interface_type: InterfaceTypeId,
    pub name: String,
    #[serde(default)]
    pub function: String,
    #[serde(default)]
    pub is_required: bool,
    pub pin_assignments: Vec<PinAssignment>,
    /// Set when this interface was split out of a generic parent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_interface_type: Option<InterfaceTypeId>,
}

impl Interface {
    pub fn pin_assignment(&self, id: PinAssignmentId) -> Option<&PinAssignment> {
        self.pin_assignments.iter().find(|a| a.id == Some(id))
    }

    pub fn assigned_pins(&self) -> impl Iterator<Item = PinId> + '_ {
        self.pin_assignments.iter().flat_map(|a| a.pins.iter().copied())
    }
}

/// Physical pins and interfaces of one kind of part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connectivity {
    pub id: ConnectivityId,
    pub name: String,
    #[serde(default)]
    pub pins: Vec<Pin>,
    #[serde(default)]
    pub interfaces: Vec<Interface>,
}

impl Connectivity {
    pub fn pin(&self, id: PinId) -> Option<&Pin> {
        self.pins.iter().find(|p| p.id == id)
    }

    pub fn pin_by_name(&self, name: &str) -> Option<&Pin> {
        self.pins.iter().find(|p| p.name == name)
    }
}

/// Mapping that lets an interface of one type stand in for another type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceAdapter {
    pub adapted_from_pins: BTreeMap<InterfacePinId, InterfacePinId>,
    pub adapted_to_pins: BTreeMap<InterfacePinId, InterfacePinId>,
    pub original_from_type: Option<InterfaceTypeId>,
    pub adapted_from_type: Option<InterfaceTypeId>,
    pub original_to_type: Option<InterfaceTypeId>,
    pub adapted_to_type: Option<InterfaceTypeId>,
}

impl InterfaceAdapter {
    /// Builds an adapter from per-side pin maps. The adapted type of a side is
    /// the type owning its first adapted pin.
    pub fn from_pin_maps(
        catalog: &Catalog,
        original_from_type: Option<InterfaceTypeId>,
        adapted_from_pins: BTreeMap<InterfacePinId, InterfacePinId>,
        original_to_type: Option<InterfaceTypeId>,
        adapted_to_pins: BTreeMap<InterfacePinId, InterfacePinId>,
    ) -> Result<Self> {
        let adapted_type = |pins: &BTreeMap<InterfacePinId, InterfacePinId>| -> Result<_> {
            pins.values()
                .next()
                .map(|pin| catalog.interface_pin(*pin).map(|p| p.interface_type))
                .transpose()
        };
        let adapted_from_type = adapted_type(&adapted_from_pins)?.or(original_from_type);
        let adapted_to_type = adapted_type(&adapted_to_pins)?.or(original_to_type);
        Ok(Self {
            adapted_from_pins,
            adapted_to_pins,
            original_from_type,
            adapted_from_type,
            original_to_type,
            adapted_to_type,
        })
    }
}
