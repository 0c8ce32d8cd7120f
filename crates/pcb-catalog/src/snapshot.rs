use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ids::{FamilyId, InterfacePinId, InterfaceTypeId};
use crate::interface::Connectivity;
use crate::interface_pin::BusSharing;
use crate::pin::PinType;

/// Serialized form of a catalog, as served by a [`crate::CatalogProvider`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub families: Vec<FamilyRecord>,
    #[serde(default)]
    pub interface_types: Vec<InterfaceTypeRecord>,
    #[serde(default)]
    pub interface_pins: Vec<InterfacePinRecord>,
    #[serde(default)]
    pub connectivities: Vec<Connectivity>,
}

impl CatalogSnapshot {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyRecord {
    pub id: FamilyId,
    pub name: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceTypeRecord {
    pub id: InterfaceTypeId,
    pub name: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<FamilyId>,
    #[serde(default)]
    pub function: String,
    #[serde(default)]
    pub can_be_required: bool,
    #[serde(default)]
    pub can_be_specialised: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<InterfaceTypeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compatible_types: Vec<InterfaceTypeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfacePinRecord {
    pub id: InterfacePinId,
    pub interface_type: InterfaceTypeId,
    pub reference: String,
    pub pin_type: PinType,
    #[serde(default = "default_required")]
    pub is_required: bool,
    #[serde(default)]
    pub sharing: BusSharing,
    #[serde(default)]
    pub multiple_use: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compatible_pins: Vec<InterfacePinId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parent_pins: Vec<InterfacePinId>,
}

fn default_required() -> bool {
    true
}
