use thiserror::Error;

use crate::ids::{ConnectivityId, FamilyKey, InterfacePinId, InterfaceTypeId};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Unknown interface type: {0}")]
    UnknownInterfaceType(String),

    #[error("Unknown interface pin: {0}")]
    UnknownInterfacePin(String),

    #[error("Unknown interface family: {0}")]
    UnknownFamily(String),

    #[error("Unknown connectivity: {0}")]
    UnknownConnectivity(String),

    #[error("Connectivity {connectivity} has no pin {pin}")]
    UnknownPin { connectivity: String, pin: String },

    #[error("Interface type {interface_type} has no pin with reference {reference}")]
    UnknownPinReference {
        interface_type: String,
        reference: String,
    },

    #[error("Interface pin {pin} has no child pin on interface type {child_type}")]
    MissingChildPin {
        pin: String,
        child_type: InterfaceTypeId,
    },

    #[error("Duplicate {kind} in catalog: {name}")]
    Duplicate { kind: &'static str, name: String },

    #[error("No logical network of {family} contains {direction} pin {pin}")]
    NoLogicalNetwork {
        family: FamilyKey,
        pin: String,
        direction: &'static str,
    },

    #[error("Interface pin {pin} belongs to {count} logical networks of {family}")]
    AmbiguousLogicalNetwork {
        family: FamilyKey,
        pin: InterfacePinId,
        count: usize,
    },

    #[error(
        "Pin index {index} of specialised pin {pin} is out of range for {connectivity} ({available} pins available)"
    )]
    SpecialisationIndex {
        pin: String,
        index: usize,
        available: usize,
        connectivity: ConnectivityId,
    },

    #[error("Catalog provider failed: {0}")]
    Provider(String),

    #[error("Invalid catalog snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl CatalogError {
    /// True when the error reports something that could not be found, rather
    /// than malformed catalog data.
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            CatalogError::UnknownInterfaceType(_)
                | CatalogError::UnknownInterfacePin(_)
                | CatalogError::UnknownFamily(_)
                | CatalogError::UnknownConnectivity(_)
                | CatalogError::UnknownPin { .. }
                | CatalogError::UnknownPinReference { .. }
                | CatalogError::MissingChildPin { .. }
                | CatalogError::NoLogicalNetwork { .. }
        )
    }
}

pub type Result<T, E = CatalogError> = std::result::Result<T, E>;
