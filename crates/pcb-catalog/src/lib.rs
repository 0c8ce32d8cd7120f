//! Pin and interface catalog.
//!
//! A [`Catalog`] is the linked form of a [`CatalogSnapshot`]: interface types
//! grouped into families, their pins with symmetric compatibility, and the
//! connectivities (parts) that expose interfaces on physical pins. Logical
//! networks are derived per family on first use.

pub mod builder;
pub mod catalog;
pub mod error;
pub mod family;
pub mod graph;
pub mod ids;
pub mod interface;
pub mod interface_pin;
pub mod interface_type;
pub mod natural;
pub mod pin;
pub mod provider;
pub mod snapshot;
pub mod specialisation;

pub use builder::{CatalogBuilder, interface_pin_id, pin_id};
pub use catalog::Catalog;
pub use error::CatalogError;
pub use family::{InterfaceFamily, LogicalNetwork};
pub use ids::{
    ConnectivityId, FamilyId, FamilyKey, InterfaceId, InterfacePinId, InterfaceTypeId,
    PinAssignmentId, PinId,
};
pub use interface::{Connectivity, Interface, InterfaceAdapter, PinAssignment};
pub use interface_pin::{BusSharing, InterfacePin};
pub use interface_type::InterfaceType;
pub use natural::{NaturalKey, natural_cmp};
pub use pin::{Pin, PinType, ReferenceKind};
pub use provider::{CatalogCache, CatalogProvider, JsonFileCatalogProvider, StaticCatalogProvider};
pub use snapshot::{CatalogSnapshot, FamilyRecord, InterfacePinRecord, InterfaceTypeRecord};
pub use specialisation::InterfaceSpecialisation;
