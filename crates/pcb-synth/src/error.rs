use std::path::PathBuf;

use pcb_catalog::{CatalogError, ReferenceKind};
use thiserror::Error;

/// Broad class of a [`SynthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The circuit or catalog is described inconsistently.
    Definition,
    /// Something that should exist could not be found.
    Lookup,
}

#[derive(Debug, Error)]
pub enum SynthError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Unknown component: {0}")]
    UnknownComponent(String),

    #[error("{0} is an unresolved component filter")]
    UnresolvedFilter(String),

    #[error("{component} is not a candidate of filter {filter}")]
    NotACandidate { filter: String, component: String },

    #[error("Invalid bus fragment: {0}")]
    InvalidFragment(String),

    #[error("Bus fragment {0} has unresolved interfaces")]
    UnresolvedFragment(String),

    #[error("Cannot determine the {side} interface type of {fragment}: {reason}")]
    UndeterminedInterfaceType {
        fragment: String,
        side: &'static str,
        reason: String,
    },

    #[error("No interface {name} of type {interface_type} on {component}")]
    InterfaceNotFound {
        component: String,
        name: String,
        interface_type: String,
    },

    #[error("Found {count} interfaces {name} of type {interface_type} on {component}")]
    AmbiguousInterface {
        component: String,
        name: String,
        interface_type: String,
        count: usize,
    },

    #[error("{component} has no pin {pin}")]
    PinNotFound { component: String, pin: String },

    #[error("No pin assignment {assignment} on interface {interface}")]
    PinAssignmentNotFound {
        interface: String,
        assignment: String,
    },

    #[error("Cannot deduce connections of {fragment}: {reason}")]
    UnsupportedPairing { fragment: String, reason: String },

    #[error("Deduced connections of {0} do not cover the same interface pins")]
    ConnectionKeyMismatch(String),

    #[error("Invalid ancillary: {0}")]
    InvalidAncillary(String),

    #[error("Unknown ancillary connection role: {0}")]
    UnknownRole(String),

    #[error("No {kind} reference pin for {connection}")]
    MissingReferencePin {
        kind: ReferenceKind,
        connection: String,
    },

    #[error("Bus {0} spans more than one interface family")]
    MixedFamilies(String),

    #[error("Pins {0} belong to more than one bus")]
    MultipleBuses(String),

    #[error("Failed to connect pins {0}: no bus could be found")]
    UnbussedPins(String),

    #[error("Pin {0} is not on a part")]
    NonPartPin(String),

    #[error("No source pin for net {0}")]
    NoSourcePin(String),

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("{0} is not a board: boards must be children of the root")]
    InvalidBoard(String),

    #[error("Invalid synthesis configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SynthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SynthError::Catalog(err) if err.is_lookup() => ErrorKind::Lookup,
            SynthError::UnknownComponent(_)
            | SynthError::InterfaceNotFound { .. }
            | SynthError::PinNotFound { .. }
            | SynthError::PinAssignmentNotFound { .. }
            | SynthError::MissingReferencePin { .. }
            | SynthError::NoSourcePin(_) => ErrorKind::Lookup,
            _ => ErrorKind::Definition,
        }
    }
}

pub type Result<T, E = SynthError> = std::result::Result<T, E>;
