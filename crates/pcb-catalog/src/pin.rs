use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::PinId;
use crate::natural::NaturalKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinType {
    Digital,
    Analog,
    Power,
    Gnd,
    Nc,
    Generic,
}

impl fmt::Display for PinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PinType::Digital => "digital",
            PinType::Analog => "analog",
            PinType::Power => "power",
            PinType::Gnd => "gnd",
            PinType::Nc => "nc",
            PinType::Generic => "generic",
        };
        f.write_str(s)
    }
}

/// Which reference pin of a signal pin is meant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Voltage,
    Ground,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceKind::Voltage => f.write_str("voltage"),
            ReferenceKind::Ground => f.write_str("ground"),
        }
    }
}

/// Physical pin of a part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pin {
    pub id: PinId,
    pub pin_type: PinType,
    pub name: String,
    pub number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage_reference_pin: Option<PinId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gnd_reference_pin: Option<PinId>,
}

impl Pin {
    pub fn new(
        id: PinId,
        pin_type: PinType,
        name: impl Into<String>,
        number: impl Into<String>,
    ) -> Self {
        Self {
            id,
            pin_type,
            name: name.into(),
            number: number.into(),
            voltage_reference_pin: None,
            gnd_reference_pin: None,
        }
    }

    pub fn reference_pin(&self, kind: ReferenceKind) -> Option<PinId> {
        match kind {
            ReferenceKind::Voltage => self.voltage_reference_pin,
            ReferenceKind::Ground => self.gnd_reference_pin,
        }
    }

    /// Key ordering pins by number (naturally), then by name.
    pub fn order_key(&self) -> (NaturalKey, String) {
        (NaturalKey::new(self.number.clone()), self.name.clone())
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} (#{})", self.pin_type, self.name, self.number)
    }
}
