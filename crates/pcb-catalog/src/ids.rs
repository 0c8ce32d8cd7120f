use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for ids derived from human-readable catalog keys.
pub const CATALOG_NAMESPACE: Uuid = Uuid::from_u128(0x6c1f_4a2e_93d0_4b7a_8e55_2f1d_0c9b_7a31);

macro_rules! catalog_id {
    ($(#[$meta:meta])* $name:ident, $tag:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Stable id derived from `key`. The same key always yields the same id.
            pub fn from_key(key: &str) -> Self {
                Self(Uuid::new_v5(
                    &CATALOG_NAMESPACE,
                    format!("{}:{}", $tag, key).as_bytes(),
                ))
            }

            pub fn new_random() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

catalog_id!(
    /// Physical pin of a connectivity.
    PinId,
    "pin"
);
catalog_id!(
    /// Pin slot of an interface type.
    InterfacePinId,
    "interface-pin"
);
catalog_id!(InterfaceTypeId, "interface-type");
catalog_id!(FamilyId, "family");
catalog_id!(
    /// Catalog entry describing the pins and interfaces of one part.
    ConnectivityId,
    "connectivity"
);
catalog_id!(InterfaceId, "interface");
catalog_id!(PinAssignmentId, "pin-assignment");

/// Key of an interface family.
///
/// Interface types without a declared family form a family of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FamilyKey {
    Declared(FamilyId),
    Implicit(InterfaceTypeId),
    /// Family reported for buses without fragments.
    DoNotConnect,
}

impl fmt::Display for FamilyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FamilyKey::Declared(id) => write!(f, "family {id}"),
            FamilyKey::Implicit(id) => write!(f, "implicit family of {id}"),
            FamilyKey::DoNotConnect => write!(f, "DNC family"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyed_ids_are_stable_and_tagged() {
        assert_eq!(PinId::from_key("MCU/PA1"), PinId::from_key("MCU/PA1"));
        assert_ne!(PinId::from_key("MCU/PA1"), PinId::from_key("MCU/PA2"));
        assert_ne!(
            PinId::from_key("SPI").as_uuid(),
            InterfaceTypeId::from_key("SPI").as_uuid()
        );
    }

    #[test]
    fn ids_serialize_as_plain_uuids() {
        let id = FamilyId::from_key("SPI");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.0));
        let back: FamilyId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
