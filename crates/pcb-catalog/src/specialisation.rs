use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

use crate::catalog::Catalog;
use crate::error::{CatalogError, Result};
use crate::ids::{ConnectivityId, InterfaceId, InterfacePinId, InterfaceTypeId};
use crate::interface::{Connectivity, Interface, PinAssignment};
use crate::natural::natural_cmp;
use crate::pin::Pin;

/// Turns a generic, specialisable interface into a concrete one by picking
/// pins by position.
///
/// Positions are 1-based indices into the generic interface's pins sorted by
/// pin number. Results are cached per connectivity.
#[derive(Debug)]
pub struct InterfaceSpecialisation {
    pub interface_type: InterfaceTypeId,
    pub name: String,
    pub pin_indices: BTreeMap<InterfacePinId, Vec<usize>>,
    cache: Mutex<HashMap<ConnectivityId, Interface>>,
}

impl InterfaceSpecialisation {
    pub fn new(
        interface_type: InterfaceTypeId,
        name: impl Into<String>,
        pin_indices: BTreeMap<InterfacePinId, Vec<usize>>,
    ) -> Self {
        Self {
            interface_type,
            name: name.into(),
            pin_indices,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn to_interface(
        &self,
        catalog: &Catalog,
        connectivity: &Connectivity,
        specialisable: &Interface,
    ) -> Result<Interface> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(interface) = cache.get(&connectivity.id) {
            return Ok(interface.clone());
        }

        let interface_type = catalog.interface_type(self.interface_type)?;
        let mut pins: Vec<&Pin> = specialisable
            .assigned_pins()
            .map(|id| {
                connectivity.pin(id).ok_or_else(|| CatalogError::UnknownPin {
                    connectivity: connectivity.name.clone(),
                    pin: id.to_string(),
                })
            })
            .collect::<Result<_>>()?;
        pins.sort_by(|a, b| natural_cmp(&a.number, &b.number));

        let mut pin_assignments = Vec::with_capacity(self.pin_indices.len());
        for (interface_pin, indices) in &self.pin_indices {
            let picked = indices
                .iter()
                .map(|&index| {
                    index
                        .checked_sub(1)
                        .and_then(|i| pins.get(i))
                        .map(|pin| pin.id)
                        .ok_or_else(|| CatalogError::SpecialisationIndex {
                            pin: interface_pin.to_string(),
                            index,
                            available: pins.len(),
                            connectivity: connectivity.id,
                        })
                })
                .collect::<Result<Vec<_>>>()?;
            pin_assignments.push(PinAssignment::new(*interface_pin, picked));
        }

        let interface = Interface {
            id: Some(InterfaceId::new_random()),
            interface_type: interface_type.id,
            name: self.name.clone(),
            function: interface_type.function.clone(),
            is_required: interface_type.can_be_required,
            pin_assignments,
            parent_interface_type: None,
        };
        cache.insert(connectivity.id, interface.clone());
        Ok(interface)
    }
}
