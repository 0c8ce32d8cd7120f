use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::graphmap::UnGraphMap;

use crate::error::{CatalogError, Result};
use crate::family::{InterfaceFamily, LogicalNetwork};
use crate::graph::connected_components;
use crate::ids::{ConnectivityId, FamilyKey, InterfacePinId, InterfaceTypeId};
use crate::interface::Connectivity;
use crate::interface_pin::InterfacePin;
use crate::interface_type::InterfaceType;
use crate::snapshot::CatalogSnapshot;

/// Linked, read-only view of a [`CatalogSnapshot`].
#[derive(Debug)]
pub struct Catalog {
    families: BTreeMap<FamilyKey, InterfaceFamily>,
    interface_types: BTreeMap<InterfaceTypeId, InterfaceType>,
    interface_pins: BTreeMap<InterfacePinId, InterfacePin>,
    connectivities: BTreeMap<ConnectivityId, Connectivity>,
    type_names: HashMap<String, InterfaceTypeId>,
    connectivity_names: HashMap<String, ConnectivityId>,
    do_not_connect: InterfaceFamily,
}

impl Catalog {
    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Result<Self> {
        let mut families = BTreeMap::new();
        for record in snapshot.families {
            let key = FamilyKey::Declared(record.id);
            if families.contains_key(&key) {
                return Err(CatalogError::Duplicate {
                    kind: "family",
                    name: record.name,
                });
            }
            families.insert(key, InterfaceFamily::new(key, record.name, record.label));
        }

        let mut interface_pins = BTreeMap::new();
        for record in &snapshot.interface_pins {
            let pin = InterfacePin {
                id: record.id,
                interface_type: record.interface_type,
                reference: record.reference.clone(),
                pin_type: record.pin_type,
                is_required: record.is_required,
                sharing: record.sharing,
                multiple_use: record.multiple_use,
                compatible_pins: record.compatible_pins.iter().copied().collect(),
                parent_pins: record.parent_pins.iter().copied().collect(),
                child_pins: BTreeSet::new(),
            };
            if interface_pins.insert(record.id, pin).is_some() {
                return Err(CatalogError::Duplicate {
                    kind: "interface pin",
                    name: record.reference.clone(),
                });
            }
        }
        link_pins(&mut interface_pins)?;

        let mut interface_types = BTreeMap::new();
        let mut type_names = HashMap::new();
        for record in snapshot.interface_types {
            let family = match record.family {
                Some(id) => {
                    let key = FamilyKey::Declared(id);
                    let family = families
                        .get_mut(&key)
                        .ok_or_else(|| CatalogError::UnknownFamily(id.to_string()))?;
                    family.interface_types.push(record.id);
                    key
                }
                None => {
                    let key = FamilyKey::Implicit(record.id);
                    let mut family = InterfaceFamily::new(key, &record.name, &record.label);
                    family.interface_types.push(record.id);
                    families.insert(key, family);
                    key
                }
            };
            let pins = snapshot
                .interface_pins
                .iter()
                .filter(|p| p.interface_type == record.id)
                .map(|p| p.id)
                .collect();
            if type_names.insert(record.name.clone(), record.id).is_some() {
                return Err(CatalogError::Duplicate {
                    kind: "interface type",
                    name: record.name,
                });
            }
            interface_types.insert(
                record.id,
                InterfaceType {
                    id: record.id,
                    name: record.name,
                    label: record.label,
                    family,
                    function: record.function,
                    can_be_required: record.can_be_required,
                    can_be_specialised: record.can_be_specialised,
                    pins,
                    parents: record.parents,
                    children: Vec::new(),
                    compatible_types: record.compatible_types,
                },
            );
        }
        link_types(&mut interface_types)?;

        for pin in interface_pins.values() {
            if !interface_types.contains_key(&pin.interface_type) {
                return Err(CatalogError::UnknownInterfaceType(
                    pin.interface_type.to_string(),
                ));
            }
        }

        let mut connectivities = BTreeMap::new();
        let mut connectivity_names = HashMap::new();
        for connectivity in snapshot.connectivities {
            for interface in &connectivity.interfaces {
                if !interface_types.contains_key(&interface.interface_type) {
                    return Err(CatalogError::UnknownInterfaceType(
                        interface.interface_type.to_string(),
                    ));
                }
                for assignment in &interface.pin_assignments {
                    if !interface_pins.contains_key(&assignment.interface_pin) {
                        return Err(CatalogError::UnknownInterfacePin(
                            assignment.interface_pin.to_string(),
                        ));
                    }
                    if let Some(pin) = assignment.pins.iter().find(|p| connectivity.pin(**p).is_none()) {
                        return Err(CatalogError::UnknownPin {
                            connectivity: connectivity.name.clone(),
                            pin: pin.to_string(),
                        });
                    }
                }
            }
            if connectivities.contains_key(&connectivity.id) {
                return Err(CatalogError::Duplicate {
                    kind: "connectivity",
                    name: connectivity.name,
                });
            }
            connectivity_names.insert(connectivity.name.clone(), connectivity.id);
            connectivities.insert(connectivity.id, connectivity);
        }

        log::debug!(
            "Linked catalog: {} families, {} interface types, {} interface pins, {} connectivities",
            families.len(),
            interface_types.len(),
            interface_pins.len(),
            connectivities.len()
        );

        Ok(Self {
            families,
            interface_types,
            interface_pins,
            connectivities,
            type_names,
            connectivity_names,
            do_not_connect: InterfaceFamily::do_not_connect(),
        })
    }

    pub fn interface_type(&self, id: InterfaceTypeId) -> Result<&InterfaceType> {
        self.interface_types
            .get(&id)
            .ok_or_else(|| CatalogError::UnknownInterfaceType(id.to_string()))
    }

    pub fn interface_type_by_name(&self, name: &str) -> Result<&InterfaceType> {
        self.type_names
            .get(name)
            .and_then(|id| self.interface_types.get(id))
            .ok_or_else(|| CatalogError::UnknownInterfaceType(name.to_owned()))
    }

    pub fn interface_types(&self) -> impl Iterator<Item = &InterfaceType> {
        self.interface_types.values()
    }

    pub fn interface_pin(&self, id: InterfacePinId) -> Result<&InterfacePin> {
        self.interface_pins
            .get(&id)
            .ok_or_else(|| CatalogError::UnknownInterfacePin(id.to_string()))
    }

    pub fn interface_pin_by_reference(
        &self,
        interface_type: InterfaceTypeId,
        reference: &str,
    ) -> Result<&InterfacePin> {
        let ty = self.interface_type(interface_type)?;
        ty.pins
            .iter()
            .filter_map(|id| self.interface_pins.get(id))
            .find(|pin| pin.reference == reference)
            .ok_or_else(|| CatalogError::UnknownPinReference {
                interface_type: ty.name.clone(),
                reference: reference.to_owned(),
            })
    }

    /// The pin of `child_type` that specialises `pin`.
    pub fn child_pin(
        &self,
        pin: InterfacePinId,
        child_type: InterfaceTypeId,
    ) -> Result<&InterfacePin> {
        let parent = self.interface_pin(pin)?;
        parent
            .child_pins
            .iter()
            .filter_map(|id| self.interface_pins.get(id))
            .find(|child| child.interface_type == child_type)
            .ok_or_else(|| CatalogError::MissingChildPin {
                pin: parent.reference.clone(),
                child_type,
            })
    }

    pub fn family(&self, key: FamilyKey) -> Result<&InterfaceFamily> {
        if key == FamilyKey::DoNotConnect {
            return Ok(&self.do_not_connect);
        }
        self.families
            .get(&key)
            .ok_or_else(|| CatalogError::UnknownFamily(key.to_string()))
    }

    pub fn family_of(&self, interface_type: InterfaceTypeId) -> Result<&InterfaceFamily> {
        self.family(self.interface_type(interface_type)?.family)
    }

    pub fn families(&self) -> impl Iterator<Item = &InterfaceFamily> {
        self.families.values()
    }

    pub fn do_not_connect_family(&self) -> &InterfaceFamily {
        &self.do_not_connect
    }

    pub fn connectivity(&self, id: ConnectivityId) -> Result<&Connectivity> {
        self.connectivities
            .get(&id)
            .ok_or_else(|| CatalogError::UnknownConnectivity(id.to_string()))
    }

    pub fn connectivity_by_name(&self, name: &str) -> Result<&Connectivity> {
        self.connectivity_names
            .get(name)
            .and_then(|id| self.connectivities.get(id))
            .ok_or_else(|| CatalogError::UnknownConnectivity(name.to_owned()))
    }

    pub fn is_compatible(&self, a: InterfaceTypeId, b: InterfaceTypeId) -> Result<bool> {
        Ok(self.interface_type(a)?.is_compatible(self.interface_type(b)?))
    }

    /// Logical networks of a family, computed on first use.
    pub fn logical_networks(&self, family: FamilyKey) -> Result<&[LogicalNetwork]> {
        let family = self.family(family)?;
        family
            .networks
            .get_or_try_init(|| self.build_logical_networks(family))
            .map(Vec::as_slice)
    }

    /// The logical network holding `pin` on the requesting or receiving side.
    ///
    /// When no network has the pin on that side, a network containing the pin
    /// on either side is used, provided there is exactly one.
    pub fn logical_network(
        &self,
        family: FamilyKey,
        pin: InterfacePinId,
        is_requesting: bool,
    ) -> Result<&LogicalNetwork> {
        let networks = self.logical_networks(family)?;
        if let Some(network) = networks.iter().find(|n| n.has_node(pin, is_requesting)) {
            return Ok(network);
        }

        let candidates: Vec<&LogicalNetwork> =
            networks.iter().filter(|n| n.contains(pin)).collect();
        match candidates.as_slice() {
            [network] => {
                log::warn!(
                    "Interface pin {} is not a {} pin of any logical network, using {}",
                    self.pin_label(pin),
                    direction(is_requesting),
                    network
                );
                Ok(network)
            }
            [] => Err(CatalogError::NoLogicalNetwork {
                family,
                pin: self.pin_label(pin),
                direction: direction(is_requesting),
            }),
            _ => Err(CatalogError::AmbiguousLogicalNetwork {
                family,
                pin,
                count: candidates.len(),
            }),
        }
    }

    fn pin_label(&self, pin: InterfacePinId) -> String {
        self.interface_pins
            .get(&pin)
            .map(|p| p.reference.clone())
            .unwrap_or_else(|| pin.to_string())
    }

    fn build_logical_networks(&self, family: &InterfaceFamily) -> Result<Vec<LogicalNetwork>> {
        let mut graph: UnGraphMap<(InterfacePinId, bool), ()> = UnGraphMap::new();
        for type_id in &family.interface_types {
            let ty = self.interface_type(*type_id)?;
            if !ty.can_be_required {
                continue;
            }
            for pin_id in &ty.pins {
                let pin = self.interface_pin(*pin_id)?;
                for compatible in &pin.compatible_pins {
                    graph.add_edge((pin.id, true), (*compatible, false), ());
                }
            }
        }

        let mut networks = Vec::new();
        for nodes in connected_components(&graph) {
            let mut requesting = Vec::new();
            let mut receiving = Vec::new();
            for (pin_id, is_requesting) in nodes {
                let reference = self.interface_pin(pin_id)?.reference.as_str();
                if is_requesting {
                    requesting.push((pin_id, reference));
                } else {
                    receiving.push((pin_id, reference));
                }
            }
            networks.push(LogicalNetwork::new(requesting, receiving));
        }
        networks.sort();

        log::debug!(
            "Computed {} logical networks for family {}",
            networks.len(),
            family.name
        );
        Ok(networks)
    }
}

fn direction(is_requesting: bool) -> &'static str {
    if is_requesting { "requesting" } else { "receiving" }
}

/// Makes pin compatibility symmetric and fills child pins from parent pins.
fn link_pins(pins: &mut BTreeMap<InterfacePinId, InterfacePin>) -> Result<()> {
    let mut compatible = Vec::new();
    let mut children = Vec::new();
    for pin in pins.values() {
        compatible.extend(pin.compatible_pins.iter().map(|other| (*other, pin.id)));
        children.extend(pin.parent_pins.iter().map(|parent| (*parent, pin.id)));
    }
    for (pin, other) in compatible {
        pins.get_mut(&pin)
            .ok_or_else(|| CatalogError::UnknownInterfacePin(pin.to_string()))?
            .compatible_pins
            .insert(other);
    }
    for (parent, child) in children {
        pins.get_mut(&parent)
            .ok_or_else(|| CatalogError::UnknownInterfacePin(parent.to_string()))?
            .child_pins
            .insert(child);
    }
    Ok(())
}

/// Fills child types and checks that referenced types exist.
fn link_types(types: &mut BTreeMap<InterfaceTypeId, InterfaceType>) -> Result<()> {
    let mut children = Vec::new();
    for ty in types.values() {
        for id in ty.compatible_types.iter() {
            if !types.contains_key(id) {
                return Err(CatalogError::UnknownInterfaceType(id.to_string()));
            }
        }
        children.extend(ty.parents.iter().map(|parent| (*parent, ty.id)));
    }
    for (parent, child) in children {
        types
            .get_mut(&parent)
            .ok_or_else(|| CatalogError::UnknownInterfaceType(parent.to_string()))?
            .children
            .push(child);
    }
    Ok(())
}
