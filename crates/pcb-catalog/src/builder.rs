use crate::catalog::Catalog;
use crate::error::{CatalogError, Result};
use crate::ids::{ConnectivityId, FamilyId, InterfaceId, InterfacePinId, InterfaceTypeId, PinId};
use crate::interface::{Connectivity, Interface, PinAssignment};
use crate::interface_pin::BusSharing;
use crate::pin::{Pin, PinType};
use crate::snapshot::{CatalogSnapshot, FamilyRecord, InterfacePinRecord, InterfaceTypeRecord};

/// Assembles a [`CatalogSnapshot`] by name.
///
/// Ids are derived from names, so an interface pin is addressed by its type
/// name and reference, and a physical pin by its connectivity and pin name.
/// The first error is kept and reported by [`CatalogBuilder::snapshot`].
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    snapshot: CatalogSnapshot,
    error: Option<CatalogError>,
}

pub fn interface_pin_id(interface_type: &str, reference: &str) -> InterfacePinId {
    InterfacePinId::from_key(&format!("{interface_type}/{reference}"))
}

pub fn pin_id(connectivity: &str, pin: &str) -> PinId {
    PinId::from_key(&format!("{connectivity}/{pin}"))
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn family(mut self, name: &str, label: &str) -> Self {
        self.snapshot.families.push(FamilyRecord {
            id: FamilyId::from_key(name),
            name: name.to_owned(),
            label: label.to_owned(),
        });
        self
    }

    /// Adds an interface type. Without a family, the type forms its own.
    pub fn interface_type(mut self, name: &str, label: &str, family: Option<&str>) -> Self {
        self.snapshot.interface_types.push(InterfaceTypeRecord {
            id: InterfaceTypeId::from_key(name),
            name: name.to_owned(),
            label: label.to_owned(),
            family: family.map(FamilyId::from_key),
            function: label.to_lowercase(),
            can_be_required: false,
            can_be_specialised: false,
            parents: Vec::new(),
            compatible_types: Vec::new(),
        });
        self
    }

    /// Marks a type as the requesting side of its buses.
    pub fn requesting(self, name: &str) -> Self {
        self.with_type(name, |ty| ty.can_be_required = true)
    }

    pub fn specialisable(self, name: &str) -> Self {
        self.with_type(name, |ty| ty.can_be_specialised = true)
    }

    pub fn type_function(self, name: &str, function: &str) -> Self {
        self.with_type(name, |ty| ty.function = function.to_owned())
    }

    pub fn child_type(self, parent: &str, child: &str) -> Self {
        let parent = InterfaceTypeId::from_key(parent);
        self.with_type(child, |ty| ty.parents.push(parent))
    }

    pub fn compatible_types(self, a: &str, b: &str) -> Self {
        let b = InterfaceTypeId::from_key(b);
        self.with_type(a, |ty| ty.compatible_types.push(b))
    }

    pub fn interface_pin(
        mut self,
        interface_type: &str,
        reference: &str,
        pin_type: PinType,
        sharing: BusSharing,
    ) -> Self {
        self.snapshot.interface_pins.push(InterfacePinRecord {
            id: interface_pin_id(interface_type, reference),
            interface_type: InterfaceTypeId::from_key(interface_type),
            reference: reference.to_owned(),
            pin_type,
            is_required: true,
            sharing,
            multiple_use: false,
            compatible_pins: Vec::new(),
            parent_pins: Vec::new(),
        });
        self
    }

    /// Declares two interface pins, each given as `(type, reference)`,
    /// compatible.
    pub fn compatible_pins(self, a: (&str, &str), b: (&str, &str)) -> Self {
        let other = interface_pin_id(b.0, b.1);
        self.with_interface_pin(a, |pin| pin.compatible_pins.push(other))
    }

    pub fn child_pin(self, parent: (&str, &str), child: (&str, &str)) -> Self {
        let parent = interface_pin_id(parent.0, parent.1);
        self.with_interface_pin(child, |pin| pin.parent_pins.push(parent))
    }

    pub fn connectivity(mut self, name: &str) -> Self {
        self.snapshot.connectivities.push(Connectivity {
            id: ConnectivityId::from_key(name),
            name: name.to_owned(),
            pins: Vec::new(),
            interfaces: Vec::new(),
        });
        self
    }

    pub fn pin(self, connectivity: &str, name: &str, number: &str, pin_type: PinType) -> Self {
        let pin = Pin::new(pin_id(connectivity, name), pin_type, name, number);
        self.with_connectivity(connectivity, |c| {
            c.pins.push(pin);
            Ok(())
        })
    }

    pub fn voltage_reference(self, connectivity: &str, pin: &str, reference: &str) -> Self {
        let reference = pin_id(connectivity, reference);
        self.with_pin(connectivity, pin, |p| p.voltage_reference_pin = Some(reference))
    }

    pub fn gnd_reference(self, connectivity: &str, pin: &str, reference: &str) -> Self {
        let reference = pin_id(connectivity, reference);
        self.with_pin(connectivity, pin, |p| p.gnd_reference_pin = Some(reference))
    }

    /// Declares an interface on a connectivity. `assignments` maps interface
    /// pin references to physical pin names.
    pub fn interface(
        self,
        connectivity: &str,
        name: &str,
        interface_type: &str,
        assignments: &[(&str, &[&str])],
    ) -> Self {
        let type_id = InterfaceTypeId::from_key(interface_type);
        let pin_assignments = assignments
            .iter()
            .map(|(reference, pins)| {
                PinAssignment::new(
                    interface_pin_id(interface_type, reference),
                    pins.iter().map(|pin| pin_id(connectivity, pin)).collect(),
                )
            })
            .collect();
        let interface = Interface {
            id: Some(InterfaceId::from_key(&format!(
                "{connectivity}/{name}/{interface_type}"
            ))),
            interface_type: type_id,
            name: name.to_owned(),
            function: String::new(),
            is_required: false,
            pin_assignments,
            parent_interface_type: None,
        };
        self.with_connectivity(connectivity, |c| {
            c.interfaces.push(interface);
            Ok(())
        })
    }

    pub fn snapshot(self) -> Result<CatalogSnapshot> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.snapshot),
        }
    }

    pub fn build(self) -> Result<Catalog> {
        Catalog::from_snapshot(self.snapshot()?)
    }

    fn fail(&mut self, err: CatalogError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn with_type(mut self, name: &str, f: impl FnOnce(&mut InterfaceTypeRecord)) -> Self {
        let id = InterfaceTypeId::from_key(name);
        match self.snapshot.interface_types.iter_mut().find(|t| t.id == id) {
            Some(ty) => f(ty),
            None => self.fail(CatalogError::UnknownInterfaceType(name.to_owned())),
        }
        self
    }

    fn with_interface_pin(
        mut self,
        (interface_type, reference): (&str, &str),
        f: impl FnOnce(&mut InterfacePinRecord),
    ) -> Self {
        let id = interface_pin_id(interface_type, reference);
        match self.snapshot.interface_pins.iter_mut().find(|p| p.id == id) {
            Some(pin) => f(pin),
            None => self.fail(CatalogError::UnknownPinReference {
                interface_type: interface_type.to_owned(),
                reference: reference.to_owned(),
            }),
        }
        self
    }

    fn with_connectivity(
        mut self,
        name: &str,
        f: impl FnOnce(&mut Connectivity) -> Result<()>,
    ) -> Self {
        let id = ConnectivityId::from_key(name);
        let result = match self.snapshot.connectivities.iter_mut().find(|c| c.id == id) {
            Some(connectivity) => f(connectivity),
            None => Err(CatalogError::UnknownConnectivity(name.to_owned())),
        };
        if let Err(err) = result {
            self.fail(err);
        }
        self
    }

    fn with_pin(self, connectivity: &str, pin: &str, f: impl FnOnce(&mut Pin)) -> Self {
        let id = pin_id(connectivity, pin);
        self.with_connectivity(connectivity, |c| {
            let name = c.name.clone();
            let target = c.pins.iter_mut().find(|p| p.id == id).ok_or_else(|| {
                CatalogError::UnknownPin {
                    connectivity: name,
                    pin: pin.to_owned(),
                }
            })?;
            f(target);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::ids::FamilyKey;
    use crate::specialisation::InterfaceSpecialisation;

    fn uart_catalog() -> Catalog {
        CatalogBuilder::new()
            .family("UART", "UART")
            .interface_type("UART Host", "UART", Some("UART"))
            .requesting("UART Host")
            .interface_type("UART Device", "UART", Some("UART"))
            .compatible_types("UART Host", "UART Device")
            .interface_pin("UART Host", "TX", PinType::Digital, BusSharing::Exclusive)
            .interface_pin("UART Host", "RX", PinType::Digital, BusSharing::Exclusive)
            .interface_pin("UART Device", "TX", PinType::Digital, BusSharing::Exclusive)
            .interface_pin("UART Device", "RX", PinType::Digital, BusSharing::Exclusive)
            .compatible_pins(("UART Host", "TX"), ("UART Device", "RX"))
            .compatible_pins(("UART Host", "RX"), ("UART Device", "TX"))
            .interface_type("GPIO", "GPIO", None)
            .requesting("GPIO")
            .specialisable("GPIO")
            .interface_pin("GPIO", "IO", PinType::Digital, BusSharing::Exclusive)
            .interface_type("Port", "PORT", None)
            .interface_pin("Port", "P", PinType::Digital, BusSharing::Exclusive)
            .connectivity("MCU")
            .pin("MCU", "PA10", "10", PinType::Digital)
            .pin("MCU", "PA9", "9", PinType::Digital)
            .pin("MCU", "PA2", "2", PinType::Digital)
            .pin("MCU", "VDD", "1", PinType::Power)
            .voltage_reference("MCU", "PA9", "VDD")
            .interface("MCU", "UART1", "UART Host", &[("TX", &["PA9"]), ("RX", &["PA10"])])
            .interface("MCU", "PORTA", "Port", &[("P", &["PA10", "PA9", "PA2"])])
            .build()
            .unwrap()
    }

    #[test]
    fn compatibility_is_symmetric() {
        let catalog = uart_catalog();
        let host_tx = catalog.interface_pin(interface_pin_id("UART Host", "TX")).unwrap();
        let device_rx = catalog.interface_pin(interface_pin_id("UART Device", "RX")).unwrap();
        assert!(host_tx.is_compatible_with(device_rx.id));
        assert!(device_rx.is_compatible_with(host_tx.id));

        let host = catalog.interface_type_by_name("UART Host").unwrap().id;
        let device = catalog.interface_type_by_name("UART Device").unwrap().id;
        assert!(catalog.is_compatible(device, host).unwrap());
    }

    #[test]
    fn untyped_families_are_implicit() {
        let catalog = uart_catalog();
        let gpio = catalog.interface_type_by_name("GPIO").unwrap();
        assert_eq!(gpio.family, FamilyKey::Implicit(gpio.id));
        let family = catalog.family_of(gpio.id).unwrap();
        assert!(family.is_implicit());
        assert_eq!(family.label, "GPIO");
        assert_eq!(family.interface_types, vec![gpio.id]);
    }

    #[test]
    fn logical_networks_pair_requesting_and_receiving_pins() {
        let catalog = uart_catalog();
        let family = FamilyKey::Declared(FamilyId::from_key("UART"));
        let names: Vec<&str> = catalog
            .logical_networks(family)
            .unwrap()
            .iter()
            .map(|n| n.name())
            .collect();
        assert_eq!(names, vec!["RX -> TX", "TX -> RX"]);

        let host_tx = interface_pin_id("UART Host", "TX");
        let device_rx = interface_pin_id("UART Device", "RX");
        let requesting = catalog.logical_network(family, host_tx, true).unwrap();
        let receiving = catalog.logical_network(family, device_rx, false).unwrap();
        assert_eq!(requesting, receiving);
        assert_eq!(requesting.pins().len(), 2);
    }

    #[test]
    fn logical_network_falls_back_to_either_side() {
        let catalog = uart_catalog();
        let family = FamilyKey::Declared(FamilyId::from_key("UART"));
        let host_tx = interface_pin_id("UART Host", "TX");
        let network = catalog.logical_network(family, host_tx, false).unwrap();
        assert_eq!(network.name(), "TX -> RX");

        let err = catalog
            .logical_network(family, interface_pin_id("GPIO", "IO"), true)
            .unwrap_err();
        assert!(matches!(err, CatalogError::NoLogicalNetwork { .. }));
        assert!(err.is_lookup());
    }

    #[test]
    fn pin_references_resolve() {
        let catalog = uart_catalog();
        let mcu = catalog.connectivity_by_name("MCU").unwrap();
        let pa9 = mcu.pin_by_name("PA9").unwrap();
        assert_eq!(pa9.voltage_reference_pin, Some(pin_id("MCU", "VDD")));
        assert_eq!(mcu.interfaces.len(), 2);
    }

    #[test]
    fn unknown_names_surface_at_build() {
        let err = CatalogBuilder::new()
            .interface_type("A", "A", None)
            .compatible_types("A", "B")
            .build()
            .unwrap_err();
        assert!(matches!(err, CatalogError::UnknownInterfaceType(_)));

        let err = CatalogBuilder::new()
            .connectivity("X")
            .voltage_reference("X", "P1", "VDD")
            .build()
            .unwrap_err();
        assert!(matches!(err, CatalogError::UnknownPin { .. }));
    }

    #[test]
    fn snapshots_survive_json() {
        let snapshot = CatalogBuilder::new()
            .interface_type("GPIO", "GPIO", None)
            .interface_pin("GPIO", "IO", PinType::Digital, BusSharing::Shared)
            .connectivity("LED")
            .pin("LED", "A", "1", PinType::Digital)
            .interface("LED", "IN", "GPIO", &[("IO", &["A"])])
            .snapshot()
            .unwrap();
        let json = snapshot.to_json_string().unwrap();
        let parsed = CatalogSnapshot::from_json_str(&json).unwrap();
        assert_eq!(parsed, snapshot);
        Catalog::from_snapshot(parsed).unwrap();
    }

    #[test]
    fn specialisation_picks_pins_by_sorted_number() {
        let catalog = uart_catalog();
        let mcu = catalog.connectivity_by_name("MCU").unwrap();
        let port = mcu.interfaces.iter().find(|i| i.name == "PORTA").unwrap();
        let gpio = catalog.interface_type_by_name("GPIO").unwrap();
        let io = interface_pin_id("GPIO", "IO");

        let specialisation =
            InterfaceSpecialisation::new(gpio.id, "LED", BTreeMap::from([(io, vec![2])]));
        let interface = specialisation.to_interface(&catalog, mcu, port).unwrap();
        assert_eq!(interface.name, "LED");
        assert!(interface.is_required);
        assert_eq!(interface.pin_assignments.len(), 1);
        assert_eq!(interface.pin_assignments[0].pins, vec![pin_id("MCU", "PA9")]);

        let again = specialisation.to_interface(&catalog, mcu, port).unwrap();
        assert_eq!(again.id, interface.id);

        for index in [0, 4] {
            let bad = InterfaceSpecialisation::new(
                gpio.id,
                "LED",
                BTreeMap::from([(io, vec![index])]),
            );
            let err = bad.to_interface(&catalog, mcu, port).unwrap_err();
            assert!(matches!(err, CatalogError::SpecialisationIndex { .. }));
        }
    }
}
