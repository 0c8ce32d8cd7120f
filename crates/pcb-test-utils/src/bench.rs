use pcb_catalog::{ConnectivityId, InterfaceTypeId, PinId, pin_id};
use pcb_synth::{
    Ancillary, BusFragment, Circuit, ComponentId, ComponentPin, FragmentId, InterfaceRef, Spec,
    SynthConfig,
};
use uuid::Uuid;

use crate::catalog::lab_catalog;

/// A circuit under construction against the lab catalog. Every helper
/// panics on error.
pub struct Bench {
    pub circuit: Circuit,
}

impl Default for Bench {
    fn default() -> Self {
        Self::new()
    }
}

impl Bench {
    pub fn new() -> Self {
        Self {
            circuit: Circuit::new(lab_catalog()),
        }
    }

    pub fn root(&self) -> ComponentId {
        self.circuit.root()
    }

    pub fn interface_type(&self, name: &str) -> InterfaceTypeId {
        self.circuit
            .catalog()
            .interface_type_by_name(name)
            .unwrap_or_else(|e| panic!("{e}"))
            .id
    }

    pub fn connectivity(&self, name: &str) -> ConnectivityId {
        self.circuit
            .catalog()
            .connectivity_by_name(name)
            .unwrap_or_else(|e| panic!("{e}"))
            .id
    }

    /// Adds a part of `connectivity` below `parent` (the root when `None`).
    pub fn part(
        &mut self,
        parent: Option<ComponentId>,
        reference: &str,
        function: &str,
        connectivity: &str,
    ) -> ComponentId {
        let parent = parent.unwrap_or(self.circuit.root());
        let connectivity = self.connectivity(connectivity);
        self.circuit
            .add_part(parent, reference, function, connectivity)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    /// Adds an ancillary part of `connectivity` at the root.
    pub fn ancillary(
        &mut self,
        reference: &str,
        function: &str,
        connectivity: &str,
        ancillary: Ancillary,
    ) -> ComponentId {
        let root = self.circuit.root();
        let connectivity = self.connectivity(connectivity);
        self.circuit
            .add_ancillary(root, reference, function, connectivity, ancillary)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn board(&mut self, reference: &str) -> ComponentId {
        let root = self.circuit.root();
        self.circuit
            .add_subcircuit(root, reference, "board", None)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    /// Adds a persisted fragment between two named interfaces; types are
    /// inferred from the names.
    pub fn connect(
        &mut self,
        from: ComponentId,
        from_interface: &str,
        to: ComponentId,
        to_interface: &str,
        function: &str,
    ) -> FragmentId {
        let key = format!(
            "{}.{from_interface}->{}.{to_interface}",
            self.circuit.reference(from),
            self.circuit.reference(to)
        );
        let fragment = BusFragment::builder(from, to, function)
            .persisted(Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()))
            .from_interface(from_interface)
            .to_interface(to_interface)
            .build()
            .unwrap_or_else(|e| panic!("{e}"));
        self.circuit
            .add_bus_requirement(fragment)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn interface(&self, component: ComponentId, name: &str, type_name: &str) -> InterfaceRef {
        self.circuit
            .get_interface(component, name, self.interface_type(type_name))
            .unwrap_or_else(|e| panic!("{e}"))
    }

    /// The pin called `name` on `component`.
    pub fn pin(&self, component: ComponentId, name: &str) -> ComponentPin {
        self.circuit
            .get_pin_by_name(component, name)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    /// Catalog id of a pin of `connectivity`.
    pub fn pin_id(&self, connectivity: &str, name: &str) -> PinId {
        pin_id(connectivity, name)
    }

    pub fn spec(self) -> Spec {
        Spec::new(self.circuit, SynthConfig::default())
    }

    pub fn spec_with(self, config: SynthConfig) -> Spec {
        Spec::new(self.circuit, config)
    }
}
