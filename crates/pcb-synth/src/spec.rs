use std::collections::{BTreeMap, BTreeSet};

use pcb_catalog::{InterfacePinId, PinId};

use crate::ancillary::AncillaryAppliesTo;
use crate::bus::Bus;
use crate::component::{Circuit, ComponentId, InterfaceRef};
use crate::config::SynthConfig;
use crate::error::{Result, SynthError};
use crate::netlist::SmartNetlist;

/// A fully described circuit ready for netlist synthesis: the component tree,
/// its boards and the warnings collected along the way.
#[derive(Debug, Clone)]
pub struct Spec {
    circuit: Circuit,
    boards: Vec<ComponentId>,
    main_board_reference: String,
    warnings: BTreeSet<String>,
    config: SynthConfig,
}

impl Spec {
    pub fn new(circuit: Circuit, config: SynthConfig) -> Self {
        Self {
            circuit,
            boards: Vec::new(),
            main_board_reference: config.main_board.clone(),
            warnings: BTreeSet::new(),
            config,
        }
    }

    /// Declares boards by reference. Boards are children of the root.
    pub fn with_boards(mut self, references: &[&str]) -> Result<Self> {
        for reference in references {
            let id = self.circuit.find(reference)?;
            if self.circuit.node(id)?.parent() != Some(self.circuit.root()) {
                return Err(SynthError::InvalidBoard((*reference).to_owned()));
            }
            if !self.boards.contains(&id) {
                self.boards.push(id);
            }
        }
        Ok(self)
    }

    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    pub fn circuit_mut(&mut self) -> &mut Circuit {
        &mut self.circuit
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    pub fn boards(&self) -> &[ComponentId] {
        &self.boards
    }

    pub fn main_board_reference(&self) -> &str {
        &self.main_board_reference
    }

    pub fn main_board(&self) -> Option<ComponentId> {
        self.boards
            .iter()
            .copied()
            .find(|b| self.circuit.reference(*b) == self.main_board_reference)
    }

    pub fn is_board(&self, id: ComponentId) -> bool {
        self.boards.contains(&id)
    }

    /// The board a component sits on, if boards are declared.
    pub fn board(&self, component: ComponentId) -> Option<ComponentId> {
        self.circuit
            .iterate_ancestors(component, true)
            .into_iter()
            .find(|id| self.is_board(*id))
    }

    /// Reference of a board, with `None` meaning the main board.
    pub fn board_reference(&self, board: Option<ComponentId>) -> &str {
        match board {
            Some(id) => self.circuit.reference(id),
            None => &self.main_board_reference,
        }
    }

    pub fn warnings(&self) -> &BTreeSet<String> {
        &self.warnings
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        log::warn!("{warning}");
        self.warnings.insert(warning);
    }

    /// Ancillary parts attached to `bus`, optionally only those serving
    /// `interface_pin`.
    pub fn bus_ancillary_components(
        &self,
        bus: &Bus,
        interface_pin: Option<InterfacePinId>,
    ) -> Result<Vec<ComponentId>> {
        let mut out = Vec::new();
        for id in self.circuit.atomic_components(self.circuit.root())? {
            let Some(ancillary) = &self.circuit.component(id)?.ancillary else {
                continue;
            };
            if ancillary.applies_to() == AncillaryAppliesTo::Bus
                && ancillary.matches(interface_pin, None, Some(bus), None)?
            {
                out.push(id);
            }
        }
        Ok(out)
    }

    /// Interface ancillaries of `parent`, optionally narrowed to one
    /// interface and one interface pin.
    pub fn interface_ancillary_components(
        &self,
        parent: ComponentId,
        interface: Option<InterfaceRef>,
        interface_pin: Option<InterfacePinId>,
    ) -> Result<Vec<ComponentId>> {
        let mut out = Vec::new();
        for id in self.circuit.atomic_components(self.circuit.root())? {
            let Some(ancillary) = &self.circuit.component(id)?.ancillary else {
                continue;
            };
            if ancillary.applies_to() != AncillaryAppliesTo::Interface
                || ancillary.parent() != Some(parent)
            {
                continue;
            }
            if ancillary.matches(interface_pin, None, None, interface.or(ancillary.interface()))? {
                out.push(id);
            }
        }
        Ok(out)
    }

    /// Pin ancillaries of `parent` attached to `pin`.
    pub fn pin_ancillary_components(
        &self,
        parent: ComponentId,
        pin: PinId,
    ) -> Result<Vec<ComponentId>> {
        let mut out = Vec::new();
        for id in self.circuit.atomic_components(self.circuit.root())? {
            let Some(ancillary) = &self.circuit.component(id)?.ancillary else {
                continue;
            };
            if ancillary.applies_to() == AncillaryAppliesTo::Pins
                && ancillary.parent() == Some(parent)
                && ancillary.matches(None, Some(pin), None, None)?
            {
                out.push(id);
            }
        }
        Ok(out)
    }

    pub fn flattened_references(&self) -> Result<BTreeMap<String, String>> {
        self.circuit.flattened_references(self.circuit.root())
    }

    pub fn netlist(&mut self) -> Result<SmartNetlist> {
        SmartNetlist::from_spec(self)
    }
}
