use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use pcb_catalog::{InterfaceAdapter, InterfacePinId, InterfaceTypeId, PinAssignment};
use uuid::Uuid;

use crate::component::{Circuit, ComponentId, ComponentPin, Connections, InterfaceRef, Node, PinUse};
use crate::error::{Result, SynthError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    From,
    To,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::From => f.write_str("from"),
            Side::To => f.write_str("to"),
        }
    }
}

/// Where a fragment came from. Only persisted fragments have their pin
/// connections deduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentSource {
    Persisted(Uuid),
    Synthesized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferReason {
    NotPersisted,
    UnknownInterfaceTypes,
    UnresolvedTarget,
    MissingInterfaceName,
    MissingInterface,
}

impl fmt::Display for DeferReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeferReason::NotPersisted => "fragment is not persisted",
            DeferReason::UnknownInterfaceTypes => "interface types are not known yet",
            DeferReason::UnresolvedTarget => "target filter has no single candidate connectivity",
            DeferReason::MissingInterfaceName => "interface names are not known yet",
            DeferReason::MissingInterface => "interface is not present on the component",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionDeduction {
    pub from_interface: InterfaceRef,
    pub to_interface: InterfaceRef,
    pub from_connections: Connections,
    pub to_connections: Connections,
}

#[derive(Debug, Clone)]
pub enum Deduction {
    Deferred(DeferReason),
    Resolved(ConnectionDeduction),
}

/// A directed requirement that an interface of `from` be wired to an
/// interface of `to`.
#[derive(Debug, Clone)]
pub struct BusFragment {
    pub source: FragmentSource,
    pub from: ComponentId,
    pub to: ComponentId,
    pub function: String,
    pub from_interface_type: Option<InterfaceTypeId>,
    pub to_interface_type: Option<InterfaceTypeId>,
    pub from_interface_name: Option<String>,
    pub to_interface_name: Option<String>,
    pub adapter: Option<InterfaceAdapter>,
    pub from_connections: Connections,
    pub to_connections: Connections,
}

pub struct BusFragmentBuilder {
    fragment: BusFragment,
}

impl BusFragmentBuilder {
    pub fn persisted(mut self, id: Uuid) -> Self {
        self.fragment.source = FragmentSource::Persisted(id);
        self
    }

    pub fn from_interface(mut self, name: &str) -> Self {
        self.fragment.from_interface_name = Some(name.to_owned());
        self
    }

    pub fn from_type(mut self, interface_type: InterfaceTypeId) -> Self {
        self.fragment.from_interface_type = Some(interface_type);
        self
    }

    pub fn to_interface(mut self, name: &str) -> Self {
        self.fragment.to_interface_name = Some(name.to_owned());
        self
    }

    pub fn to_type(mut self, interface_type: InterfaceTypeId) -> Self {
        self.fragment.to_interface_type = Some(interface_type);
        self
    }

    /// The given types are the original ones; the fragment takes the
    /// adapter's types.
    pub fn adapter(mut self, adapter: InterfaceAdapter) -> Self {
        self.fragment.adapter = Some(adapter);
        self
    }

    pub fn build(self) -> Result<BusFragment> {
        let mut fragment = self.fragment;
        if fragment.from_interface_type.is_none() && fragment.from_interface_name.is_none() {
            return Err(SynthError::InvalidFragment(
                "a bus fragment needs a from interface type or name".to_owned(),
            ));
        }
        if let Some(adapter) = fragment.adapter.as_mut() {
            adapter.original_from_type = adapter.original_from_type.or(fragment.from_interface_type);
            adapter.original_to_type = adapter.original_to_type.or(fragment.to_interface_type);
            fragment.from_interface_type = adapter.adapted_from_type.or(fragment.from_interface_type);
            fragment.to_interface_type = adapter.adapted_to_type.or(fragment.to_interface_type);
        }
        Ok(fragment)
    }
}

impl BusFragment {
    pub fn builder(from: ComponentId, to: ComponentId, function: &str) -> BusFragmentBuilder {
        BusFragmentBuilder {
            fragment: BusFragment {
                source: FragmentSource::Synthesized,
                from,
                to,
                function: function.to_owned(),
                from_interface_type: None,
                to_interface_type: None,
                from_interface_name: None,
                to_interface_name: None,
                adapter: None,
                from_connections: Connections::new(),
                to_connections: Connections::new(),
            },
        }
    }

    pub fn node(&self, side: Side) -> ComponentId {
        match side {
            Side::From => self.from,
            Side::To => self.to,
        }
    }

    pub fn interface_name(&self, side: Side) -> Option<&str> {
        match side {
            Side::From => self.from_interface_name.as_deref(),
            Side::To => self.to_interface_name.as_deref(),
        }
    }

    pub fn interface_type(&self, circuit: &Circuit, side: Side) -> Result<InterfaceTypeId> {
        match side {
            Side::From => self.from_interface_type(circuit),
            Side::To => self.to_interface_type(circuit),
        }
    }

    pub fn describe(&self, circuit: &Circuit) -> String {
        format!(
            "{}.{} -> {}.{}",
            circuit.reference(self.from),
            self.from_interface_name.as_deref().unwrap_or("?"),
            circuit.reference(self.to),
            self.to_interface_name.as_deref().unwrap_or("?"),
        )
    }

    /// The explicit from type, or the single requesting type among the from
    /// node's interfaces with the given name.
    pub fn from_interface_type(&self, circuit: &Circuit) -> Result<InterfaceTypeId> {
        if let Some(t) = self.from_interface_type {
            return Ok(t);
        }
        let name = self.required_name(circuit, Side::From)?;
        let catalog = circuit.catalog();
        let mut candidates = BTreeSet::new();
        for (candidate, interface_type) in circuit.interface_candidates(self.from)? {
            if candidate == name && catalog.interface_type(interface_type)?.can_be_required {
                candidates.insert(interface_type);
            }
        }
        self.single_type(circuit, Side::From, name, candidates)
    }

    /// The explicit to type, or the to node's interface with the given name;
    /// several candidates are narrowed to those compatible with the from type.
    pub fn to_interface_type(&self, circuit: &Circuit) -> Result<InterfaceTypeId> {
        if let Some(t) = self.to_interface_type {
            return Ok(t);
        }
        let name = self.required_name(circuit, Side::To)?;
        let candidates: BTreeSet<InterfaceTypeId> = circuit
            .interface_candidates(self.to)?
            .into_iter()
            .filter(|(candidate, _)| candidate == name)
            .map(|(_, t)| t)
            .collect();
        if candidates.len() == 1 {
            return self.single_type(circuit, Side::To, name, candidates);
        }
        let from_type = self.from_interface_type(circuit)?;
        let catalog = circuit.catalog();
        let mut compatible = BTreeSet::new();
        for candidate in candidates {
            if catalog.is_compatible(from_type, candidate)? {
                compatible.insert(candidate);
            }
        }
        self.single_type(circuit, Side::To, name, compatible)
    }

    fn required_name(&self, circuit: &Circuit, side: Side) -> Result<&str> {
        self.interface_name(side)
            .ok_or_else(|| SynthError::UndeterminedInterfaceType {
                fragment: self.describe(circuit),
                side: side_name(side),
                reason: "neither a type nor an interface name is given".to_owned(),
            })
    }

    fn single_type(
        &self,
        circuit: &Circuit,
        side: Side,
        name: &str,
        candidates: BTreeSet<InterfaceTypeId>,
    ) -> Result<InterfaceTypeId> {
        let mut iter = candidates.iter();
        match (iter.next(), iter.next()) {
            (Some(t), None) => Ok(*t),
            (None, _) => Err(SynthError::InterfaceNotFound {
                component: circuit.reference(self.node(side)).to_owned(),
                name: name.to_owned(),
                interface_type: "any matching type".to_owned(),
            }),
            _ => Err(SynthError::UndeterminedInterfaceType {
                fragment: self.describe(circuit),
                side: side_name(side),
                reason: format!("{} candidate interface types", candidates.len()),
            }),
        }
    }

    pub fn from_interface(&self, circuit: &Circuit) -> Result<Option<InterfaceRef>> {
        self.resolved_interface(circuit, Side::From)
    }

    pub fn to_interface(&self, circuit: &Circuit) -> Result<Option<InterfaceRef>> {
        self.resolved_interface(circuit, Side::To)
    }

    fn resolved_interface(&self, circuit: &Circuit, side: Side) -> Result<Option<InterfaceRef>> {
        let Some(name) = self.interface_name(side) else {
            return Ok(None);
        };
        let interface_type = self.interface_type(circuit, side)?;
        circuit.find_interface(self.node(side), name, interface_type)
    }

    /// Bus reference: `<family>__<function>` for shareable types, otherwise
    /// prefixed by the from reference and suffixed by the interface name.
    pub fn reference(&self, circuit: &Circuit) -> Result<String> {
        let catalog = circuit.catalog();
        let from_type = catalog.interface_type(self.from_interface_type(circuit)?)?;
        let family = catalog.family(from_type.family)?;
        let base = format!("{}__{}", family.label, self.function);
        let mut shared = false;
        for pin in &from_type.pins {
            shared |= catalog.interface_pin(*pin)?.is_shared();
        }
        if shared {
            Ok(base)
        } else {
            Ok(format!(
                "{}__{}__{}",
                circuit.reference(self.from),
                base,
                self.from_interface_name.as_deref().unwrap_or_default()
            ))
        }
    }

    /// Requesting pin to the pins it is wired to.
    pub fn connections(&self) -> BTreeMap<ComponentPin, BTreeSet<ComponentPin>> {
        let mut out: BTreeMap<ComponentPin, BTreeSet<ComponentPin>> = BTreeMap::new();
        for (key, from_uses) in &self.from_connections {
            let Some(to_uses) = self.to_connections.get(key) else {
                continue;
            };
            for from in from_uses {
                out.entry(from.component_pin)
                    .or_default()
                    .extend(to_uses.iter().map(|u| u.component_pin));
            }
        }
        out
    }

    pub fn reverse_connections(&self) -> BTreeMap<ComponentPin, BTreeSet<ComponentPin>> {
        let mut out: BTreeMap<ComponentPin, BTreeSet<ComponentPin>> = BTreeMap::new();
        for (from, targets) in self.connections() {
            for to in targets {
                out.entry(to).or_default().insert(from);
            }
        }
        out
    }

    pub fn is_resolved(&self, circuit: &Circuit) -> bool {
        matches!(
            (self.from_interface(circuit), self.to_interface(circuit)),
            (Ok(Some(_)), Ok(Some(_)))
        ) && !self.from_connections.is_empty()
    }

    /// Works out which pins of the two interfaces are wired together.
    ///
    /// Compatible types pair each from pin with its compatible to pins;
    /// identical types pair equal interface pins; otherwise two
    /// single-assignment interfaces of equal width are wired straight
    /// through.
    pub fn deduce_connections(
        &self,
        circuit: &Circuit,
        from_component: ComponentId,
    ) -> Result<Deduction> {
        if !matches!(self.source, FragmentSource::Persisted(_)) {
            return Ok(Deduction::Deferred(DeferReason::NotPersisted));
        }
        let (Ok(from_type), Ok(to_type)) = (
            self.interface_type(circuit, Side::From),
            self.interface_type(circuit, Side::To),
        ) else {
            return Ok(Deduction::Deferred(DeferReason::UnknownInterfaceTypes));
        };
        let to_component = match circuit.node(self.to)? {
            Node::Component(_) => self.to,
            Node::Filter(filter) => {
                let mut connectivities = BTreeSet::new();
                for candidate in &filter.feasible {
                    connectivities.insert(circuit.component(*candidate)?.connectivity);
                }
                match (filter.feasible.first(), connectivities.len()) {
                    (Some(first), 1) => *first,
                    _ => return Ok(Deduction::Deferred(DeferReason::UnresolvedTarget)),
                }
            }
        };
        let (Some(from_name), Some(to_name)) = (
            self.from_interface_name.as_deref(),
            self.to_interface_name.as_deref(),
        ) else {
            return Ok(Deduction::Deferred(DeferReason::MissingInterfaceName));
        };
        let (Some(from_interface), Some(to_interface)) = (
            circuit.find_interface(from_component, from_name, from_type)?,
            circuit.find_interface(to_component, to_name, to_type)?,
        ) else {
            return Ok(Deduction::Deferred(DeferReason::MissingInterface));
        };

        let catalog = circuit.catalog();
        let from_assignments = &circuit.interface(from_interface)?.interface.pin_assignments;
        let to_assignments = &circuit.interface(to_interface)?.interface.pin_assignments;
        let mut from_connections = Connections::new();
        let mut to_connections = Connections::new();

        if catalog.is_compatible(from_type, to_type)? {
            for assignment in from_assignments {
                let key = assignment.interface_pin;
                let from_pin = catalog.interface_pin(key)?;
                from_connections
                    .entry(key)
                    .or_default()
                    .extend(pin_uses(circuit, from_interface, assignment, key)?);
                for to_assignment in to_assignments {
                    if !from_pin.is_compatible_with(to_assignment.interface_pin) {
                        continue;
                    }
                    to_connections.entry(key).or_default().extend(pin_uses(
                        circuit,
                        to_interface,
                        to_assignment,
                        to_assignment.interface_pin,
                    )?);
                }
            }
        } else if from_type == to_type {
            for assignment in from_assignments {
                let key = assignment.interface_pin;
                let to_assignment = to_assignments
                    .iter()
                    .find(|a| a.interface_pin == key)
                    .ok_or_else(|| SynthError::UnsupportedPairing {
                        fragment: self.describe(circuit),
                        reason: format!(
                            "the target interface has no assignment for {}",
                            catalog
                                .interface_pin(key)
                                .map(|p| p.reference.clone())
                                .unwrap_or_else(|_| key.to_string())
                        ),
                    })?;
                from_connections
                    .entry(key)
                    .or_default()
                    .extend(pin_uses(circuit, from_interface, assignment, key)?);
                to_connections
                    .entry(key)
                    .or_default()
                    .extend(pin_uses(circuit, to_interface, to_assignment, key)?);
            }
        } else if let ([from_assignment], [to_assignment]) =
            (from_assignments.as_slice(), to_assignments.as_slice())
        {
            if from_assignment.pins.len() == to_assignment.pins.len() {
                let from_key = catalog.interface_type(from_type)?.first_pin();
                let to_key = catalog.interface_type(to_type)?.first_pin();
                if let (Some(from_key), Some(to_key)) = (from_key, to_key) {
                    from_connections.insert(
                        from_key,
                        pin_uses(circuit, from_interface, from_assignment, from_key)?,
                    );
                    to_connections.insert(
                        from_key,
                        pin_uses(circuit, to_interface, to_assignment, to_key)?,
                    );
                }
            }
        }

        if from_connections.is_empty() && to_connections.is_empty() {
            return Err(SynthError::UnsupportedPairing {
                fragment: self.describe(circuit),
                reason: "the interface types are neither compatible nor identical, and the \
                         interfaces are not single assignments of equal width"
                    .to_owned(),
            });
        }
        if !from_connections.keys().eq(to_connections.keys()) {
            return Err(SynthError::ConnectionKeyMismatch(self.describe(circuit)));
        }

        Ok(Deduction::Resolved(ConnectionDeduction {
            from_interface,
            to_interface,
            from_connections,
            to_connections,
        }))
    }
}

fn side_name(side: Side) -> &'static str {
    match side {
        Side::From => "from",
        Side::To => "to",
    }
}

fn pin_uses(
    circuit: &Circuit,
    interface: InterfaceRef,
    assignment: &PinAssignment,
    interface_pin: InterfacePinId,
) -> Result<Vec<PinUse>> {
    assignment
        .pins
        .iter()
        .map(|pin| {
            Ok(PinUse {
                component_pin: circuit.get_pin(interface.component, *pin)?,
                interface_pin,
                interface,
            })
        })
        .collect()
}
