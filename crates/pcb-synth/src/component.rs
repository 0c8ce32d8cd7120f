use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use once_cell::sync::Lazy;
use pcb_catalog::{
    Catalog, Connectivity, ConnectivityId, Interface, InterfaceId, InterfacePinId, InterfaceTypeId,
    PinAssignment, Pin, PinId,
};
use regex::Regex;
use termtree::Tree;

use crate::ancillary::Ancillary;
use crate::bus_fragment::{BusFragment, Deduction, Side};
use crate::error::{Result, SynthError};

/// Reference of the implicit root subcircuit.
pub const ROOT_REFERENCE: &str = "ROOT1";

static REFERENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[^.]+\.)*(?P<prefix>[A-Z_$-]+)(?P<suffix>\d+)$")
        .expect("reference pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(pub(crate) usize);

impl ComponentId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FragmentId(pub(crate) usize);

impl FragmentId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A physical pin on a specific component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentPin {
    pub component: ComponentId,
    pub pin: PinId,
}

/// An interface on a specific component, by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InterfaceRef {
    pub component: ComponentId,
    pub index: usize,
}

/// A component pin used through an interface pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PinUse {
    pub component_pin: ComponentPin,
    pub interface_pin: InterfacePinId,
    pub interface: InterfaceRef,
}

/// Pin uses keyed by the requesting side's interface pin.
pub type Connections = BTreeMap<InterfacePinId, Vec<PinUse>>;

/// An interface as realised on a component.
#[derive(Debug, Clone)]
pub struct ComponentInterface {
    pub name: String,
    pub interface: Interface,
    pub active_pin_uses: Connections,
    active: bool,
}

impl ComponentInterface {
    pub fn new(name: impl Into<String>, interface: Interface) -> Self {
        Self {
            name: name.into(),
            interface,
            active_pin_uses: Connections::new(),
            active: false,
        }
    }

    pub fn interface_type(&self) -> InterfaceTypeId {
        self.interface.interface_type
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Component pins in use, optionally restricted to one interface pin and
    /// to the pins of one assignment.
    pub fn active_pins(
        &self,
        interface_pin: Option<InterfacePinId>,
        pin_assignment: Option<&PinAssignment>,
    ) -> BTreeSet<ComponentPin> {
        self.active_pin_uses
            .values()
            .flatten()
            .filter(|u| interface_pin.is_none_or(|p| u.interface_pin == p))
            .filter(|u| pin_assignment.is_none_or(|a| a.pins.contains(&u.component_pin.pin)))
            .map(|u| u.component_pin)
            .collect()
    }

    pub fn active_interface_pins(&self) -> BTreeSet<InterfacePinId> {
        self.active_pin_uses
            .values()
            .flatten()
            .map(|u| u.interface_pin)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    Part,
    Subcircuit,
}

#[derive(Debug, Clone)]
pub struct Component {
    pub reference: String,
    pub function: String,
    pub kind: ComponentKind,
    pub connectivity: Option<ConnectivityId>,
    pub pins: Vec<Pin>,
    pub interfaces: Vec<ComponentInterface>,
    pub parent: Option<ComponentId>,
    pub children: Vec<ComponentId>,
    pub external_bus_requirements: Vec<FragmentId>,
    pub ancillary: Option<Ancillary>,
}

impl Component {
    pub fn is_part(&self) -> bool {
        self.kind == ComponentKind::Part
    }

    pub fn pin(&self, id: PinId) -> Option<&Pin> {
        self.pins.iter().find(|p| p.id == id)
    }

    pub fn pin_by_name(&self, name: &str) -> Option<&Pin> {
        self.pins.iter().find(|p| p.name == name)
    }
}

/// Placeholder for a component that has not been chosen yet.
#[derive(Debug, Clone)]
pub struct ComponentFilter {
    pub reference: String,
    pub function: String,
    pub connectivity: Option<ConnectivityId>,
    /// Filters that must be resolved together with this one.
    pub links: Vec<ComponentId>,
    /// Detached candidate components.
    pub feasible: Vec<ComponentId>,
    pub parent: Option<ComponentId>,
    pub external_bus_requirements: Vec<FragmentId>,
}

#[derive(Debug, Clone)]
pub enum Node {
    Component(Component),
    Filter(ComponentFilter),
}

impl Node {
    pub fn reference(&self) -> &str {
        match self {
            Node::Component(c) => &c.reference,
            Node::Filter(f) => &f.reference,
        }
    }

    pub fn parent(&self) -> Option<ComponentId> {
        match self {
            Node::Component(c) => c.parent,
            Node::Filter(f) => f.parent,
        }
    }

    pub fn external_bus_requirements(&self) -> &[FragmentId] {
        match self {
            Node::Component(c) => &c.external_bus_requirements,
            Node::Filter(f) => &f.external_bus_requirements,
        }
    }

    fn external_bus_requirements_mut(&mut self) -> &mut Vec<FragmentId> {
        match self {
            Node::Component(c) => &mut c.external_bus_requirements,
            Node::Filter(f) => &mut f.external_bus_requirements,
        }
    }

    pub fn as_component(&self) -> Option<&Component> {
        match self {
            Node::Component(c) => Some(c),
            Node::Filter(_) => None,
        }
    }
}

/// Arena holding the component tree and its bus fragments.
#[derive(Debug, Clone)]
pub struct Circuit {
    catalog: Arc<Catalog>,
    nodes: Vec<Node>,
    pub(crate) fragments: Vec<BusFragment>,
    root: ComponentId,
}

impl Circuit {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        let root = Component {
            reference: ROOT_REFERENCE.to_owned(),
            function: "root".to_owned(),
            kind: ComponentKind::Subcircuit,
            connectivity: None,
            pins: Vec::new(),
            interfaces: Vec::new(),
            parent: None,
            children: Vec::new(),
            external_bus_requirements: Vec::new(),
            ancillary: None,
        };
        Self {
            catalog,
            nodes: vec![Node::Component(root)],
            fragments: Vec::new(),
            root: ComponentId(0),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn root(&self) -> ComponentId {
        self.root
    }

    pub fn node(&self, id: ComponentId) -> Result<&Node> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| SynthError::UnknownComponent(format!("#{}", id.0)))
    }

    fn node_mut(&mut self, id: ComponentId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .ok_or_else(|| SynthError::UnknownComponent(format!("#{}", id.0)))
    }

    pub fn component(&self, id: ComponentId) -> Result<&Component> {
        match self.node(id)? {
            Node::Component(c) => Ok(c),
            Node::Filter(f) => Err(SynthError::UnresolvedFilter(f.reference.clone())),
        }
    }

    fn component_mut(&mut self, id: ComponentId) -> Result<&mut Component> {
        match self.node_mut(id)? {
            Node::Component(c) => Ok(c),
            Node::Filter(f) => Err(SynthError::UnresolvedFilter(f.reference.clone())),
        }
    }

    /// Reference of a node, or a placeholder for ids outside the arena.
    pub fn reference(&self, id: ComponentId) -> &str {
        self.nodes.get(id.0).map(Node::reference).unwrap_or("?")
    }

    pub fn is_part(&self, id: ComponentId) -> bool {
        matches!(self.nodes.get(id.0), Some(Node::Component(c)) if c.is_part())
    }

    pub fn is_ancillary(&self, id: ComponentId) -> bool {
        matches!(self.nodes.get(id.0), Some(Node::Component(c)) if c.ancillary.is_some())
    }

    /// Looks up a node in the tree by its hierarchical reference.
    pub fn find(&self, reference: &str) -> Result<ComponentId> {
        self.iterate_tree(self.root, true)
            .into_iter()
            .map(|(_, id)| id)
            .find(|id| self.reference(*id) == reference)
            .ok_or_else(|| SynthError::UnknownComponent(reference.to_owned()))
    }

    fn child_reference(&self, parent: ComponentId, local: &str) -> Result<String> {
        if local.is_empty() || local.contains('.') {
            return Err(SynthError::InvalidReference(local.to_owned()));
        }
        if parent == self.root {
            Ok(local.to_owned())
        } else {
            Ok(format!("{}.{}", self.component(parent)?.reference, local))
        }
    }

    fn push_node(&mut self, node: Node, attach: bool) -> Result<ComponentId> {
        let id = ComponentId(self.nodes.len());
        let parent = node.parent();
        self.nodes.push(node);
        if let (true, Some(parent)) = (attach, parent) {
            self.component_mut(parent)?.children.push(id);
        }
        Ok(id)
    }

    fn new_component(
        &self,
        parent: ComponentId,
        reference: String,
        function: &str,
        kind: ComponentKind,
        connectivity: Option<ConnectivityId>,
    ) -> Result<Component> {
        let (pins, interfaces) = match connectivity {
            Some(id) => {
                let connectivity = self.catalog.connectivity(id)?;
                (
                    connectivity.pins.clone(),
                    instantiate_interfaces(&self.catalog, connectivity)?,
                )
            }
            None => (Vec::new(), Vec::new()),
        };
        Ok(Component {
            reference,
            function: function.to_owned(),
            kind,
            connectivity,
            pins,
            interfaces,
            parent: Some(parent),
            children: Vec::new(),
            external_bus_requirements: Vec::new(),
            ancillary: None,
        })
    }

    pub fn add_part(
        &mut self,
        parent: ComponentId,
        local_reference: &str,
        function: &str,
        connectivity: ConnectivityId,
    ) -> Result<ComponentId> {
        let reference = self.child_reference(parent, local_reference)?;
        let component = self.new_component(
            parent,
            reference,
            function,
            ComponentKind::Part,
            Some(connectivity),
        )?;
        self.push_node(Node::Component(component), true)
    }

    pub fn add_subcircuit(
        &mut self,
        parent: ComponentId,
        local_reference: &str,
        function: &str,
        connectivity: Option<ConnectivityId>,
    ) -> Result<ComponentId> {
        let reference = self.child_reference(parent, local_reference)?;
        let component = self.new_component(
            parent,
            reference,
            function,
            ComponentKind::Subcircuit,
            connectivity,
        )?;
        self.push_node(Node::Component(component), true)
    }

    /// Adds a part that is itself an ancillary of something else.
    pub fn add_ancillary(
        &mut self,
        parent: ComponentId,
        local_reference: &str,
        function: &str,
        connectivity: ConnectivityId,
        ancillary: Ancillary,
    ) -> Result<ComponentId> {
        let id = self.add_part(parent, local_reference, function, connectivity)?;
        self.set_ancillary(id, ancillary)?;
        Ok(id)
    }

    pub fn set_ancillary(&mut self, component: ComponentId, ancillary: Ancillary) -> Result<()> {
        if let Some(parent) = ancillary.parent() {
            self.node(parent)?;
        }
        log::debug!(
            "{} is a {} ancillary",
            self.reference(component),
            ancillary.ancillary_type
        );
        self.component_mut(component)?.ancillary = Some(ancillary);
        Ok(())
    }

    pub fn add_filter(
        &mut self,
        parent: ComponentId,
        local_reference: &str,
        function: &str,
        connectivity: Option<ConnectivityId>,
    ) -> Result<ComponentId> {
        let reference = self.child_reference(parent, local_reference)?;
        if let Some(id) = connectivity {
            self.catalog.connectivity(id)?;
        }
        let filter = ComponentFilter {
            reference,
            function: function.to_owned(),
            connectivity,
            links: Vec::new(),
            feasible: Vec::new(),
            parent: Some(parent),
            external_bus_requirements: Vec::new(),
        };
        self.push_node(Node::Filter(filter), true)
    }

    pub fn link_filters(&mut self, a: ComponentId, b: ComponentId) -> Result<()> {
        for (this, other) in [(a, b), (b, a)] {
            match self.node_mut(this)? {
                Node::Filter(f) => {
                    if !f.links.contains(&other) {
                        f.links.push(other);
                    }
                }
                Node::Component(c) => {
                    return Err(SynthError::InvalidReference(format!(
                        "{} is not a component filter",
                        c.reference
                    )));
                }
            }
        }
        Ok(())
    }

    /// Adds a detached candidate part for `filter`.
    pub fn add_candidate(
        &mut self,
        filter: ComponentId,
        connectivity: ConnectivityId,
    ) -> Result<ComponentId> {
        let (reference, function, parent) = match self.node(filter)? {
            Node::Filter(f) => (
                f.reference.clone(),
                f.function.clone(),
                f.parent.unwrap_or(self.root),
            ),
            Node::Component(c) => {
                return Err(SynthError::InvalidReference(format!(
                    "{} is not a component filter",
                    c.reference
                )));
            }
        };
        let component = self.new_component(
            parent,
            reference,
            &function,
            ComponentKind::Part,
            Some(connectivity),
        )?;
        let id = self.push_node(Node::Component(component), false)?;
        if let Node::Filter(f) = self.node_mut(filter)? {
            f.feasible.push(id);
        }
        Ok(id)
    }

    /// Replaces `filter` by one of its candidates.
    ///
    /// Bus fragments pointing at the filter are retargeted at the candidate
    /// and deferred connection deductions are retried.
    pub fn resolve_filter(&mut self, filter: ComponentId, candidate: ComponentId) -> Result<()> {
        let (parent, requirements, links) = match self.node(filter)? {
            Node::Filter(f) if f.feasible.contains(&candidate) => (
                f.parent,
                f.external_bus_requirements.clone(),
                f.links.clone(),
            ),
            Node::Filter(f) => {
                return Err(SynthError::NotACandidate {
                    filter: f.reference.clone(),
                    component: self.reference(candidate).to_owned(),
                });
            }
            Node::Component(c) => {
                return Err(SynthError::InvalidReference(format!(
                    "{} is not a component filter",
                    c.reference
                )));
            }
        };

        if let Some(parent) = parent {
            let siblings = &mut self.component_mut(parent)?.children;
            for child in siblings.iter_mut().filter(|c| **c == filter) {
                *child = candidate;
            }
        }
        for link in links {
            if let Ok(Node::Filter(f)) = self.node_mut(link) {
                for l in f.links.iter_mut().filter(|l| **l == filter) {
                    *l = candidate;
                }
            }
        }

        let mut touched = Vec::new();
        for (index, fragment) in self.fragments.iter_mut().enumerate() {
            let mut hit = false;
            if fragment.from == filter {
                fragment.from = candidate;
                hit = true;
            }
            if fragment.to == filter {
                fragment.to = candidate;
                hit = true;
            }
            if hit {
                touched.push(FragmentId(index));
            }
        }
        let component = self.component_mut(candidate)?;
        component.parent = parent;
        component.external_bus_requirements.extend(requirements);

        log::debug!(
            "Resolved filter {}, {} bus fragment(s) retargeted",
            self.reference(candidate),
            touched.len()
        );
        for id in touched {
            self.forget_stale_connections(id)?;
            if self.fragments[id.0].from_connections.is_empty() {
                self.try_deduce(id)?;
            }
        }
        Ok(())
    }

    /// Drops the connections of a fragment when they were deduced against a
    /// component it no longer points at, deactivating the pin uses involved.
    fn forget_stale_connections(&mut self, id: FragmentId) -> Result<()> {
        let fragment = self.fragment(id)?;
        let ends = [fragment.from, fragment.to];
        let stale = fragment
            .from_connections
            .values()
            .chain(fragment.to_connections.values())
            .flatten()
            .any(|u| !ends.contains(&u.interface.component));
        if !stale {
            return Ok(());
        }

        let fragment = &mut self.fragments[id.0];
        let connections = [
            std::mem::take(&mut fragment.from_connections),
            std::mem::take(&mut fragment.to_connections),
        ];
        for (key, uses) in connections.into_iter().flatten() {
            for pin_use in uses {
                self.deactivate_pin_use(key, pin_use)?;
            }
        }
        log::debug!(
            "Forgot stale connections of {}",
            self.fragment(id)?.describe(self)
        );
        Ok(())
    }

    pub fn interface(&self, iref: InterfaceRef) -> Result<&ComponentInterface> {
        let component = self.component(iref.component)?;
        component
            .interfaces
            .get(iref.index)
            .ok_or_else(|| SynthError::InterfaceNotFound {
                component: component.reference.clone(),
                name: format!("#{}", iref.index),
                interface_type: "?".to_owned(),
            })
    }

    pub fn interface_label(&self, iref: InterfaceRef) -> String {
        match self.interface(iref) {
            Ok(ci) => format!("{}.{}", self.reference(iref.component), ci.name),
            Err(_) => format!("{}.#{}", self.reference(iref.component), iref.index),
        }
    }

    fn type_name(&self, interface_type: InterfaceTypeId) -> String {
        self.catalog
            .interface_type(interface_type)
            .map(|t| t.name.clone())
            .unwrap_or_else(|_| interface_type.to_string())
    }

    /// The interface called `name` of type `interface_type` on `component`.
    pub fn get_interface(
        &self,
        component: ComponentId,
        name: &str,
        interface_type: InterfaceTypeId,
    ) -> Result<InterfaceRef> {
        let c = self.component(component)?;
        let matches: Vec<usize> = c
            .interfaces
            .iter()
            .enumerate()
            .filter(|(_, i)| i.name == name && i.interface_type() == interface_type)
            .map(|(index, _)| index)
            .collect();
        match matches.as_slice() {
            [index] => Ok(InterfaceRef {
                component,
                index: *index,
            }),
            [] => Err(SynthError::InterfaceNotFound {
                component: c.reference.clone(),
                name: name.to_owned(),
                interface_type: self.type_name(interface_type),
            }),
            _ => Err(SynthError::AmbiguousInterface {
                component: c.reference.clone(),
                name: name.to_owned(),
                interface_type: self.type_name(interface_type),
                count: matches.len(),
            }),
        }
    }

    /// Like [`Circuit::get_interface`], but a missing interface is `None`.
    pub fn find_interface(
        &self,
        component: ComponentId,
        name: &str,
        interface_type: InterfaceTypeId,
    ) -> Result<Option<InterfaceRef>> {
        match self.get_interface(component, name, interface_type) {
            Ok(iref) => Ok(Some(iref)),
            Err(SynthError::InterfaceNotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn active_interfaces(&self, component: ComponentId) -> Result<Vec<InterfaceRef>> {
        Ok(self
            .component(component)?
            .interfaces
            .iter()
            .enumerate()
            .filter(|(_, i)| i.is_active())
            .map(|(index, _)| InterfaceRef { component, index })
            .collect())
    }

    fn interface_mut(&mut self, iref: InterfaceRef) -> Result<&mut ComponentInterface> {
        let component = self.component_mut(iref.component)?;
        let reference = component.reference.clone();
        component
            .interfaces
            .get_mut(iref.index)
            .ok_or_else(|| SynthError::InterfaceNotFound {
                component: reference,
                name: format!("#{}", iref.index),
                interface_type: "?".to_owned(),
            })
    }

    pub(crate) fn activate_interface(&mut self, iref: InterfaceRef, uses: Connections) -> Result<()> {
        let ci = self.interface_mut(iref)?;
        ci.active = true;
        for (key, pin_uses) in uses {
            ci.active_pin_uses.entry(key).or_default().extend(pin_uses);
        }
        Ok(())
    }

    /// Removes one occurrence of `pin_use` under `key`; the interface is
    /// deactivated once no uses remain.
    fn deactivate_pin_use(&mut self, key: InterfacePinId, pin_use: PinUse) -> Result<()> {
        let ci = self.interface_mut(pin_use.interface)?;
        if let Some(uses) = ci.active_pin_uses.get_mut(&key) {
            if let Some(position) = uses.iter().position(|u| *u == pin_use) {
                uses.remove(position);
            }
            if uses.is_empty() {
                ci.active_pin_uses.remove(&key);
            }
        }
        if ci.active_pin_uses.is_empty() {
            ci.active = false;
        }
        Ok(())
    }

    pub fn get_pin(&self, component: ComponentId, pin: PinId) -> Result<ComponentPin> {
        let c = self.component(component)?;
        if c.pin(pin).is_none() {
            return Err(SynthError::PinNotFound {
                component: c.reference.clone(),
                pin: pin.to_string(),
            });
        }
        Ok(ComponentPin { component, pin })
    }

    pub fn get_pin_by_name(&self, component: ComponentId, name: &str) -> Result<ComponentPin> {
        let c = self.component(component)?;
        let pin = c.pin_by_name(name).ok_or_else(|| SynthError::PinNotFound {
            component: c.reference.clone(),
            pin: name.to_owned(),
        })?;
        Ok(ComponentPin {
            component,
            pin: pin.id,
        })
    }

    pub fn pin(&self, pin: ComponentPin) -> Result<&Pin> {
        let c = self.component(pin.component)?;
        c.pin(pin.pin).ok_or_else(|| SynthError::PinNotFound {
            component: c.reference.clone(),
            pin: pin.pin.to_string(),
        })
    }

    /// `REF.PIN` label of a component pin.
    pub fn pin_label(&self, pin: ComponentPin) -> String {
        match self.pin(pin) {
            Ok(p) => format!("{}.{}", self.reference(pin.component), p.name),
            Err(_) => format!("{}.{}", self.reference(pin.component), pin.pin),
        }
    }

    /// The interface pin a component pin is actively used as.
    pub fn get_assigned_interface_pin(&self, pin: ComponentPin) -> Result<Option<InterfacePinId>> {
        let component = self.component(pin.component)?;
        Ok(component
            .interfaces
            .iter()
            .filter(|i| i.is_active())
            .flat_map(|i| i.active_pin_uses.values().flatten())
            .find(|u| u.component_pin == pin)
            .map(|u| u.interface_pin))
    }

    pub fn fragment(&self, id: FragmentId) -> Result<&BusFragment> {
        self.fragments
            .get(id.0)
            .ok_or_else(|| SynthError::InvalidFragment(format!("unknown fragment #{}", id.0)))
    }

    pub fn fragments(&self) -> impl Iterator<Item = (FragmentId, &BusFragment)> {
        self.fragments
            .iter()
            .enumerate()
            .map(|(index, f)| (FragmentId(index), f))
    }

    /// Records a bus requirement on its `from` node and deduces its pin
    /// connections when both ends are known.
    pub fn add_bus_requirement(&mut self, fragment: BusFragment) -> Result<FragmentId> {
        self.node(fragment.to)?;
        if fragment.adapter.is_some() {
            for side in [Side::From, Side::To] {
                self.adapt_interface(&fragment, side)?;
            }
        }
        let id = FragmentId(self.fragments.len());
        let owner = fragment.from;
        self.fragments.push(fragment);
        self.node_mut(owner)?.external_bus_requirements_mut().push(id);
        self.try_deduce(id)?;
        Ok(id)
    }

    pub(crate) fn try_deduce(&mut self, id: FragmentId) -> Result<()> {
        let fragment = self.fragment(id)?;
        if !matches!(self.node(fragment.from)?, Node::Component(_)) {
            return Ok(());
        }
        match fragment.deduce_connections(self, fragment.from)? {
            Deduction::Deferred(reason) => {
                log::debug!(
                    "Deferring connections of {}: {reason}",
                    fragment.describe(self)
                );
            }
            Deduction::Resolved(deduction) => {
                self.activate_interface(
                    deduction.from_interface,
                    deduction.from_connections.clone(),
                )?;
                self.activate_interface(deduction.to_interface, deduction.to_connections.clone())?;
                let fragment = &mut self.fragments[id.0];
                fragment.from_connections.extend(deduction.from_connections);
                fragment.to_connections.extend(deduction.to_connections);
            }
        }
        Ok(())
    }

    /// Adds the adapted counterpart of a fragment's interface to its
    /// component, unless it is already there.
    fn adapt_interface(&mut self, fragment: &BusFragment, side: Side) -> Result<()> {
        let Some(adapter) = &fragment.adapter else {
            return Ok(());
        };
        let component = fragment.node(side);
        if !matches!(self.node(component)?, Node::Component(_)) {
            return Ok(());
        }
        let name = fragment.interface_name(side).ok_or_else(|| {
            SynthError::InvalidFragment(format!(
                "{} needs an interface name on the {side} side to be adapted",
                fragment.describe(self)
            ))
        })?;
        let adapted_type = fragment.interface_type(self, side)?;
        if self.find_interface(component, name, adapted_type)?.is_some() {
            return Ok(());
        }
        let (pin_map, original_type) = match side {
            Side::From => (&adapter.adapted_from_pins, adapter.original_from_type),
            Side::To => (&adapter.adapted_to_pins, adapter.original_to_type),
        };
        let original_type = original_type.unwrap_or(adapted_type);
        let original = self.interface(self.get_interface(component, name, original_type)?)?;

        let pin_assignments = original
            .interface
            .pin_assignments
            .iter()
            .map(|a| {
                let adapted = pin_map.get(&a.interface_pin).copied().ok_or_else(|| {
                    SynthError::InvalidFragment(format!(
                        "adapter of {} has no mapping for interface pin {}",
                        fragment.describe(self),
                        a.interface_pin
                    ))
                })?;
                Ok(a.with_interface_pin(adapted))
            })
            .collect::<Result<Vec<_>>>()?;
        let adapted = ComponentInterface::new(
            original.name.clone(),
            Interface {
                interface_type: adapted_type,
                pin_assignments,
                ..original.interface.clone()
            },
        );
        log::debug!(
            "Adapted {}.{} to {}",
            self.reference(component),
            name,
            self.type_name(adapted_type)
        );
        self.component_mut(component)?.interfaces.push(adapted);
        Ok(())
    }

    /// Interfaces a node may offer as `(name, type)`: the interfaces of a
    /// component, or those a filter's connectivity would provide.
    pub fn interface_candidates(&self, node: ComponentId) -> Result<Vec<(String, InterfaceTypeId)>> {
        match self.node(node)? {
            Node::Component(c) => Ok(c
                .interfaces
                .iter()
                .map(|i| (i.name.clone(), i.interface_type()))
                .collect()),
            Node::Filter(f) => {
                let Some(connectivity) = f.connectivity else {
                    return Ok(Vec::new());
                };
                let connectivity = self.catalog.connectivity(connectivity)?;
                Ok(instantiate_interfaces(&self.catalog, connectivity)?
                    .into_iter()
                    .map(|i| (i.name, i.interface.interface_type))
                    .collect())
            }
        }
    }

    fn children(&self, id: ComponentId) -> &[ComponentId] {
        match self.nodes.get(id.0) {
            Some(Node::Component(c)) => &c.children,
            _ => &[],
        }
    }

    /// `(parent, node)` pairs below `from` in depth-first pre-order.
    pub fn iterate_tree(
        &self,
        from: ComponentId,
        include_root: bool,
    ) -> Vec<(Option<ComponentId>, ComponentId)> {
        let mut out = Vec::new();
        if include_root {
            out.push((self.nodes.get(from.0).and_then(Node::parent), from));
        }
        self.walk(from, &mut out);
        out
    }

    fn walk(&self, id: ComponentId, out: &mut Vec<(Option<ComponentId>, ComponentId)>) {
        for child in self.children(id) {
            out.push((Some(id), *child));
            self.walk(*child, out);
        }
    }

    pub fn iterate_components(&self, from: ComponentId) -> Vec<ComponentId> {
        self.iterate_tree(from, true)
            .into_iter()
            .map(|(_, id)| id)
            .filter(|id| matches!(self.nodes.get(id.0), Some(Node::Component(_))))
            .collect()
    }

    pub fn iterate_parts(&self, from: ComponentId) -> Vec<ComponentId> {
        self.iterate_components(from)
            .into_iter()
            .filter(|id| self.is_part(*id))
            .collect()
    }

    /// `id` (optionally) followed by its ancestors up to the root.
    pub fn iterate_ancestors(&self, id: ComponentId, include_self: bool) -> Vec<ComponentId> {
        let mut out = Vec::new();
        if include_self {
            out.push(id);
        }
        let mut current = self.nodes.get(id.0).and_then(Node::parent);
        while let Some(parent) = current {
            out.push(parent);
            current = self.nodes.get(parent.0).and_then(Node::parent);
        }
        out
    }

    /// Parts below `from`; unresolved filters are an error.
    pub fn atomic_components(&self, from: ComponentId) -> Result<Vec<ComponentId>> {
        if let Some(filter) = self.unresolved_filters(from).first() {
            return Err(SynthError::UnresolvedFilter(self.reference(*filter).to_owned()));
        }
        Ok(self.iterate_parts(from))
    }

    pub fn unresolved_filters(&self, from: ComponentId) -> Vec<ComponentId> {
        self.iterate_tree(from, true)
            .into_iter()
            .map(|(_, id)| id)
            .filter(|id| matches!(self.nodes.get(id.0), Some(Node::Filter(_))))
            .collect()
    }

    pub fn is_fully_resolved(&self, from: ComponentId) -> bool {
        self.unresolved_filters(from).is_empty()
    }

    /// Designator prefix of a node's reference (`R` for `U1.R12`).
    pub fn reference_label(&self, id: ComponentId) -> Result<String> {
        reference_label(self.node(id)?.reference())
    }

    /// Next free local reference with `prefix` among the children of `parent`.
    pub fn next_reference(&self, parent: ComponentId, prefix: &str) -> Result<String> {
        let existing: Vec<&str> = self
            .children(parent)
            .iter()
            .map(|c| self.reference(*c))
            .collect();
        Ok(next_reference_from_list(prefix, &existing))
    }

    /// Maps the hierarchical reference of every part below `from` to a flat,
    /// board-unique reference with the same designator prefix.
    pub fn flattened_references(&self, from: ComponentId) -> Result<BTreeMap<String, String>> {
        let mut taken: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut out = BTreeMap::new();
        for part in self.iterate_parts(from) {
            let reference = self.reference(part);
            let prefix = reference_label(reference)?;
            let used = taken.entry(prefix.clone()).or_default();
            let refs: Vec<&str> = used.iter().map(String::as_str).collect();
            let flat = next_reference_from_list(&prefix, &refs);
            used.push(flat.clone());
            out.insert(reference.to_owned(), flat);
        }
        Ok(out)
    }

    /// Renders the tree below `from`.
    pub fn display_tree(&self, from: ComponentId) -> Result<String> {
        Ok(self.tree_node(from)?.to_string())
    }

    fn tree_node(&self, id: ComponentId) -> Result<Tree<String>> {
        let label = match self.node(id)? {
            Node::Component(c) => match &c.ancillary {
                Some(a) => format!("{} ({}, {})", c.reference, c.function, a.ancillary_type),
                None => format!("{} ({})", c.reference, c.function),
            },
            Node::Filter(f) => format!("{} ({}, unresolved)", f.reference, f.function),
        };
        let leaves = self
            .children(id)
            .iter()
            .map(|child| self.tree_node(*child))
            .collect::<Result<Vec<_>>>()?;
        Ok(Tree::new(label).with_leaves(leaves))
    }
}

/// Realises a connectivity's interfaces, splitting generic interfaces into
/// one interface per child type.
fn instantiate_interfaces(
    catalog: &Catalog,
    connectivity: &Connectivity,
) -> Result<Vec<ComponentInterface>> {
    let mut interfaces = Vec::new();
    for interface in &connectivity.interfaces {
        let ty = catalog.interface_type(interface.interface_type)?;
        let function = if interface.function.is_empty() {
            ty.function.clone()
        } else {
            interface.function.clone()
        };
        if !ty.is_separable() {
            interfaces.push(ComponentInterface::new(
                interface.name.clone(),
                Interface {
                    function,
                    ..interface.clone()
                },
            ));
            continue;
        }
        for child_type in &ty.children {
            let pin_assignments = interface
                .pin_assignments
                .iter()
                .map(|a| {
                    let child = catalog.child_pin(a.interface_pin, *child_type)?;
                    Ok(PinAssignment {
                        interface_pin: child.id,
                        parent_interface_pin: Some(a.interface_pin),
                        original_interface_pin: Some(a.interface_pin),
                        ..a.clone()
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            let child = catalog.interface_type(*child_type)?;
            interfaces.push(ComponentInterface::new(
                interface.name.clone(),
                Interface {
                    id: interface
                        .id
                        .map(|id| InterfaceId::from_key(&format!("{id}/{child_type}"))),
                    interface_type: *child_type,
                    name: interface.name.clone(),
                    function: function.clone(),
                    is_required: child.can_be_required,
                    pin_assignments,
                    parent_interface_type: Some(ty.id),
                },
            ));
        }
    }
    Ok(interfaces)
}

/// Designator prefix of a reference.
pub fn reference_label(reference: &str) -> Result<String> {
    REFERENCE_RE
        .captures(reference)
        .map(|caps| caps["prefix"].to_owned())
        .ok_or_else(|| SynthError::InvalidReference(reference.to_owned()))
}

/// Smallest `prefix<n>` (n >= 1) not present in `existing`.
pub fn next_reference_from_list(prefix: &str, existing: &[&str]) -> String {
    let taken: BTreeSet<u64> = existing
        .iter()
        .filter_map(|r| REFERENCE_RE.captures(r))
        .filter(|caps| &caps["prefix"] == prefix)
        .filter_map(|caps| caps["suffix"].parse().ok())
        .collect();
    let mut next = 1;
    while taken.contains(&next) {
        next += 1;
    }
    format!("{prefix}{next}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_come_from_the_last_segment() {
        assert_eq!(reference_label("U1.R12").unwrap(), "R");
        assert_eq!(reference_label("LED_3").unwrap(), "LED_");
        assert_eq!(reference_label(ROOT_REFERENCE).unwrap(), "ROOT");
        assert!(matches!(
            reference_label("MAIN"),
            Err(SynthError::InvalidReference(_))
        ));
    }

    #[test]
    fn next_reference_fills_gaps() {
        assert_eq!(next_reference_from_list("R", &[]), "R1");
        assert_eq!(next_reference_from_list("R", &["R1", "R3", "C2"]), "R2");
        assert_eq!(next_reference_from_list("C", &["R1", "C1", "C2"]), "C3");
        assert_eq!(next_reference_from_list("R", &["U1.R1", "R2"]), "R3");
    }
}
