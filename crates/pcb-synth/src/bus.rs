use std::collections::{BTreeMap, BTreeSet};

use pcb_catalog::graph::connected_components;
use pcb_catalog::{InterfaceFamily, InterfacePinId};
use petgraph::graphmap::UnGraphMap;

use crate::component::{Circuit, ComponentId, ComponentPin, FragmentId, InterfaceRef, Node};
use crate::error::{Result, SynthError};

/// A resolved fragment as part of a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BusMember {
    pub fragment: FragmentId,
    pub from_interface: InterfaceRef,
    pub to_interface: InterfaceRef,
    pub from: ComponentId,
    pub to: ComponentId,
}

/// A maximal set of bus fragments connected through shared interfaces.
#[derive(Debug, Clone, Default)]
pub struct Bus {
    members: Vec<BusMember>,
    reference: String,
}

impl PartialEq for Bus {
    /// Buses compare equal when they share a fragment.
    fn eq(&self, other: &Self) -> bool {
        self.overlaps(other)
    }
}

impl Bus {
    pub fn new(circuit: &Circuit, mut members: Vec<BusMember>) -> Result<Self> {
        members.sort();
        members.dedup();
        let reference = match members.first() {
            Some(member) => circuit.fragment(member.fragment)?.reference(circuit)?,
            None => String::new(),
        };
        Ok(Self { members, reference })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[BusMember] {
        &self.members
    }

    pub fn fragments(&self) -> impl Iterator<Item = FragmentId> + '_ {
        self.members.iter().map(|m| m.fragment)
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn overlaps(&self, other: &Bus) -> bool {
        self.members
            .iter()
            .any(|m| other.members.iter().any(|o| o.fragment == m.fragment))
    }

    pub fn source_fragments<'a>(&'a self, circuit: &'a Circuit) -> impl Iterator<Item = &'a BusMember> {
        self.members.iter().filter(|m| circuit.is_part(m.from))
    }

    pub fn target_fragments<'a>(&'a self, circuit: &'a Circuit) -> impl Iterator<Item = &'a BusMember> {
        self.members.iter().filter(|m| circuit.is_part(m.to))
    }

    /// Interfaces on parts, i.e. not on subcircuit boundaries.
    pub fn physical_interfaces(&self, circuit: &Circuit) -> BTreeSet<InterfaceRef> {
        let mut out = BTreeSet::new();
        for member in &self.members {
            if circuit.is_part(member.from) {
                out.insert(member.from_interface);
            }
            if circuit.is_part(member.to) {
                out.insert(member.to_interface);
            }
        }
        out
    }

    pub fn interfaces(&self) -> BTreeSet<InterfaceRef> {
        self.members
            .iter()
            .flat_map(|m| [m.from_interface, m.to_interface])
            .collect()
    }

    pub fn source_interfaces(&self, circuit: &Circuit) -> BTreeSet<InterfaceRef> {
        self.source_fragments(circuit)
            .map(|m| m.from_interface)
            .collect()
    }

    pub fn target_interfaces(&self, circuit: &Circuit) -> BTreeSet<InterfaceRef> {
        self.target_fragments(circuit).map(|m| m.to_interface).collect()
    }

    pub fn source_components(&self, circuit: &Circuit) -> BTreeSet<ComponentId> {
        self.source_fragments(circuit).map(|m| m.from).collect()
    }

    pub fn target_components(&self, circuit: &Circuit) -> BTreeSet<ComponentId> {
        self.target_fragments(circuit).map(|m| m.to).collect()
    }

    pub fn physical_components(&self, circuit: &Circuit) -> BTreeSet<ComponentId> {
        self.physical_interfaces(circuit)
            .into_iter()
            .map(|i| i.component)
            .collect()
    }

    fn interface_pins_of(
        circuit: &Circuit,
        interfaces: BTreeSet<InterfaceRef>,
    ) -> Result<BTreeSet<InterfacePinId>> {
        let mut out = BTreeSet::new();
        for iref in interfaces {
            out.extend(circuit.interface(iref)?.active_interface_pins());
        }
        Ok(out)
    }

    fn pins_of(circuit: &Circuit, interfaces: BTreeSet<InterfaceRef>) -> Result<BTreeSet<ComponentPin>> {
        let mut out = BTreeSet::new();
        for iref in interfaces {
            out.extend(circuit.interface(iref)?.active_pins(None, None));
        }
        Ok(out)
    }

    pub fn source_interface_pins(&self, circuit: &Circuit) -> Result<BTreeSet<InterfacePinId>> {
        Self::interface_pins_of(circuit, self.source_interfaces(circuit))
    }

    pub fn target_interface_pins(&self, circuit: &Circuit) -> Result<BTreeSet<InterfacePinId>> {
        Self::interface_pins_of(circuit, self.target_interfaces(circuit))
    }

    pub fn physical_interface_pins(&self, circuit: &Circuit) -> Result<BTreeSet<InterfacePinId>> {
        Self::interface_pins_of(circuit, self.physical_interfaces(circuit))
    }

    pub fn source_pins(&self, circuit: &Circuit) -> Result<BTreeSet<ComponentPin>> {
        Self::pins_of(circuit, self.source_interfaces(circuit))
    }

    pub fn target_pins(&self, circuit: &Circuit) -> Result<BTreeSet<ComponentPin>> {
        Self::pins_of(circuit, self.target_interfaces(circuit))
    }

    pub fn physical_pins(&self, circuit: &Circuit) -> Result<BTreeSet<ComponentPin>> {
        Self::pins_of(circuit, self.physical_interfaces(circuit))
    }

    /// Driven pin to the pins driving it, over all fragments.
    pub fn reverse_connections(
        &self,
        circuit: &Circuit,
    ) -> Result<BTreeMap<ComponentPin, BTreeSet<ComponentPin>>> {
        let mut out: BTreeMap<ComponentPin, BTreeSet<ComponentPin>> = BTreeMap::new();
        for fragment in self.fragments() {
            for (to, froms) in circuit.fragment(fragment)?.reverse_connections() {
                out.entry(to).or_default().extend(froms);
            }
        }
        Ok(out)
    }

    /// The pins at the requesting end of the fragment chains reaching `pin`.
    pub fn source_pins_for_pin(
        &self,
        circuit: &Circuit,
        pin: ComponentPin,
    ) -> Result<BTreeSet<ComponentPin>> {
        let reverse = self.reverse_connections(circuit)?;
        let mut sources = BTreeSet::new();
        let mut visited = BTreeSet::new();
        let mut stack = vec![pin];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            match reverse.get(&current) {
                Some(drivers) => stack.extend(drivers.iter().copied()),
                None => {
                    sources.insert(current);
                }
            }
        }
        Ok(sources)
    }

    /// Family of the bus' physical interfaces. An empty bus is in the
    /// do-not-connect family.
    pub fn interface_family<'c>(&self, circuit: &'c Circuit) -> Result<&'c InterfaceFamily> {
        let catalog = circuit.catalog();
        let mut interfaces = self.physical_interfaces(circuit);
        if interfaces.is_empty() {
            interfaces = self.interfaces();
        }
        let mut families = BTreeSet::new();
        for iref in interfaces {
            families.insert(catalog.family_of(circuit.interface(iref)?.interface_type())?.key);
        }
        let mut iter = families.into_iter();
        match (iter.next(), iter.next()) {
            (None, _) => Ok(catalog.do_not_connect_family()),
            (Some(key), None) => Ok(catalog.family(key)?),
            _ => Err(SynthError::MixedFamilies(self.describe(circuit))),
        }
    }

    pub fn describe(&self, circuit: &Circuit) -> String {
        if self.members.is_empty() {
            return "<empty bus>".to_owned();
        }
        let interfaces: Vec<String> = self
            .interfaces()
            .into_iter()
            .map(|i| circuit.interface_label(i))
            .collect();
        format!("{} [{}]", self.reference, interfaces.join(", "))
    }
}

impl Circuit {
    /// Buses formed by the bus requirements of the nodes below `component`:
    /// its children, or all descendants when `deep` is set.
    pub fn buses(&self, component: ComponentId, deep: bool) -> Result<Vec<Bus>> {
        let descendants: Vec<ComponentId> = self
            .iterate_tree(component, false)
            .into_iter()
            .filter(|(parent, _)| deep || *parent == Some(component))
            .map(|(_, id)| id)
            .collect();

        let mut graph: UnGraphMap<InterfaceRef, ()> = UnGraphMap::new();
        let mut touching: BTreeMap<InterfaceRef, BTreeSet<BusMember>> = BTreeMap::new();
        for id in descendants {
            let node = match self.node(id)? {
                Node::Component(c) => c,
                Node::Filter(f) => return Err(SynthError::UnresolvedFilter(f.reference.clone())),
            };
            for fragment_id in &node.external_bus_requirements {
                let fragment = self.fragment(*fragment_id)?;
                let (Some(from), Some(to)) =
                    (fragment.from_interface(self)?, fragment.to_interface(self)?)
                else {
                    return Err(SynthError::UnresolvedFragment(fragment.describe(self)));
                };
                graph.add_edge(from, to, ());
                let member = BusMember {
                    fragment: *fragment_id,
                    from_interface: from,
                    to_interface: to,
                    from: fragment.from,
                    to: fragment.to,
                };
                touching.entry(from).or_default().insert(member);
                touching.entry(to).or_default().insert(member);
            }
        }

        let buses = connected_components(&graph)
            .into_iter()
            .map(|interfaces| {
                let members: BTreeSet<BusMember> = interfaces
                    .iter()
                    .filter_map(|i| touching.get(i))
                    .flatten()
                    .copied()
                    .collect();
                Bus::new(self, members.into_iter().collect())
            })
            .collect::<Result<Vec<_>>>()?;
        log::debug!(
            "Found {} bus(es) below {}",
            buses.len(),
            self.reference(component)
        );
        Ok(buses)
    }

    pub fn internal_buses(&self, component: ComponentId) -> Result<Vec<Bus>> {
        self.buses(component, false)
    }

    pub fn flattened_buses(&self, component: ComponentId) -> Result<Vec<Bus>> {
        self.buses(component, true)
    }
}
