//! Net synthesis.
//!
//! Every part pin starts as a node of an undirected pin graph. Local
//! ancillaries are applied first, in latency then type order, followed by the
//! pin connections of every bus, one logical network at a time. Connected
//! components of the graph become nets, which are split per board and named.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use pcb_catalog::graph::connected_components;
use pcb_catalog::{InterfacePinId, LogicalNetwork, NaturalKey};
use petgraph::graphmap::UnGraphMap;

use crate::ancillary::{AncillaryAppliesTo, AppliedConnection};
use crate::bus::Bus;
use crate::component::{Circuit, ComponentId, ComponentPin, FragmentId};
use crate::error::{Result, SynthError};
use crate::naming::{self, NetNameTemplate, NetShape};
use crate::spec::Spec;

type PinKey = (String, NaturalKey, String);

/// A set of electrically connected pins on one board.
#[derive(Debug, Clone)]
pub struct SmartNet {
    pins: BTreeSet<ComponentPin>,
    bus: Bus,
    board: Option<ComponentId>,
    shape: NetShape,
    first_pin: PinKey,
    name: Option<String>,
}

impl SmartNet {
    /// `shape` is worked out on the whole connected group, before it was
    /// split by board.
    fn new(
        circuit: &Circuit,
        pins: BTreeSet<ComponentPin>,
        bus: Bus,
        board: Option<ComponentId>,
        shape: NetShape,
    ) -> Result<Self> {
        let mut first_pin: Option<PinKey> = None;
        for pin in &pins {
            let p = circuit.pin(*pin)?;
            let key = (
                circuit.reference(pin.component).to_owned(),
                NaturalKey::new(p.number.clone()),
                p.name.clone(),
            );
            if first_pin.as_ref().is_none_or(|k| key < *k) {
                first_pin = Some(key);
            }
        }
        Ok(Self {
            pins,
            bus,
            board,
            shape,
            first_pin: first_pin.unwrap_or_default(),
            name: None,
        })
    }

    pub fn pins(&self) -> &BTreeSet<ComponentPin> {
        &self.pins
    }

    pub fn contains(&self, pin: ComponentPin) -> bool {
        self.pins.contains(&pin)
    }

    /// The bus the net belongs to; empty for unconnected pins.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn board(&self) -> Option<ComponentId> {
        self.board
    }

    pub fn template(&self) -> Option<&NetNameTemplate> {
        self.shape.template.as_ref()
    }

    pub fn identifier(&self) -> &str {
        &self.shape.identifier
    }

    pub fn is_global(&self) -> bool {
        self.shape.is_global
    }

    pub fn is_shared(&self) -> bool {
        self.shape.is_shared
    }

    pub fn logical_network(&self) -> Option<&LogicalNetwork> {
        self.shape.logical_network.as_ref()
    }

    pub fn non_ancillary_pins(&self) -> &BTreeSet<ComponentPin> {
        &self.shape.non_ancillary_pins
    }

    /// The requesting pin the name of a non-shared net is derived from.
    pub fn source_pin(&self) -> Option<ComponentPin> {
        self.shape.source_pin
    }

    /// Name of the net; unconnected pins have none.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn components(&self) -> BTreeSet<ComponentId> {
        self.pins.iter().map(|p| p.component).collect()
    }

    /// Interface pins the net's pins are actively used as.
    pub fn interface_pins(&self, circuit: &Circuit) -> Result<BTreeSet<InterfacePinId>> {
        let mut out = BTreeSet::new();
        for pin in &self.pins {
            out.extend(circuit.get_assigned_interface_pin(*pin)?);
        }
        Ok(out)
    }

    fn order_key(&self) -> (bool, Option<&NetNameTemplate>, &str, &PinKey) {
        (
            self.pins.is_empty(),
            self.template(),
            self.identifier(),
            &self.first_pin,
        )
    }
}

/// Pin graph under construction, with the masks left by output connections.
#[derive(Debug, Default)]
struct PinGraph {
    graph: UnGraphMap<ComponentPin, ()>,
    pin_mask: BTreeMap<ComponentPin, ComponentPin>,
    original_pins: BTreeMap<ComponentPin, ComponentPin>,
}

impl PinGraph {
    fn new(circuit: &Circuit) -> Result<Self> {
        let mut graph = UnGraphMap::new();
        for part in circuit.iterate_parts(circuit.root()) {
            for pin in &circuit.component(part)?.pins {
                graph.add_node(ComponentPin {
                    component: part,
                    pin: pin.id,
                });
            }
        }
        Ok(Self {
            graph,
            ..Self::default()
        })
    }

    fn masked(&self, pin: ComponentPin) -> ComponentPin {
        self.pin_mask.get(&pin).copied().unwrap_or(pin)
    }

    fn original(&self, pin: ComponentPin) -> ComponentPin {
        self.original_pins.get(&pin).copied().unwrap_or(pin)
    }

    fn connect(&mut self, a: ComponentPin, b: ComponentPin) {
        let (a, b) = (self.masked(a), self.masked(b));
        if a != b {
            self.graph.add_edge(a, b, ());
        }
    }

    fn merge(&mut self, applied: AppliedConnection) {
        for (a, b) in applied.pin_connections {
            self.connect(a, b);
        }
        for (pin, replacement) in applied.pin_mask {
            let original = self.original(pin);
            self.original_pins.insert(replacement, original);
            self.pin_mask.insert(pin, replacement);
        }
    }

    /// Interface and pin ancillaries.
    fn apply_local_ancillaries(&mut self, circuit: &Circuit) -> Result<()> {
        let mut ancillaries = Vec::new();
        for part in circuit.iterate_parts(circuit.root()) {
            let Some(ancillary) = &circuit.component(part)?.ancillary else {
                continue;
            };
            if matches!(
                ancillary.applies_to(),
                AncillaryAppliesTo::Interface | AncillaryAppliesTo::Pins
            ) {
                ancillaries.push((part, ancillary));
            }
        }
        ancillaries.sort_by(|a, b| a.1.ordering_cmp(b.1));
        for (part, ancillary) in ancillaries {
            log::debug!(
                "Applying {} as {}",
                circuit.reference(part),
                ancillary.describe(circuit)
            );
            self.merge(ancillary.apply(circuit, part)?);
        }
        Ok(())
    }

    fn connect_bus(&mut self, spec: &Spec, bus: &Bus) -> Result<()> {
        let circuit = spec.circuit();
        let catalog = circuit.catalog();
        let family = bus.interface_family(circuit)?;
        let sources = bus.source_interfaces(circuit);

        let mut networks: BTreeMap<LogicalNetwork, NetworkPins> = BTreeMap::new();
        for iref in bus.physical_interfaces(circuit) {
            let is_requesting = sources.contains(&iref);
            let interface = circuit.interface(iref)?;
            for interface_pin in interface.active_interface_pins() {
                let network = catalog.logical_network(family.key, interface_pin, is_requesting)?;
                let pins = interface.active_pins(Some(interface_pin), None);
                let entry = networks.entry(network.clone()).or_default();
                entry.is_requested |=
                    is_requesting && network.requesting_pins().contains(&interface_pin);
                entry.pins.extend(pins);
            }
        }

        let mut ancillaries = Vec::new();
        for id in spec.bus_ancillary_components(bus, None)? {
            if let Some(ancillary) = &circuit.component(id)?.ancillary {
                ancillaries.push((id, ancillary));
            }
        }
        ancillaries.sort_by(|a, b| a.1.ordering_cmp(b.1));

        for (network, pins) in networks {
            if pins.is_requested {
                for (id, ancillary) in &ancillaries {
                    for connection in &ancillary.connections {
                        let serves = connection
                            .interface_pin()
                            .is_some_and(|ip| network.requesting_pins().contains(&ip));
                        if serves {
                            self.merge(connection.apply(
                                circuit,
                                *id,
                                ancillary,
                                Some(&pins.pins),
                            )?);
                        }
                    }
                }
            }
            let mut iter = pins.pins.iter().copied();
            if let Some(first) = iter.next() {
                for pin in iter {
                    self.connect(first, pin);
                }
            }
            log::trace!("Connected {} over {}", network, bus.reference());
        }
        Ok(())
    }

    /// Splits the graph into pin groups and finds the bus of each.
    fn partition(
        &self,
        spec: &Spec,
        buses: &[Bus],
        warnings: &mut Vec<String>,
    ) -> Result<Vec<PinGroup>> {
        let circuit = spec.circuit();
        let mut bus_of_pin: BTreeMap<ComponentPin, usize> = BTreeMap::new();
        for (index, bus) in buses.iter().enumerate() {
            for pin in bus.physical_pins(circuit)? {
                bus_of_pin.insert(pin, index);
            }
        }

        let mut out = Vec::new();
        for group in connected_components(&self.graph) {
            let group: BTreeSet<ComponentPin> = group.into_iter().collect();
            if let Some(pin) = group.iter().find(|p| !circuit.is_part(p.component)) {
                return Err(SynthError::NonPartPin(circuit.pin_label(*pin)));
            }

            let bus = if group.len() > 1 {
                let owners: BTreeSet<usize> = group
                    .iter()
                    .filter_map(|pin| {
                        bus_of_pin
                            .get(&self.original(*pin))
                            .or_else(|| bus_of_pin.get(pin))
                            .copied()
                    })
                    .collect();
                let mut iter = owners.iter();
                match (iter.next(), iter.next()) {
                    (None, _) => {
                        let labels = naming::describe_pins(circuit, &group);
                        if spec.config().strict {
                            return Err(SynthError::UnbussedPins(labels));
                        }
                        warnings.push(format!(
                            "Failed to connect pins {labels}: no bus could be found"
                        ));
                        Bus::empty()
                    }
                    (Some(index), None) => buses[*index].clone(),
                    _ => {
                        return Err(SynthError::MultipleBuses(naming::describe_pins(
                            circuit, &group,
                        )));
                    }
                }
            } else {
                Bus::empty()
            };

            out.push(PinGroup { pins: group, bus });
        }
        Ok(out)
    }
}

struct PinGroup {
    pins: BTreeSet<ComponentPin>,
    bus: Bus,
}

/// Active pins of one logical network on a bus.
#[derive(Debug, Default)]
struct NetworkPins {
    is_requested: bool,
    pins: BTreeSet<ComponentPin>,
}

/// The synthesized nets of a circuit, named and ordered.
#[derive(Debug, Clone)]
pub struct SmartNetlist {
    nets: Vec<SmartNet>,
    labels: BTreeMap<ComponentPin, String>,
    board_labels: BTreeMap<Option<ComponentId>, String>,
    pin_mask: BTreeMap<ComponentPin, ComponentPin>,
    original_pins: BTreeMap<ComponentPin, ComponentPin>,
}

impl SmartNetlist {
    /// Synthesizes the nets of a fully resolved circuit. Warnings are added to
    /// `spec`.
    pub fn from_spec(spec: &mut Spec) -> Result<Self> {
        let (netlist, warnings) = Self::synthesize(spec)?;
        for warning in warnings {
            spec.add_warning(warning);
        }
        Ok(netlist)
    }

    fn synthesize(spec: &Spec) -> Result<(Self, Vec<String>)> {
        let circuit = spec.circuit();
        let root = circuit.root();
        if let Some(filter) = circuit.unresolved_filters(root).first() {
            return Err(SynthError::UnresolvedFilter(
                circuit.reference(*filter).to_owned(),
            ));
        }

        let buses = circuit.flattened_buses(root)?;
        let mut graph = PinGraph::new(circuit)?;
        graph.apply_local_ancillaries(circuit)?;
        for bus in &buses {
            graph.connect_bus(spec, bus)?;
        }

        let mut warnings = Vec::new();
        let mut nets = Vec::new();
        for group in graph.partition(spec, &buses, &mut warnings)? {
            let shape = naming::shape(circuit, &group.pins, &group.bus)?;
            if !spec.config().split_by_board {
                nets.push(SmartNet::new(circuit, group.pins, group.bus, None, shape)?);
                continue;
            }
            let mut per_board: BTreeMap<Option<ComponentId>, BTreeSet<ComponentPin>> =
                BTreeMap::new();
            for pin in group.pins {
                per_board
                    .entry(spec.board(pin.component))
                    .or_default()
                    .insert(pin);
            }
            for (board, pins) in per_board {
                nets.push(SmartNet::new(
                    circuit,
                    pins,
                    group.bus.clone(),
                    board,
                    shape.clone(),
                )?);
            }
        }
        nets.sort_by(|a, b| {
            a.board
                .cmp(&b.board)
                .then_with(|| a.order_key().cmp(&b.order_key()))
        });

        let (names, naming_warnings) = naming::assign_names(&nets);
        warnings.extend(naming_warnings);
        for (net, name) in nets.iter_mut().zip(names) {
            net.name = name;
        }

        let mut labels = BTreeMap::new();
        let mut board_labels = BTreeMap::new();
        for net in &nets {
            board_labels
                .entry(net.board)
                .or_insert_with(|| spec.board_reference(net.board).to_owned());
            for pin in &net.pins {
                labels.insert(*pin, circuit.pin_label(*pin));
            }
        }
        log::debug!(
            "Synthesized {} net(s) from {} bus(es)",
            nets.len(),
            buses.len()
        );

        Ok((
            Self {
                nets,
                labels,
                board_labels,
                pin_mask: graph.pin_mask,
                original_pins: graph.original_pins,
            },
            warnings,
        ))
    }

    pub fn nets(&self) -> &[SmartNet] {
        &self.nets
    }

    pub fn len(&self) -> usize {
        self.nets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }

    pub fn net_name<'a>(&self, net: &'a SmartNet) -> Option<&'a str> {
        net.name()
    }

    pub fn net_by_name(&self, name: &str) -> Option<&SmartNet> {
        self.nets.iter().find(|n| n.name() == Some(name))
    }

    /// Nets of one board, in net order.
    pub fn ordered_nets(&self, board: Option<ComponentId>) -> Vec<&SmartNet> {
        self.nets.iter().filter(|n| n.board == board).collect()
    }

    /// Nets grouped by the bus they belong to. Unbussed nets are left out.
    pub fn nets_by_bus(&self) -> Vec<(&Bus, Vec<&SmartNet>)> {
        let mut groups: BTreeMap<Vec<FragmentId>, (&Bus, Vec<&SmartNet>)> = BTreeMap::new();
        for net in &self.nets {
            if net.bus.is_empty() {
                continue;
            }
            groups
                .entry(net.bus.fragments().collect())
                .or_insert_with(|| (&net.bus, Vec::new()))
                .1
                .push(net);
        }
        groups.into_values().collect()
    }

    /// Every `(net, pin)` pair.
    pub fn pins_by_net(&self) -> impl Iterator<Item = (&SmartNet, ComponentPin)> {
        self.nets
            .iter()
            .flat_map(|net| net.pins.iter().map(move |pin| (net, *pin)))
    }

    /// Nets holding `pin`; more than one only when it was split by board.
    pub fn pin_nets(&self, pin: ComponentPin) -> Vec<&SmartNet> {
        self.nets.iter().filter(|n| n.contains(pin)).collect()
    }

    pub fn components(&self) -> BTreeSet<ComponentId> {
        self.nets.iter().flat_map(SmartNet::components).collect()
    }

    /// Pins replaced downstream by an ancillary output pin.
    pub fn pin_mask(&self) -> &BTreeMap<ComponentPin, ComponentPin> {
        &self.pin_mask
    }

    /// Ancillary output pin to the original pin it stands in for.
    pub fn original_pins(&self) -> &BTreeMap<ComponentPin, ComponentPin> {
        &self.original_pins
    }

    /// Sorted `REF.PIN` labels of a net's pins.
    pub fn pin_labels(&self, net: &SmartNet) -> Vec<String> {
        let mut labels: Vec<String> = net
            .pins
            .iter()
            .map(|p| self.labels.get(p).cloned().unwrap_or_default())
            .collect();
        labels.sort();
        labels
    }

    /// Named nets as name to sorted pin labels.
    pub fn named_nets(&self) -> BTreeMap<String, Vec<String>> {
        self.nets
            .iter()
            .filter_map(|net| Some((net.name()?.to_owned(), self.pin_labels(net))))
            .collect()
    }

    /// One line per net, grouped by board.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut board = None;
        for net in &self.nets {
            if board != Some(net.board) {
                board = Some(net.board);
                let label = self
                    .board_labels
                    .get(&net.board)
                    .map(String::as_str)
                    .unwrap_or("?");
                let _ = writeln!(out, "[{label}]");
            }
            let _ = writeln!(
                out,
                "{}: {}",
                net.name().unwrap_or("-"),
                self.pin_labels(net).join(", ")
            );
        }
        out
    }
}
