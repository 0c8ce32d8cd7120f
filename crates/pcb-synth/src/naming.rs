use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use pcb_catalog::{LogicalNetwork, NaturalKey};

use crate::bus::Bus;
use crate::component::{Circuit, ComponentId, ComponentPin};
use crate::error::{Result, SynthError};
use crate::netlist::SmartNet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexBase {
    Zero,
    One,
}

/// Net name with a slot for an index that is only filled in when several
/// nets on a board produce the same template.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NetNameTemplate {
    prefix: String,
    index: IndexBase,
    suffix: String,
}

impl NetNameTemplate {
    /// `<LABEL><index0>[_<PIN>]`
    pub fn shared(family_label: &str, pin_label: Option<&str>) -> Self {
        Self {
            prefix: family_label.to_uppercase(),
            index: IndexBase::Zero,
            suffix: pin_label
                .map(|p| format!("_{}", p.to_uppercase()))
                .unwrap_or_default(),
        }
    }

    /// `<FUNCTION><index1>_<PIN>`
    pub fn non_shared(function: &str, pin_name: &str) -> Self {
        Self {
            prefix: function.to_uppercase(),
            index: IndexBase::One,
            suffix: format!("_{}", pin_name.to_uppercase()),
        }
    }

    pub fn render(&self, index: Option<usize>) -> String {
        let index = match (index, self.index) {
            (None, _) => String::new(),
            (Some(i), IndexBase::Zero) => i.to_string(),
            (Some(i), IndexBase::One) => (i + 1).to_string(),
        };
        format!("{}{}{}", self.prefix, index, self.suffix)
    }
}

impl fmt::Display for NetNameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = match self.index {
            IndexBase::Zero => "<index0>",
            IndexBase::One => "<index1>",
        };
        write!(f, "{}{}{}", self.prefix, slot, self.suffix)
    }
}

/// Naming facts of a group of connected pins.
#[derive(Debug, Clone)]
pub struct NetShape {
    pub template: Option<NetNameTemplate>,
    pub identifier: String,
    pub non_ancillary_pins: BTreeSet<ComponentPin>,
    pub logical_network: Option<LogicalNetwork>,
    pub is_shared: bool,
    pub source_pin: Option<ComponentPin>,
    pub is_global: bool,
}

/// Pins that stand for the net: ordinary part pins, plus the bus pins that
/// ancillaries in the net are attached to.
pub fn non_ancillary_pins(
    circuit: &Circuit,
    pins: &BTreeSet<ComponentPin>,
    bus: &Bus,
) -> Result<BTreeSet<ComponentPin>> {
    let bus_pins = if bus.is_empty() {
        BTreeSet::new()
    } else {
        bus.physical_pins(circuit)?
    };
    let mut out = BTreeSet::new();
    for pin in pins {
        match &circuit.component(pin.component)?.ancillary {
            None => {
                out.insert(*pin);
            }
            Some(ancillary) => {
                out.extend(
                    ancillary
                        .parent_pins(circuit)?
                        .into_iter()
                        .filter(|p| bus_pins.contains(p)),
                );
            }
        }
    }
    Ok(out)
}

/// A net is global when it reaches more than one non-ancillary component,
/// counting ancillaries as their parent.
pub fn is_global(circuit: &Circuit, pins: &BTreeSet<ComponentPin>) -> Result<bool> {
    let mut components: BTreeSet<ComponentId> = BTreeSet::new();
    for pin in pins {
        match &circuit.component(pin.component)?.ancillary {
            None => {
                components.insert(pin.component);
            }
            Some(ancillary) => {
                components.extend(ancillary.parent_pins(circuit)?.iter().map(|p| p.component));
            }
        }
    }
    Ok(components.len() > 1)
}

fn pin_order_key(circuit: &Circuit, pin: ComponentPin) -> Result<(String, NaturalKey, String)> {
    let p = circuit.pin(pin)?;
    Ok((
        circuit.reference(pin.component).to_owned(),
        NaturalKey::new(p.number.clone()),
        p.name.clone(),
    ))
}

/// The pin that sorts first by component reference, pin number, pin name.
pub fn lowest_pin(circuit: &Circuit, pins: &BTreeSet<ComponentPin>) -> Result<Option<ComponentPin>> {
    let mut best: Option<((String, NaturalKey, String), ComponentPin)> = None;
    for pin in pins {
        let key = pin_order_key(circuit, *pin)?;
        if best.as_ref().is_none_or(|(k, _)| key < *k) {
            best = Some((key, *pin));
        }
    }
    Ok(best.map(|(_, pin)| pin))
}

pub fn describe_pins(circuit: &Circuit, pins: &BTreeSet<ComponentPin>) -> String {
    let mut labels: Vec<String> = pins.iter().map(|p| circuit.pin_label(*p)).collect();
    labels.sort();
    labels.join(", ")
}

/// Works out the template and identifier of a group of connected pins.
pub fn shape(circuit: &Circuit, pins: &BTreeSet<ComponentPin>, bus: &Bus) -> Result<NetShape> {
    let non_ancillary = non_ancillary_pins(circuit, pins, bus)?;
    // Pins joined outside any bus (reference rails) are never series segments.
    let is_global = (pins.len() > 1 && bus.is_empty()) || is_global(circuit, pins)?;

    if pins.len() <= 1 {
        let identifier = pins
            .first()
            .map(|p| circuit.pin_label(*p))
            .unwrap_or_default();
        return Ok(NetShape {
            template: None,
            identifier,
            non_ancillary_pins: non_ancillary,
            logical_network: None,
            is_shared: false,
            source_pin: None,
            is_global,
        });
    }

    if !bus.is_empty() {
        if let Some(shape) = bussed_shape(circuit, pins, bus, &non_ancillary, is_global)? {
            return Ok(shape);
        }
    }

    let candidates = if non_ancillary.is_empty() {
        pins
    } else {
        &non_ancillary
    };
    let pin = lowest_pin(circuit, candidates)?
        .ok_or_else(|| SynthError::NoSourcePin(describe_pins(circuit, pins)))?;
    let component = circuit.component(pin.component)?;
    Ok(NetShape {
        template: Some(NetNameTemplate::non_shared(
            &component.function,
            &circuit.pin(pin)?.name,
        )),
        identifier: component.reference.clone(),
        non_ancillary_pins: non_ancillary,
        logical_network: None,
        is_shared: false,
        source_pin: Some(pin),
        is_global,
    })
}

fn bussed_shape(
    circuit: &Circuit,
    pins: &BTreeSet<ComponentPin>,
    bus: &Bus,
    non_ancillary: &BTreeSet<ComponentPin>,
    is_global: bool,
) -> Result<Option<NetShape>> {
    let catalog = circuit.catalog();
    let mut anchor = None;
    for pin in non_ancillary {
        if let Some(interface_pin) = circuit.get_assigned_interface_pin(*pin)? {
            anchor = Some((*pin, interface_pin));
            break;
        }
    }
    let Some((pin, interface_pin)) = anchor else {
        return Ok(None);
    };

    let family = bus.interface_family(circuit)?;
    let is_requesting = bus.source_components(circuit).contains(&pin.component);
    let network = catalog
        .logical_network(family.key, interface_pin, is_requesting)?
        .clone();
    let mut is_shared = false;
    for p in network.pins() {
        is_shared |= catalog.interface_pin(p)?.is_shared();
    }

    if is_shared {
        let mut references = BTreeSet::new();
        for p in network.requesting_pins() {
            references.insert(catalog.interface_pin(*p)?.reference.clone());
        }
        let network_count = catalog.logical_networks(family.key)?.len();
        let pin_label = references.first().filter(|_| network_count != 1);
        return Ok(Some(NetShape {
            template: Some(NetNameTemplate::shared(
                &family.label,
                pin_label.map(String::as_str),
            )),
            identifier: bus.reference().to_owned(),
            non_ancillary_pins: non_ancillary.clone(),
            logical_network: Some(network),
            is_shared: true,
            source_pin: None,
            is_global,
        }));
    }

    let mut sources: Vec<(String, String, ComponentPin)> = Vec::new();
    for p in non_ancillary {
        for source in bus.source_pins_for_pin(circuit, *p)? {
            if circuit.is_ancillary(source.component) {
                continue;
            }
            sources.push((
                circuit.pin(source)?.name.clone(),
                circuit.reference(source.component).to_owned(),
                source,
            ));
        }
    }
    sources.sort();
    let (pin_name, reference, source) = sources
        .into_iter()
        .next()
        .ok_or_else(|| SynthError::NoSourcePin(describe_pins(circuit, pins)))?;
    let component = circuit.component(source.component)?;

    Ok(Some(NetShape {
        template: Some(NetNameTemplate::non_shared(&component.function, &pin_name)),
        identifier: reference,
        non_ancillary_pins: non_ancillary.clone(),
        logical_network: Some(network),
        is_shared: false,
        source_pin: Some(source),
        is_global,
    }))
}

/// Names for `nets`, which must be in net order.
///
/// Global nets take their template with an index when several identifiers on
/// the board share it. Local nets take the global name plus `_S`, numbered
/// when several local nets share one global name. Remaining clashes get a
/// numeric suffix and a warning.
pub fn assign_names(nets: &[SmartNet]) -> (Vec<Option<String>>, Vec<String>) {
    let mut identifiers: BTreeMap<(Option<ComponentId>, &NetNameTemplate), BTreeSet<&str>> =
        BTreeMap::new();
    for net in nets {
        if let Some(template) = net.template() {
            identifiers
                .entry((net.board(), template))
                .or_default()
                .insert(net.identifier());
        }
    }

    let global_name = |net: &SmartNet| -> Option<String> {
        let template = net.template()?;
        let ids = identifiers.get(&(net.board(), template))?;
        let index = if ids.len() > 1 {
            ids.iter().position(|id| *id == net.identifier())
        } else {
            None
        };
        Some(template.render(index))
    };

    let mut names: Vec<Option<String>> = vec![None; nets.len()];
    let mut locals: BTreeMap<(Option<ComponentId>, String), Vec<usize>> = BTreeMap::new();
    for (i, net) in nets.iter().enumerate() {
        let Some(global) = global_name(net) else {
            continue;
        };
        if net.is_global() {
            names[i] = Some(global);
        } else {
            locals.entry((net.board(), global)).or_default().push(i);
        }
    }
    for ((_, global), indices) in locals {
        if let [only] = indices.as_slice() {
            names[*only] = Some(format!("{global}_S"));
        } else {
            for (k, i) in indices.into_iter().enumerate() {
                names[i] = Some(format!("{global}_S{k}"));
            }
        }
    }

    let mut warnings = Vec::new();
    let mut by_name: BTreeMap<(Option<ComponentId>, String), Vec<usize>> = BTreeMap::new();
    for (i, name) in names.iter().enumerate() {
        if let Some(name) = name {
            by_name
                .entry((nets[i].board(), name.clone()))
                .or_default()
                .push(i);
        }
    }
    for ((_, name), indices) in by_name {
        if indices.len() < 2 {
            continue;
        }
        warnings.push(format!(
            "Net name {name} is shared by {} nets, adding numeric suffixes",
            indices.len()
        ));
        for (k, i) in indices.into_iter().enumerate() {
            names[i] = Some(format!("{name}_{}", k + 1));
        }
    }

    (names, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_render_with_optional_index() {
        let shared = NetNameTemplate::shared("Spi", Some("sck"));
        assert_eq!(shared.to_string(), "SPI<index0>_SCK");
        assert_eq!(shared.render(None), "SPI_SCK");
        assert_eq!(shared.render(Some(1)), "SPI1_SCK");

        let single = NetNameTemplate::shared("I2C", None);
        assert_eq!(single.render(Some(0)), "I2C0");

        let gpio = NetNameTemplate::non_shared("mcu", "pa1");
        assert_eq!(gpio.to_string(), "MCU<index1>_PA1");
        assert_eq!(gpio.render(None), "MCU_PA1");
        assert_eq!(gpio.render(Some(0)), "MCU1_PA1");
    }
}
