use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use pcb_catalog::{InterfacePinId, NaturalKey, PinAssignmentId, PinId, ReferenceKind};

use crate::bus::Bus;
use crate::component::{Circuit, ComponentId, ComponentInterface, ComponentPin, InterfaceRef};
use crate::error::{Result, SynthError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AncillaryType {
    Custom,
    SeriesCapacitor,
    SeriesResistor,
    Ferrite,
    Decoupling,
    PullupResistor,
    PullupCapacitor,
    PulldownResistor,
    PulldownCapacitor,
    Connector,
}

impl AncillaryType {
    /// Application order among ancillaries with the same latency.
    pub fn rank(self) -> u8 {
        match self {
            AncillaryType::Custom => 0,
            AncillaryType::SeriesCapacitor => 1,
            AncillaryType::SeriesResistor => 2,
            AncillaryType::Ferrite => 3,
            AncillaryType::Decoupling => 4,
            AncillaryType::PullupResistor => 5,
            AncillaryType::PullupCapacitor => 6,
            AncillaryType::PulldownResistor => 7,
            AncillaryType::PulldownCapacitor => 8,
            AncillaryType::Connector => 9,
        }
    }
}

impl fmt::Display for AncillaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AncillaryType::Custom => "custom",
            AncillaryType::SeriesCapacitor => "series capacitor",
            AncillaryType::SeriesResistor => "series resistor",
            AncillaryType::Ferrite => "ferrite",
            AncillaryType::Decoupling => "decoupling",
            AncillaryType::PullupResistor => "pull-up resistor",
            AncillaryType::PullupCapacitor => "pull-up capacitor",
            AncillaryType::PulldownResistor => "pull-down resistor",
            AncillaryType::PulldownCapacitor => "pull-down capacitor",
            AncillaryType::Connector => "connector",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AncillaryAppliesTo {
    Bus,
    Interface,
    Pins,
    Board,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionType {
    Series,
    Parallel,
}

/// How one ancillary pin is wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AncillaryConnectionRole {
    /// Joins the input pins.
    Input,
    /// Takes the place of the input pins downstream.
    Output,
    /// Joins the voltage reference of the input pins.
    VRef,
    /// Joins the ground reference of the input pins.
    GndRef,
}

impl FromStr for AncillaryConnectionRole {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "input" => Ok(AncillaryConnectionRole::Input),
            "output" => Ok(AncillaryConnectionRole::Output),
            "v_ref" => Ok(AncillaryConnectionRole::VRef),
            "gnd_ref" => Ok(AncillaryConnectionRole::GndRef),
            other => Err(SynthError::UnknownRole(other.to_owned())),
        }
    }
}

impl fmt::Display for AncillaryConnectionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AncillaryConnectionRole::Input => f.write_str("input"),
            AncillaryConnectionRole::Output => f.write_str("output"),
            AncillaryConnectionRole::VRef => f.write_str("v_ref"),
            AncillaryConnectionRole::GndRef => f.write_str("gnd_ref"),
        }
    }
}

/// What on the parent an ancillary connection attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionTarget {
    InterfacePin {
        interface_pin: InterfacePinId,
        pin_assignment: Option<PinAssignmentId>,
    },
    Pin(PinId),
}

/// What an ancillary is attached to.
#[derive(Debug, Clone, PartialEq)]
pub enum AncillaryBinding {
    Bus(Bus),
    Interface {
        parent: ComponentId,
        interface: InterfaceRef,
    },
    Pins {
        parent: ComponentId,
    },
    Board {
        board: ComponentId,
    },
}

/// Pin connections produced by applying ancillary connections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedConnection {
    pub pin_connections: BTreeSet<(ComponentPin, ComponentPin)>,
    /// Original pin to the ancillary pin that replaces it downstream.
    pub pin_mask: BTreeMap<ComponentPin, ComponentPin>,
}

impl AppliedConnection {
    pub fn merge(&mut self, other: AppliedConnection) {
        self.pin_connections.extend(other.pin_connections);
        self.pin_mask.extend(other.pin_mask);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AncillaryConnection {
    pub ancillary_pin: PinId,
    pub role: AncillaryConnectionRole,
    pub target: ConnectionTarget,
}

impl AncillaryConnection {
    pub fn to_interface_pin(
        ancillary_pin: PinId,
        role: AncillaryConnectionRole,
        interface_pin: InterfacePinId,
    ) -> Self {
        Self {
            ancillary_pin,
            role,
            target: ConnectionTarget::InterfacePin {
                interface_pin,
                pin_assignment: None,
            },
        }
    }

    pub fn to_pin(ancillary_pin: PinId, role: AncillaryConnectionRole, pin: PinId) -> Self {
        Self {
            ancillary_pin,
            role,
            target: ConnectionTarget::Pin(pin),
        }
    }

    pub fn interface_pin(&self) -> Option<InterfacePinId> {
        match self.target {
            ConnectionTarget::InterfacePin { interface_pin, .. } => Some(interface_pin),
            ConnectionTarget::Pin(_) => None,
        }
    }

    pub fn pin(&self) -> Option<PinId> {
        match self.target {
            ConnectionTarget::Pin(pin) => Some(pin),
            ConnectionTarget::InterfacePin { .. } => None,
        }
    }

    fn pin_assignment<'a>(
        &self,
        interface: &'a ComponentInterface,
    ) -> Result<Option<&'a pcb_catalog::PinAssignment>> {
        match self.target {
            ConnectionTarget::InterfacePin {
                pin_assignment: Some(id),
                ..
            } => interface
                .interface
                .pin_assignment(id)
                .map(Some)
                .ok_or_else(|| SynthError::PinAssignmentNotFound {
                    interface: interface.name.clone(),
                    assignment: id.to_string(),
                }),
            _ => Ok(None),
        }
    }

    /// The parent pins this connection attaches to. Bus ancillaries have no
    /// fixed input pins; theirs are supplied per logical network.
    pub fn input_pins(
        &self,
        circuit: &Circuit,
        ancillary: &Ancillary,
    ) -> Result<BTreeSet<ComponentPin>> {
        match &ancillary.binding {
            AncillaryBinding::Bus(_) => Err(SynthError::InvalidAncillary(
                "input pins of a bus ancillary must be given explicitly".to_owned(),
            )),
            AncillaryBinding::Interface { interface, .. } => {
                let interface = circuit.interface(*interface)?;
                let assignment = self.pin_assignment(interface)?;
                Ok(interface.active_pins(self.interface_pin(), assignment))
            }
            AncillaryBinding::Pins { parent } => match self.target {
                ConnectionTarget::Pin(pin) => Ok(BTreeSet::from([circuit.get_pin(*parent, pin)?])),
                ConnectionTarget::InterfacePin { .. } => Err(SynthError::InvalidAncillary(
                    "pin ancillary connection targets an interface pin".to_owned(),
                )),
            },
            AncillaryBinding::Board { .. } => Err(SynthError::InvalidAncillary(
                "board ancillaries have no input pins".to_owned(),
            )),
        }
    }

    pub fn apply(
        &self,
        circuit: &Circuit,
        component: ComponentId,
        ancillary: &Ancillary,
        input_pins: Option<&BTreeSet<ComponentPin>>,
    ) -> Result<AppliedConnection> {
        let input_pins = match input_pins {
            Some(pins) => pins.clone(),
            None => self.input_pins(circuit, ancillary)?,
        };
        let ancillary_pin = circuit.get_pin(component, self.ancillary_pin)?;
        let mut applied = AppliedConnection::default();
        match self.role {
            AncillaryConnectionRole::Input => {
                applied
                    .pin_connections
                    .extend(input_pins.iter().map(|pin| (*pin, ancillary_pin)));
            }
            AncillaryConnectionRole::Output => {
                applied
                    .pin_mask
                    .extend(input_pins.iter().map(|pin| (*pin, ancillary_pin)));
            }
            AncillaryConnectionRole::VRef | AncillaryConnectionRole::GndRef => {
                let kind = match self.role {
                    AncillaryConnectionRole::VRef => ReferenceKind::Voltage,
                    _ => ReferenceKind::Ground,
                };
                let reference = reference_pin(circuit, &input_pins, kind)?.ok_or_else(|| {
                    SynthError::MissingReferencePin {
                        kind,
                        connection: format!(
                            "{} of {}",
                            circuit.pin_label(ancillary_pin),
                            ancillary.describe(circuit)
                        ),
                    }
                })?;
                applied.pin_connections.insert((ancillary_pin, reference));
            }
        }
        Ok(applied)
    }
}

/// The reference pin of `kind` declared by the input pins. Several distinct
/// references resolve to the lowest by pin number, then name.
pub fn reference_pin(
    circuit: &Circuit,
    input_pins: &BTreeSet<ComponentPin>,
    kind: ReferenceKind,
) -> Result<Option<ComponentPin>> {
    let mut references = BTreeSet::new();
    for pin in input_pins {
        if let Some(reference) = circuit.pin(*pin)?.reference_pin(kind) {
            references.insert(circuit.get_pin(pin.component, reference)?);
        }
    }
    let mut keyed: Vec<((NaturalKey, String), String, ComponentPin)> = Vec::new();
    for pin in references {
        keyed.push((
            circuit.pin(pin)?.order_key(),
            circuit.reference(pin.component).to_owned(),
            pin,
        ));
    }
    keyed.sort();
    if keyed.len() > 1 {
        log::debug!(
            "{} {kind} reference pins found, using {}",
            keyed.len(),
            circuit.pin_label(keyed[0].2)
        );
    }
    Ok(keyed.first().map(|(_, _, pin)| *pin))
}

/// A part added to support another part, interface, bus or board.
#[derive(Debug, Clone, PartialEq)]
pub struct Ancillary {
    pub ancillary_type: AncillaryType,
    pub connection_type: Option<ConnectionType>,
    pub maximum_latency: Option<f64>,
    pub connections: Vec<AncillaryConnection>,
    pub binding: AncillaryBinding,
}

impl Ancillary {
    pub fn new(
        ancillary_type: AncillaryType,
        binding: AncillaryBinding,
        connections: Vec<AncillaryConnection>,
    ) -> Result<Self> {
        if ancillary_type != AncillaryType::Connector && connections.is_empty() {
            return Err(SynthError::InvalidAncillary(format!(
                "a {ancillary_type} ancillary needs at least one connection"
            )));
        }
        let needs_interface_pin = !matches!(binding, AncillaryBinding::Pins { .. });
        if needs_interface_pin && connections.iter().any(|c| c.interface_pin().is_none()) {
            return Err(SynthError::InvalidAncillary(format!(
                "connections of a {ancillary_type} ancillary must target interface pins"
            )));
        }
        Ok(Self {
            ancillary_type,
            connection_type: None,
            maximum_latency: None,
            connections,
            binding,
        })
    }

    pub fn with_connection_type(mut self, connection_type: ConnectionType) -> Self {
        self.connection_type = Some(connection_type);
        self
    }

    pub fn with_maximum_latency(mut self, latency: f64) -> Self {
        self.maximum_latency = Some(latency);
        self
    }

    pub fn applies_to(&self) -> AncillaryAppliesTo {
        match self.binding {
            AncillaryBinding::Bus(_) => AncillaryAppliesTo::Bus,
            AncillaryBinding::Interface { .. } => AncillaryAppliesTo::Interface,
            AncillaryBinding::Pins { .. } => AncillaryAppliesTo::Pins,
            AncillaryBinding::Board { .. } => AncillaryAppliesTo::Board,
        }
    }

    pub fn parent(&self) -> Option<ComponentId> {
        match self.binding {
            AncillaryBinding::Interface { parent, .. } | AncillaryBinding::Pins { parent } => {
                Some(parent)
            }
            AncillaryBinding::Board { board } => Some(board),
            AncillaryBinding::Bus(_) => None,
        }
    }

    pub fn bus(&self) -> Option<&Bus> {
        match &self.binding {
            AncillaryBinding::Bus(bus) => Some(bus),
            _ => None,
        }
    }

    pub fn interface(&self) -> Option<InterfaceRef> {
        match self.binding {
            AncillaryBinding::Interface { interface, .. } => Some(interface),
            _ => None,
        }
    }

    /// Orders by maximum latency (unset or zero last), then by type rank.
    pub fn ordering_cmp(&self, other: &Ancillary) -> Ordering {
        let latency = |a: &Ancillary| {
            a.maximum_latency
                .filter(|l| *l != 0.0)
                .unwrap_or(f64::INFINITY)
        };
        latency(self)
            .total_cmp(&latency(other))
            .then_with(|| self.ancillary_type.rank().cmp(&other.ancillary_type.rank()))
    }

    /// Whether this ancillary serves the given interface pin, pin, bus or
    /// interface. Exactly the arguments its binding needs must be given.
    pub fn matches(
        &self,
        interface_pin: Option<InterfacePinId>,
        pin: Option<PinId>,
        bus: Option<&Bus>,
        interface: Option<InterfaceRef>,
    ) -> Result<bool> {
        let invalid = |what: &str| {
            Err(SynthError::InvalidAncillary(format!(
                "cannot match a {} ancillary {what}",
                self.ancillary_type
            )))
        };
        match &self.binding {
            AncillaryBinding::Bus(own) => {
                if pin.is_some() || interface.is_some() {
                    return invalid("against a pin or interface");
                }
                let Some(bus) = bus else {
                    return invalid("without a bus");
                };
                Ok(own.overlaps(bus) && self.serves_interface_pin(interface_pin))
            }
            AncillaryBinding::Interface {
                interface: own, ..
            } => {
                if pin.is_some() || bus.is_some() {
                    return invalid("against a pin or bus");
                }
                let Some(interface) = interface else {
                    return invalid("without an interface");
                };
                Ok(*own == interface && self.serves_interface_pin(interface_pin))
            }
            AncillaryBinding::Pins { .. } => {
                if interface_pin.is_some() || bus.is_some() || interface.is_some() {
                    return invalid("against an interface pin, bus or interface");
                }
                let Some(pin) = pin else {
                    return invalid("without a pin");
                };
                Ok(self.connections.iter().any(|c| c.pin() == Some(pin)))
            }
            AncillaryBinding::Board { .. } => Ok(false),
        }
    }

    fn serves_interface_pin(&self, interface_pin: Option<InterfacePinId>) -> bool {
        match interface_pin {
            None => true,
            Some(pin) => self.connections.iter().any(|c| c.interface_pin() == Some(pin)),
        }
    }

    /// Parent pins the ancillary attaches to. Bus and board ancillaries have
    /// none.
    pub fn parent_pins(&self, circuit: &Circuit) -> Result<BTreeSet<ComponentPin>> {
        let mut out = BTreeSet::new();
        match &self.binding {
            AncillaryBinding::Bus(_) | AncillaryBinding::Board { .. } => {}
            AncillaryBinding::Interface { .. } | AncillaryBinding::Pins { .. } => {
                for connection in &self.connections {
                    out.extend(connection.input_pins(circuit, self)?);
                }
            }
        }
        Ok(out)
    }

    /// Applies every connection, each with its own input pins.
    pub fn apply(&self, circuit: &Circuit, component: ComponentId) -> Result<AppliedConnection> {
        let mut applied = AppliedConnection::default();
        for connection in &self.connections {
            applied.merge(connection.apply(circuit, component, self, None)?);
        }
        Ok(applied)
    }

    pub fn describe(&self, circuit: &Circuit) -> String {
        match &self.binding {
            AncillaryBinding::Bus(bus) => format!("{} on bus {}", self.ancillary_type, bus.describe(circuit)),
            AncillaryBinding::Interface { interface, .. } => format!(
                "{} on {}",
                self.ancillary_type,
                circuit.interface_label(*interface)
            ),
            AncillaryBinding::Pins { parent } => {
                format!("{} on pins of {}", self.ancillary_type, circuit.reference(*parent))
            }
            AncillaryBinding::Board { board } => {
                format!("{} on board {}", self.ancillary_type, circuit.reference(*board))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pins_ancillary(ancillary_type: AncillaryType, latency: Option<f64>) -> Ancillary {
        let pin = PinId::from_key("MCU/PA1");
        let mut ancillary = Ancillary::new(
            ancillary_type,
            AncillaryBinding::Pins {
                parent: ComponentId(1),
            },
            vec![AncillaryConnection::to_pin(
                PinId::from_key("RES/1"),
                AncillaryConnectionRole::Input,
                pin,
            )],
        )
        .unwrap();
        if let Some(latency) = latency {
            ancillary = ancillary.with_maximum_latency(latency);
        }
        ancillary
    }

    #[test]
    fn roles_parse_from_their_names() {
        for (name, role) in [
            ("input", AncillaryConnectionRole::Input),
            ("output", AncillaryConnectionRole::Output),
            ("v_ref", AncillaryConnectionRole::VRef),
            ("gnd_ref", AncillaryConnectionRole::GndRef),
        ] {
            assert_eq!(name.parse::<AncillaryConnectionRole>().unwrap(), role);
            assert_eq!(role.to_string(), name);
        }
        let err = "sideways".parse::<AncillaryConnectionRole>().unwrap_err();
        assert!(matches!(err, SynthError::UnknownRole(_)));
    }

    #[test]
    fn ordering_prefers_latency_then_rank() {
        let ferrite = pins_ancillary(AncillaryType::Ferrite, None);
        let series = pins_ancillary(AncillaryType::SeriesResistor, None);
        let fast_pullup = pins_ancillary(AncillaryType::PullupResistor, Some(1.0));
        let zero = pins_ancillary(AncillaryType::Custom, Some(0.0));

        assert_eq!(series.ordering_cmp(&ferrite), Ordering::Less);
        assert_eq!(fast_pullup.ordering_cmp(&series), Ordering::Less);
        assert_eq!(zero.ordering_cmp(&series), Ordering::Less);
        assert_eq!(ferrite.ordering_cmp(&zero), Ordering::Greater);
    }

    #[test]
    fn construction_checks_connections() {
        let err = Ancillary::new(
            AncillaryType::Decoupling,
            AncillaryBinding::Pins {
                parent: ComponentId(1),
            },
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, SynthError::InvalidAncillary(_)));

        Ancillary::new(
            AncillaryType::Connector,
            AncillaryBinding::Board {
                board: ComponentId(1),
            },
            vec![],
        )
        .unwrap();

        let err = Ancillary::new(
            AncillaryType::PullupResistor,
            AncillaryBinding::Bus(Bus::empty()),
            vec![AncillaryConnection::to_pin(
                PinId::from_key("RES/1"),
                AncillaryConnectionRole::Input,
                PinId::from_key("MCU/PA1"),
            )],
        )
        .unwrap_err();
        assert!(matches!(err, SynthError::InvalidAncillary(_)));
    }

    #[test]
    fn pin_ancillaries_match_pins_only() {
        let ancillary = pins_ancillary(AncillaryType::SeriesResistor, None);
        let pa1 = PinId::from_key("MCU/PA1");
        assert!(ancillary.matches(None, Some(pa1), None, None).unwrap());
        assert!(
            !ancillary
                .matches(None, Some(PinId::from_key("MCU/PA2")), None, None)
                .unwrap()
        );
        assert!(ancillary.matches(None, None, None, None).is_err());
        assert!(ancillary.matches(None, Some(pa1), Some(&Bus::empty()), None).is_err());
    }
}
