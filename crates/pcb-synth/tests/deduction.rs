mod common;

use std::collections::{BTreeMap, BTreeSet};

use common::{driver_and_led, expected};
use pcb_catalog::{InterfaceAdapter, interface_pin_id};
use pcb_synth::{BusFragment, ComponentId, ErrorKind, SynthError};
use pcb_test_utils::Bench;
use pcb_test_utils::catalog::{CLOCK_IN, CLOCK_OUT, GPIO_OUTPUT, LED_DRIVE, SPI_MASTER};
use uuid::Uuid;

fn fragment(from: (ComponentId, &str), to: (ComponentId, &str), function: &str) -> BusFragment {
    BusFragment::builder(from.0, to.0, function)
        .persisted(Uuid::new_v4())
        .from_interface(from.1)
        .to_interface(to.1)
        .build()
        .unwrap()
}

#[test]
fn compatible_types_are_keyed_by_the_requesting_pin() {
    let (bench, ic, led) = driver_and_led();
    let (id, fragment) = bench.circuit.fragments().next().unwrap();
    let out = interface_pin_id(GPIO_OUTPUT, "OUT");
    let input = interface_pin_id(LED_DRIVE, "IN");

    assert!(fragment.is_resolved(&bench.circuit));
    assert_eq!(fragment.from_connections.keys().collect::<Vec<_>>(), vec![&out]);
    assert_eq!(fragment.to_connections.keys().collect::<Vec<_>>(), vec![&out]);
    let to_uses = &fragment.to_connections[&out];
    assert_eq!(to_uses.len(), 1);
    assert_eq!(to_uses[0].component_pin, bench.pin(led, "ANODE"));
    assert_eq!(to_uses[0].interface_pin, input);
    assert_eq!(
        fragment.connections(),
        BTreeMap::from([(
            bench.pin(ic, "A"),
            [bench.pin(led, "ANODE")].into_iter().collect::<BTreeSet<_>>()
        )])
    );
    assert_eq!(bench.circuit.node(ic).unwrap().external_bus_requirements(), &[id]);
}

#[test]
fn single_assignments_pair_by_position() {
    pcb_test_utils::init_logging();
    let mut bench = Bench::new();
    let osc = bench.part(None, "X1", "osc", "OSC");
    let pll = bench.part(None, "U1", "pll", "PLL");
    let id = bench.connect(osc, "CLKOUT", pll, "CKIN", "clock");

    let clk = interface_pin_id(CLOCK_OUT, "CLK");
    let fragment = bench.circuit.fragment(id).unwrap();
    assert_eq!(fragment.from_connections[&clk][0].component_pin, bench.pin(osc, "OUT"));
    let to_uses = &fragment.to_connections[&clk];
    assert_eq!(to_uses[0].component_pin, bench.pin(pll, "REF"));
    assert_eq!(to_uses[0].interface_pin, interface_pin_id(CLOCK_IN, "CKIN"));

    let netlist = bench.spec().netlist().unwrap();
    assert_eq!(
        netlist.named_nets(),
        expected(&[("OSC_OUT", &["U1.REF", "X1.OUT"])])
    );
}

#[test]
fn unequal_widths_are_not_paired() {
    let mut bench = Bench::new();
    let osc = bench.part(None, "X1", "osc", "OSC");
    let pll = bench.part(None, "U1", "pll", "PLL");

    let fragment = fragment((osc, "CLKOUT"), (pll, "CKDIFF"), "clock");
    let err = bench.circuit.add_bus_requirement(fragment).unwrap_err();
    assert!(matches!(err, SynthError::UnsupportedPairing { .. }), "{err}");
    assert_eq!(err.kind(), ErrorKind::Definition);
}

#[test]
fn uncovered_requesting_pins_are_rejected() {
    let mut bench = Bench::new();
    let mcu = bench.part(None, "U1", "mcu", "MCU");
    let tap = bench.part(None, "J1", "tap", "TAP");

    let fragment = fragment((mcu, "SPI1"), (tap, "SPI"), "tap");
    let err = bench.circuit.add_bus_requirement(fragment).unwrap_err();
    assert!(
        matches!(err, SynthError::ConnectionKeyMismatch(ref f) if f == "U1.SPI1 -> J1.SPI"),
        "{err}"
    );
    assert_eq!(err.kind(), ErrorKind::Definition);
    assert!(bench.circuit.active_interfaces(mcu).unwrap().is_empty());
}

#[test]
fn adapter_adds_the_adapted_interface() {
    pcb_test_utils::init_logging();
    let mut bench = Bench::new();
    let ic = bench.part(None, "IC1", "driver", "DRIVER");
    let pll = bench.part(None, "U1", "pll", "PLL");
    let gpio = bench.interface_type(GPIO_OUTPUT);
    let adapter = InterfaceAdapter::from_pin_maps(
        bench.circuit.catalog(),
        Some(gpio),
        BTreeMap::from([(
            interface_pin_id(GPIO_OUTPUT, "OUT"),
            interface_pin_id(CLOCK_OUT, "CLK"),
        )]),
        None,
        BTreeMap::new(),
    )
    .unwrap();
    let fragment = BusFragment::builder(ic, pll, "clock")
        .persisted(Uuid::new_v4())
        .from_interface("OUT")
        .from_type(gpio)
        .to_interface("CKIN")
        .adapter(adapter)
        .build()
        .unwrap();
    assert_eq!(fragment.from_interface_type, Some(bench.interface_type(CLOCK_OUT)));
    bench.circuit.add_bus_requirement(fragment).unwrap();

    let original = bench.interface(ic, "OUT", GPIO_OUTPUT);
    let adapted = bench.interface(ic, "OUT", CLOCK_OUT);
    assert_ne!(original, adapted);
    assert_eq!(bench.circuit.active_interfaces(ic).unwrap(), vec![adapted]);
    let assignments = &bench.circuit.interface(adapted).unwrap().interface.pin_assignments;
    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0].interface_pin, interface_pin_id(CLOCK_OUT, "CLK"));
    assert_eq!(assignments[0].pins, vec![bench.pin_id("DRIVER", "A")]);

    let netlist = bench.spec().netlist().unwrap();
    assert_eq!(
        netlist.named_nets(),
        expected(&[("DRIVER_A", &["IC1.A", "U1.REF"])])
    );
}

#[test]
fn identical_types_pair_equal_pins() {
    let mut bench = Bench::new();
    let a = bench.part(None, "U1", "node", "NODE_A");
    let b = bench.part(None, "U2", "node", "NODE_B");
    bench.connect(a, "CLK", b, "CLK", "clock");

    let spi = bench.interface_type(SPI_MASTER);
    let (_, fragment) = bench.circuit.fragments().next().unwrap();
    assert_eq!(fragment.from_interface_type(&bench.circuit).unwrap(), spi);
    assert_eq!(fragment.to_interface_type(&bench.circuit).unwrap(), spi);
    assert_eq!(
        fragment.from_connections.keys().collect::<Vec<_>>(),
        vec![&interface_pin_id(SPI_MASTER, "SCK")]
    );
    assert_eq!(
        fragment.from_connections.keys().collect::<Vec<_>>(),
        fragment.to_connections.keys().collect::<Vec<_>>()
    );
}
