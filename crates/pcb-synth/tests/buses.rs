mod common;

use std::collections::BTreeSet;

use common::{expected, spi_flashes};
use pcb_synth::{ErrorKind, SynthError};
use pcb_test_utils::Bench;
use pcb_test_utils::catalog::{I2C_MASTER, I2C_SLAVE};

#[test]
fn masters_wired_together_share_a_net() {
    let mut bench = Bench::new();
    let a = bench.part(None, "U1", "clock", "NODE_A");
    let b = bench.part(None, "U2", "clock", "NODE_B");
    bench.connect(a, "CLK", b, "CLK", "clock");
    let (a3, b7) = (bench.pin(a, "A3"), bench.pin(b, "B7"));

    let mut spec = bench.spec();
    let netlist = spec.netlist().unwrap();

    let nets = netlist.pin_nets(a3);
    assert_eq!(nets.len(), 1);
    assert!(nets[0].contains(b7));
    assert!(nets[0].is_shared());
    assert_eq!(nets[0].name(), Some("SPI_SCK"));
    assert_eq!(netlist.len(), 1);
}

#[test]
fn shared_spi_lines_are_named_by_family() {
    let mut spec = spi_flashes(3, &[0, 1, 2]).spec();
    let netlist = spec.netlist().unwrap();

    assert_eq!(
        netlist.named_nets(),
        expected(&[
            ("MCU_PA4", &["U1.PA4", "U2.CS", "U3.CS", "U4.CS"]),
            ("SPI_MISO", &["U1.PA6", "U2.SO", "U3.SO", "U4.SO"]),
            ("SPI_MOSI", &["U1.PA7", "U2.SI", "U3.SI", "U4.SI"]),
            ("SPI_SCK", &["U1.PA5", "U2.SCK", "U3.SCK", "U4.SCK"]),
        ])
    );
    assert!(spec.warnings().is_empty());

    let cs = netlist.net_by_name("MCU_PA4").unwrap();
    assert!(!cs.is_shared());
    assert!(cs.is_global());
    let source = cs.source_pin().unwrap();
    assert_eq!(spec.circuit().pin_label(source), "U1.PA4");

    let sck = netlist.net_by_name("SPI_SCK").unwrap();
    assert_eq!(sck.identifier(), "SPI__flash");
    assert_eq!(sck.logical_network().unwrap().name(), "SCK -> SCK");
}

#[test]
fn names_do_not_depend_on_connection_order() {
    let forward = spi_flashes(3, &[0, 1, 2]).spec().netlist().unwrap();
    let shuffled = spi_flashes(3, &[2, 0, 1]).spec().netlist().unwrap();
    assert_eq!(forward.named_nets(), shuffled.named_nets());
    assert_eq!(forward.render(), shuffled.render());
}

#[test]
fn renders_nets_per_board() {
    let netlist = spi_flashes(3, &[0, 1, 2]).spec().netlist().unwrap();
    insta::assert_snapshot!(netlist.render().trim_end(), @r"
    [MAIN]
    -: U1.GND
    -: U1.PB6
    -: U1.PB7
    -: U1.VDD
    -: U2.GND
    -: U2.VCC
    -: U3.GND
    -: U3.VCC
    -: U4.GND
    -: U4.VCC
    MCU_PA4: U1.PA4, U2.CS, U3.CS, U4.CS
    SPI_MISO: U1.PA6, U2.SO, U3.SO, U4.SO
    SPI_MOSI: U1.PA7, U2.SI, U3.SI, U4.SI
    SPI_SCK: U1.PA5, U2.SCK, U3.SCK, U4.SCK
    ");
}

#[test]
fn every_part_pin_lands_in_exactly_one_net() {
    let mut spec = spi_flashes(2, &[1, 0]).spec();
    let netlist = spec.netlist().unwrap();
    let circuit = spec.circuit();

    let mut seen = BTreeSet::new();
    for (_, pin) in netlist.pins_by_net() {
        assert!(seen.insert(pin), "{} is in two nets", circuit.pin_label(pin));
    }
    let mut all = BTreeSet::new();
    for part in circuit.iterate_parts(circuit.root()) {
        for pin in &circuit.component(part).unwrap().pins {
            all.insert(circuit.get_pin(part, pin.id).unwrap());
        }
    }
    assert_eq!(seen, all);

    let names: Vec<&str> = netlist.nets().iter().filter_map(|n| n.name()).collect();
    let unique: BTreeSet<&str> = names.iter().copied().collect();
    assert_eq!(names.len(), unique.len());
}

#[test]
fn deduced_connections_cover_the_same_interface_pins() {
    let bench = spi_flashes(3, &[0, 1, 2]);
    for (_, fragment) in bench.circuit.fragments() {
        assert!(fragment.is_resolved(&bench.circuit));
        assert!(
            fragment
                .from_connections
                .keys()
                .eq(fragment.to_connections.keys())
        );
        assert_eq!(fragment.connections().len(), 4);
    }
}

#[test]
fn one_bus_per_shared_interface() {
    let bench = spi_flashes(3, &[0, 1, 2]);
    let circuit = &bench.circuit;
    let buses = circuit.flattened_buses(circuit.root()).unwrap();
    assert_eq!(buses.len(), 1);
    let bus = &buses[0];
    assert_eq!(bus.reference(), "SPI__flash");
    assert_eq!(bus.members().len(), 3);
    assert_eq!(bus.source_components(circuit).len(), 1);
    assert_eq!(bus.target_components(circuit).len(), 3);
    assert_eq!(bus.interface_family(circuit).unwrap().label, "SPI");
}

#[test]
fn separate_buses_with_equal_names_get_suffixes() {
    let mut bench = Bench::new();
    let first = bench.part(None, "U1", "mcu", "MCU");
    let flash = bench.part(None, "U2", "flash", "FLASH");
    let second = bench.part(None, "U3", "mcu", "MCU");
    let other = bench.part(None, "U4", "flash", "FLASH");
    bench.connect(first, "SPI1", flash, "SPI", "flash");
    bench.connect(second, "SPI1", other, "SPI", "flash");

    let mut spec = bench.spec();
    let netlist = spec.netlist().unwrap();
    let names = netlist.named_nets();

    assert_eq!(names["SPI_SCK_1"], vec!["U1.PA5", "U2.SCK"]);
    assert_eq!(names["SPI_SCK_2"], vec!["U3.PA5", "U4.SCK"]);
    assert_eq!(names["MCU1_PA4"], vec!["U1.PA4", "U2.CS"]);
    assert_eq!(names["MCU2_PA4"], vec!["U3.PA4", "U4.CS"]);
    assert!(
        spec.warnings()
            .contains("Net name SPI_SCK is shared by 2 nets, adding numeric suffixes")
    );
}

#[test]
fn generic_interfaces_split_into_child_types() {
    pcb_test_utils::init_logging();
    let mut bench = Bench::new();
    let mcu = bench.part(None, "U1", "mcu", "MCU");
    let sensor = bench.part(None, "U2", "sensor", "SENSOR");
    bench.connect(mcu, "I2C1", sensor, "I2C1", "sensor");

    let circuit = &bench.circuit;
    let interfaces = &circuit.component(sensor).unwrap().interfaces;
    assert_eq!(interfaces.len(), 2);
    let slave = bench.interface(sensor, "I2C1", I2C_SLAVE);
    let master = bench.interface(sensor, "I2C1", I2C_MASTER);
    assert!(circuit.interface(slave).unwrap().is_active());
    assert!(!circuit.interface(master).unwrap().is_active());

    let netlist = bench.spec().netlist().unwrap();
    let names = netlist.named_nets();
    assert_eq!(names["I2C_SDA"], vec!["U1.PB7", "U2.SDA"]);
    assert_eq!(names["I2C_SCL"], vec!["U1.PB6", "U2.SCL"]);
}

#[test]
fn unknown_interface_names_fail_lookup() {
    let mut bench = Bench::new();
    let mcu = bench.part(None, "U1", "mcu", "MCU");
    let flash = bench.part(None, "U2", "flash", "FLASH");
    bench.connect(mcu, "SPI9", flash, "SPI", "flash");

    let err = bench.spec().netlist().unwrap_err();
    assert!(matches!(err, SynthError::InterfaceNotFound { .. }), "{err}");
    assert_eq!(err.kind(), ErrorKind::Lookup);
}
