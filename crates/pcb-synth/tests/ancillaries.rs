mod common;

use common::{driver_and_led, expected, i2c_sensor, pullup, sda_bus_pullup, series_resistor};
use pcb_catalog::ReferenceKind;
use pcb_synth::{ErrorKind, SynthConfig, SynthError};

#[test]
fn series_resistor_splits_the_line() {
    let (mut bench, ic, _) = driver_and_led();
    let resistor = series_resistor(&mut bench, ic, "R1");
    let (a, r1_2) = (bench.pin(ic, "A"), bench.pin(resistor, "2"));

    let mut spec = bench.spec();
    let netlist = spec.netlist().unwrap();

    assert_eq!(
        netlist.named_nets(),
        expected(&[
            ("DRIVER_A", &["D1.ANODE", "R1.2"]),
            ("DRIVER_A_S", &["IC1.A", "R1.1"]),
        ])
    );
    assert_eq!(netlist.pin_mask().get(&a), Some(&r1_2));
    assert_eq!(netlist.original_pins().get(&r1_2), Some(&a));

    let downstream = netlist.net_by_name("DRIVER_A").unwrap();
    assert!(downstream.is_global());
    assert!(downstream.non_ancillary_pins().contains(&a));
    let upstream = netlist.net_by_name("DRIVER_A_S").unwrap();
    assert!(!upstream.is_global());
    assert_eq!(upstream.bus().reference(), downstream.bus().reference());
    assert!(spec.warnings().is_empty());
}

#[test]
fn pullup_lands_behind_the_series_resistor() {
    let (mut bench, ic, _) = driver_and_led();
    series_resistor(&mut bench, ic, "R1");
    pullup(&mut bench, ic, "DRIVER", "A", "R2", None);

    let mut spec = bench.spec();
    let netlist = spec.netlist().unwrap();

    assert_eq!(
        netlist.named_nets(),
        expected(&[
            ("DRIVER_A", &["D1.ANODE", "R1.2", "R2.1"]),
            ("DRIVER_A_S", &["IC1.A", "R1.1"]),
            ("DRIVER_VDD", &["IC1.VDD", "R2.2"]),
        ])
    );
    assert!(
        spec.warnings()
            .contains("Failed to connect pins IC1.VDD, R2.2: no bus could be found")
    );
}

#[test]
fn latency_moves_the_pullup_ahead() {
    let (mut bench, ic, _) = driver_and_led();
    series_resistor(&mut bench, ic, "R1");
    let r2 = pullup(&mut bench, ic, "DRIVER", "A", "R2", Some(1.0));
    let (a, r2_1) = (bench.pin(ic, "A"), bench.pin(r2, "1"));

    let netlist = bench.spec().netlist().unwrap();
    let nets = netlist.pin_nets(r2_1);
    assert_eq!(nets.len(), 1);
    assert!(nets[0].contains(a));
    assert_eq!(nets[0].name(), Some("DRIVER_A_S"));
}

#[test]
fn strict_mode_rejects_unbussed_pins() {
    let (mut bench, ic, _) = driver_and_led();
    pullup(&mut bench, ic, "DRIVER", "A", "R2", None);

    let config = SynthConfig {
        strict: true,
        ..SynthConfig::default()
    };
    let err = bench.spec_with(config).netlist().unwrap_err();
    assert!(matches!(err, SynthError::UnbussedPins(_)), "{err}");
    assert_eq!(err.kind(), ErrorKind::Definition);
}

#[test]
fn pullup_without_voltage_reference_fails() {
    let (mut bench, _, led) = driver_and_led();
    pullup(&mut bench, led, "LED", "ANODE", "R2", None);

    let err = bench.spec().netlist().unwrap_err();
    match &err {
        SynthError::MissingReferencePin { kind, connection } => {
            assert_eq!(*kind, ReferenceKind::Voltage);
            assert!(connection.starts_with("R2.2 of pull-up resistor"), "{connection}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.kind(), ErrorKind::Lookup);
}

#[test]
fn spec_finds_ancillaries_by_what_they_serve() {
    let (mut bench, ic, _) = driver_and_led();
    let r1 = series_resistor(&mut bench, ic, "R1");
    let r2 = pullup(&mut bench, ic, "DRIVER", "A", "R2", None);
    let out = bench.interface(ic, "OUT", pcb_test_utils::catalog::GPIO_OUTPUT);
    let a = bench.pin_id("DRIVER", "A");
    let vdd = bench.pin_id("DRIVER", "VDD");

    let spec = bench.spec();
    assert_eq!(
        spec.interface_ancillary_components(ic, Some(out), None)
            .unwrap(),
        vec![r1]
    );
    assert_eq!(spec.pin_ancillary_components(ic, a).unwrap(), vec![r2]);
    assert!(spec.pin_ancillary_components(ic, vdd).unwrap().is_empty());
    assert!(spec.circuit().is_ancillary(r1));
    assert!(
        spec.circuit()
            .display_tree(spec.circuit().root())
            .unwrap()
            .contains("R1 (resistor, series resistor)")
    );
}

#[test]
fn bus_pullup_joins_the_whole_line() {
    for sensor_first in [false, true] {
        let (mut bench, mcu, _) = i2c_sensor(sensor_first);
        let r9 = sda_bus_pullup(&mut bench, "R9");
        let vdd = bench.pin(mcu, "VDD");

        let mut spec = bench.spec();
        let bus = spec.circuit().flattened_buses(spec.circuit().root()).unwrap();
        assert_eq!(spec.bus_ancillary_components(&bus[0], None).unwrap(), vec![r9]);

        let netlist = spec.netlist().unwrap();
        assert_eq!(
            netlist.named_nets(),
            expected(&[
                ("I2C_SDA", &["R9.1", "U1.PB7", "U2.SDA"]),
                ("I2C_SCL", &["U1.PB6", "U2.SCL"]),
                ("MCU_VDD", &["R9.2", "U1.VDD"]),
            ]),
            "sensor_first = {sensor_first}"
        );
        let rail = netlist.net_by_name("MCU_VDD").unwrap();
        assert!(rail.is_global());
        assert!(rail.contains(vdd));
        assert!(
            spec.warnings()
                .contains("Failed to connect pins R9.2, U1.VDD: no bus could be found")
        );
    }
}
