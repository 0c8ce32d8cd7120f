#![allow(dead_code)]

use std::collections::BTreeMap;

use pcb_catalog::interface_pin_id;
use pcb_synth::{
    Ancillary, AncillaryBinding, AncillaryConnection, AncillaryConnectionRole, AncillaryType,
    ComponentId,
};
use pcb_test_utils::catalog::I2C_MASTER;
use pcb_test_utils::Bench;
use pcb_test_utils::catalog::GPIO_OUTPUT;

/// Expected named nets, as name to sorted pin labels.
pub fn expected(nets: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
    nets.iter()
        .map(|(name, pins)| {
            let mut pins: Vec<String> = pins.iter().map(|p| (*p).to_owned()).collect();
            pins.sort();
            ((*name).to_owned(), pins)
        })
        .collect()
}

/// An MCU (`U1`) with `flashes` flash chips (`U2`..) on its SPI bus,
/// connected in `order` (indices into the flashes).
pub fn spi_flashes(flashes: usize, order: &[usize]) -> Bench {
    pcb_test_utils::init_logging();
    let mut bench = Bench::new();
    let mcu = bench.part(None, "U1", "mcu", "MCU");
    let chips: Vec<ComponentId> = (0..flashes)
        .map(|i| bench.part(None, &format!("U{}", i + 2), "flash", "FLASH"))
        .collect();
    for index in order {
        bench.connect(mcu, "SPI1", chips[*index], "SPI", "flash");
    }
    bench
}

/// A driver (`IC1`) wired to an LED (`D1`).
pub fn driver_and_led() -> (Bench, ComponentId, ComponentId) {
    pcb_test_utils::init_logging();
    let mut bench = Bench::new();
    let ic = bench.part(None, "IC1", "driver", "DRIVER");
    let led = bench.part(None, "D1", "led", "LED");
    bench.connect(ic, "OUT", led, "IN", "led");
    (bench, ic, led)
}

/// A series resistor on the driver's output interface.
pub fn series_resistor(bench: &mut Bench, ic: ComponentId, reference: &str) -> ComponentId {
    let out = bench.interface(ic, "OUT", GPIO_OUTPUT);
    let ip = interface_pin_id(GPIO_OUTPUT, "OUT");
    let ancillary = Ancillary::new(
        AncillaryType::SeriesResistor,
        AncillaryBinding::Interface {
            parent: ic,
            interface: out,
        },
        vec![
            AncillaryConnection::to_interface_pin(
                bench.pin_id("RES", "1"),
                AncillaryConnectionRole::Input,
                ip,
            ),
            AncillaryConnection::to_interface_pin(
                bench.pin_id("RES", "2"),
                AncillaryConnectionRole::Output,
                ip,
            ),
        ],
    )
    .unwrap();
    bench.ancillary(reference, "resistor", "RES", ancillary)
}

/// A pull-up resistor on a physical pin of `parent`.
pub fn pullup(
    bench: &mut Bench,
    parent: ComponentId,
    connectivity: &str,
    pin: &str,
    reference: &str,
    latency: Option<f64>,
) -> ComponentId {
    let target = bench.pin_id(connectivity, pin);
    let mut ancillary = Ancillary::new(
        AncillaryType::PullupResistor,
        AncillaryBinding::Pins { parent },
        vec![
            AncillaryConnection::to_pin(
                bench.pin_id("RES", "1"),
                AncillaryConnectionRole::Input,
                target,
            ),
            AncillaryConnection::to_pin(
                bench.pin_id("RES", "2"),
                AncillaryConnectionRole::VRef,
                target,
            ),
        ],
    )
    .unwrap();
    if let Some(latency) = latency {
        ancillary = ancillary.with_maximum_latency(latency);
    }
    bench.ancillary(reference, "resistor", "RES", ancillary)
}

/// An MCU (`U1`) and a sensor (`U2`) on one I2C bus. The sensor requests the
/// bus when `sensor_first` is set.
pub fn i2c_sensor(sensor_first: bool) -> (Bench, ComponentId, ComponentId) {
    pcb_test_utils::init_logging();
    let mut bench = Bench::new();
    let mcu = bench.part(None, "U1", "mcu", "MCU");
    let sensor = bench.part(None, "U2", "sensor", "SENSOR");
    if sensor_first {
        bench.connect(sensor, "I2C1", mcu, "I2C1", "sensor");
    } else {
        bench.connect(mcu, "I2C1", sensor, "I2C1", "sensor");
    }
    (bench, mcu, sensor)
}

/// A pull-up resistor on the SDA line of the only bus of the circuit.
pub fn sda_bus_pullup(bench: &mut Bench, reference: &str) -> ComponentId {
    let root = bench.root();
    let bus = bench
        .circuit
        .flattened_buses(root)
        .unwrap()
        .into_iter()
        .next()
        .expect("circuit has a bus");
    let sda = interface_pin_id(I2C_MASTER, "SDA");
    let ancillary = Ancillary::new(
        AncillaryType::PullupResistor,
        AncillaryBinding::Bus(bus),
        vec![
            AncillaryConnection::to_interface_pin(
                bench.pin_id("RES", "1"),
                AncillaryConnectionRole::Input,
                sda,
            ),
            AncillaryConnection::to_interface_pin(
                bench.pin_id("RES", "2"),
                AncillaryConnectionRole::VRef,
                sda,
            ),
        ],
    )
    .unwrap();
    bench.ancillary(reference, "resistor", "RES", ancillary)
}
