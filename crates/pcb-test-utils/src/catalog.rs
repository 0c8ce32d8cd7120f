//! The lab catalog.
//!
//! | connectivity | pins                                          | interfaces                  |
//! |--------------|-----------------------------------------------|-----------------------------|
//! | `MCU`        | PA4-PA7, PB6, PB7, VDD, GND                   | `SPI1` (master), `I2C1`     |
//! | `FLASH`      | SCK, SI, SO, CS, VCC, GND                     | `SPI` (slave)               |
//! | `NODE_A`     | A3                                            | `CLK` (master, SCK only)    |
//! | `NODE_B`     | B7                                            | `CLK` (master, SCK only)    |
//! | `DRIVER`     | A, VDD, GND                                   | `OUT` (GPIO output)         |
//! | `LED`        | ANODE, CATHODE                                | `IN` (LED drive)            |
//! | `SENSOR`     | SDA, SCL, VDD, GND                            | `I2C1` (generic I2C)        |
//! | `OSC`        | OUT                                           | `CLKOUT` (clock out)        |
//! | `PLL`        | REF, REFN                                     | `CKIN`, `CKDIFF` (clock in) |
//! | `TAP`        | CK                                            | `SPI` (slave, SCK only)     |
//! | `RES`, `CAP` | 1, 2                                          |                             |
//! | `CONN`       | 1-4                                           |                             |

use std::sync::Arc;

use pcb_catalog::{BusSharing, Catalog, CatalogBuilder, PinType};

pub const SPI_MASTER: &str = "SPI Master";
pub const SPI_SLAVE: &str = "SPI Slave";
pub const GPIO_OUTPUT: &str = "GPIO Output";
pub const LED_DRIVE: &str = "LED Drive";
pub const I2C: &str = "I2C";
pub const I2C_MASTER: &str = "I2C Master";
pub const I2C_SLAVE: &str = "I2C Slave";
pub const CLOCK_OUT: &str = "Clock Out";
pub const CLOCK_IN: &str = "Clock In";

fn spi(builder: CatalogBuilder) -> CatalogBuilder {
    let mut builder = builder
        .family("SPI", "SPI")
        .interface_type(SPI_MASTER, "SPI", Some("SPI"))
        .requesting(SPI_MASTER)
        .interface_type(SPI_SLAVE, "SPI", Some("SPI"))
        .compatible_types(SPI_MASTER, SPI_SLAVE);
    for (reference, sharing) in [
        ("SCK", BusSharing::Shared),
        ("MOSI", BusSharing::Shared),
        ("MISO", BusSharing::Shared),
        ("CS", BusSharing::Exclusive),
    ] {
        builder = builder
            .interface_pin(SPI_MASTER, reference, PinType::Digital, sharing)
            .interface_pin(SPI_SLAVE, reference, PinType::Digital, sharing)
            .compatible_pins((SPI_MASTER, reference), (SPI_SLAVE, reference));
    }
    builder
}

fn gpio(builder: CatalogBuilder) -> CatalogBuilder {
    builder
        .family("GPIO", "GPIO")
        .interface_type(GPIO_OUTPUT, "GPIO", Some("GPIO"))
        .requesting(GPIO_OUTPUT)
        .interface_type(LED_DRIVE, "GPIO", Some("GPIO"))
        .compatible_types(GPIO_OUTPUT, LED_DRIVE)
        .interface_pin(GPIO_OUTPUT, "OUT", PinType::Digital, BusSharing::Exclusive)
        .interface_pin(LED_DRIVE, "IN", PinType::Digital, BusSharing::Exclusive)
        .compatible_pins((GPIO_OUTPUT, "OUT"), (LED_DRIVE, "IN"))
}

fn i2c(builder: CatalogBuilder) -> CatalogBuilder {
    let mut builder = builder
        .family("I2C", "I2C")
        .interface_type(I2C, "I2C", Some("I2C"))
        .interface_type(I2C_MASTER, "I2C", Some("I2C"))
        .requesting(I2C_MASTER)
        .interface_type(I2C_SLAVE, "I2C", Some("I2C"))
        .child_type(I2C, I2C_MASTER)
        .child_type(I2C, I2C_SLAVE)
        .compatible_types(I2C_MASTER, I2C_SLAVE);
    for reference in ["SDA", "SCL"] {
        builder = builder
            .interface_pin(I2C, reference, PinType::Digital, BusSharing::Shared)
            .interface_pin(I2C_MASTER, reference, PinType::Digital, BusSharing::Shared)
            .interface_pin(I2C_SLAVE, reference, PinType::Digital, BusSharing::Shared)
            .child_pin((I2C, reference), (I2C_MASTER, reference))
            .child_pin((I2C, reference), (I2C_SLAVE, reference))
            .compatible_pins((I2C_MASTER, reference), (I2C_SLAVE, reference));
    }
    builder
}

/// Clock pins are compatible, the types are not: wiring them relies on
/// positional pairing or an adapter.
fn clock(builder: CatalogBuilder) -> CatalogBuilder {
    builder
        .family("CLK", "CLK")
        .interface_type(CLOCK_OUT, "CLK", Some("CLK"))
        .requesting(CLOCK_OUT)
        .interface_type(CLOCK_IN, "CLK", Some("CLK"))
        .interface_pin(CLOCK_OUT, "CLK", PinType::Digital, BusSharing::Exclusive)
        .interface_pin(CLOCK_IN, "CKIN", PinType::Digital, BusSharing::Exclusive)
        .compatible_pins((CLOCK_OUT, "CLK"), (CLOCK_IN, "CKIN"))
}

fn parts(builder: CatalogBuilder) -> CatalogBuilder {
    let mut builder = builder
        .connectivity("MCU")
        .pin("MCU", "VDD", "1", PinType::Power)
        .pin("MCU", "GND", "2", PinType::Gnd)
        .pin("MCU", "PA4", "4", PinType::Digital)
        .pin("MCU", "PA5", "5", PinType::Digital)
        .pin("MCU", "PA6", "6", PinType::Digital)
        .pin("MCU", "PA7", "7", PinType::Digital)
        .pin("MCU", "PB6", "16", PinType::Digital)
        .pin("MCU", "PB7", "17", PinType::Digital);
    for pin in ["PA4", "PA5", "PA6", "PA7", "PB6", "PB7"] {
        builder = builder
            .voltage_reference("MCU", pin, "VDD")
            .gnd_reference("MCU", pin, "GND");
    }
    builder
        .interface(
            "MCU",
            "SPI1",
            SPI_MASTER,
            &[
                ("SCK", &["PA5"]),
                ("MOSI", &["PA7"]),
                ("MISO", &["PA6"]),
                ("CS", &["PA4"]),
            ],
        )
        .interface("MCU", "I2C1", I2C_MASTER, &[("SDA", &["PB7"]), ("SCL", &["PB6"])])
        .connectivity("FLASH")
        .pin("FLASH", "CS", "1", PinType::Digital)
        .pin("FLASH", "SO", "2", PinType::Digital)
        .pin("FLASH", "GND", "4", PinType::Gnd)
        .pin("FLASH", "SI", "5", PinType::Digital)
        .pin("FLASH", "SCK", "6", PinType::Digital)
        .pin("FLASH", "VCC", "8", PinType::Power)
        .interface(
            "FLASH",
            "SPI",
            SPI_SLAVE,
            &[
                ("SCK", &["SCK"]),
                ("MOSI", &["SI"]),
                ("MISO", &["SO"]),
                ("CS", &["CS"]),
            ],
        )
        .connectivity("NODE_A")
        .pin("NODE_A", "A3", "3", PinType::Digital)
        .interface("NODE_A", "CLK", SPI_MASTER, &[("SCK", &["A3"])])
        .connectivity("NODE_B")
        .pin("NODE_B", "B7", "7", PinType::Digital)
        .interface("NODE_B", "CLK", SPI_MASTER, &[("SCK", &["B7"])])
        .connectivity("DRIVER")
        .pin("DRIVER", "VDD", "1", PinType::Power)
        .pin("DRIVER", "GND", "2", PinType::Gnd)
        .pin("DRIVER", "A", "3", PinType::Digital)
        .voltage_reference("DRIVER", "A", "VDD")
        .gnd_reference("DRIVER", "A", "GND")
        .interface("DRIVER", "OUT", GPIO_OUTPUT, &[("OUT", &["A"])])
        .connectivity("LED")
        .pin("LED", "ANODE", "1", PinType::Digital)
        .pin("LED", "CATHODE", "2", PinType::Digital)
        .interface("LED", "IN", LED_DRIVE, &[("IN", &["ANODE"])])
        .connectivity("SENSOR")
        .pin("SENSOR", "SDA", "1", PinType::Digital)
        .pin("SENSOR", "SCL", "2", PinType::Digital)
        .pin("SENSOR", "VDD", "3", PinType::Power)
        .pin("SENSOR", "GND", "4", PinType::Gnd)
        .interface("SENSOR", "I2C1", I2C, &[("SDA", &["SDA"]), ("SCL", &["SCL"])])
        .connectivity("OSC")
        .pin("OSC", "OUT", "1", PinType::Digital)
        .interface("OSC", "CLKOUT", CLOCK_OUT, &[("CLK", &["OUT"])])
        .connectivity("PLL")
        .pin("PLL", "REF", "1", PinType::Digital)
        .pin("PLL", "REFN", "2", PinType::Digital)
        .interface("PLL", "CKIN", CLOCK_IN, &[("CKIN", &["REF"])])
        .interface("PLL", "CKDIFF", CLOCK_IN, &[("CKIN", &["REF", "REFN"])])
        .connectivity("TAP")
        .pin("TAP", "CK", "1", PinType::Digital)
        .interface("TAP", "SPI", SPI_SLAVE, &[("SCK", &["CK"])])
        .connectivity("RES")
        .pin("RES", "1", "1", PinType::Generic)
        .pin("RES", "2", "2", PinType::Generic)
        .connectivity("CAP")
        .pin("CAP", "1", "1", PinType::Generic)
        .pin("CAP", "2", "2", PinType::Generic)
        .connectivity("CONN")
        .pin("CONN", "1", "1", PinType::Generic)
        .pin("CONN", "2", "2", PinType::Generic)
        .pin("CONN", "3", "3", PinType::Generic)
        .pin("CONN", "4", "4", PinType::Generic)
}

/// A catalog with SPI, GPIO, generic I2C and clock families and a handful of
/// parts.
pub fn lab_catalog() -> Arc<Catalog> {
    let builder = parts(clock(i2c(gpio(spi(CatalogBuilder::new())))));
    Arc::new(builder.build().expect("lab catalog is consistent"))
}
