//! Circuit topology and netlist synthesis.
//!
//! A [`Circuit`] is a tree of parts and subcircuits built against a
//! [`pcb_catalog::Catalog`]. Bus fragments declare which interfaces talk to
//! each other; they are grouped into [`Bus`]es, decorated with
//! [`Ancillary`] parts and finally turned into named nets by
//! [`SmartNetlist::from_spec`].

use std::path::Path;

use anyhow::Context;

pub mod ancillary;
pub mod bus;
pub mod bus_fragment;
pub mod component;
pub mod config;
pub mod error;
pub mod naming;
pub mod netlist;
pub mod spec;

pub use ancillary::{
    Ancillary, AncillaryAppliesTo, AncillaryBinding, AncillaryConnection,
    AncillaryConnectionRole, AncillaryType, AppliedConnection, ConnectionTarget, ConnectionType,
};
pub use bus::{Bus, BusMember};
pub use bus_fragment::{BusFragment, BusFragmentBuilder, DeferReason, FragmentSource, Side};
pub use component::{
    Circuit, Component, ComponentFilter, ComponentId, ComponentInterface, ComponentKind,
    ComponentPin, FragmentId, InterfaceRef, Node, PinUse, ROOT_REFERENCE,
};
pub use config::SynthConfig;
pub use error::{ErrorKind, SynthError};
pub use naming::NetNameTemplate;
pub use netlist::{SmartNet, SmartNetlist};
pub use spec::Spec;

/// Synthesizes the nets of `circuit`, reading options from `config` when
/// given and declaring `boards` (root children, by reference).
pub fn synthesize(
    circuit: Circuit,
    config: Option<&Path>,
    boards: &[&str],
) -> anyhow::Result<(Spec, SmartNetlist)> {
    let config = match config {
        Some(path) => SynthConfig::load(path)
            .with_context(|| format!("Failed to load synthesis config {}", path.display()))?,
        None => SynthConfig::default(),
    };
    let mut spec = Spec::new(circuit, config)
        .with_boards(boards)
        .context("Failed to declare boards")?;
    let netlist = spec.netlist().context("Failed to synthesize nets")?;
    Ok((spec, netlist))
}
