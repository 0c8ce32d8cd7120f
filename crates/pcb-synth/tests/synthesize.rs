mod common;

use common::{driver_and_led, pullup};

#[test]
fn synthesizes_with_a_config_file() {
    let (bench, _, _) = driver_and_led();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("synth.toml");
    std::fs::write(&path, "main_board = \"CTRL\"\n").unwrap();

    let (spec, netlist) = pcb_synth::synthesize(bench.circuit, Some(&path), &[]).unwrap();
    assert_eq!(spec.main_board_reference(), "CTRL");
    assert_eq!(netlist.named_nets()["DRIVER_A"], vec!["D1.ANODE", "IC1.A"]);
    assert!(netlist.render().starts_with("[CTRL]\n"));
}

#[test]
fn failures_carry_context() {
    let (mut bench, ic, _) = driver_and_led();
    pullup(&mut bench, ic, "DRIVER", "A", "R2", None);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("synth.toml");
    std::fs::write(&path, "strict = true\n").unwrap();

    let err = pcb_synth::synthesize(bench.circuit, Some(&path), &[]).unwrap_err();
    assert_eq!(err.to_string(), "Failed to synthesize nets");
    assert!(format!("{err:#}").contains("no bus could be found"));

    let missing = dir.path().join("missing.toml");
    let (bench, _, _) = driver_and_led();
    let err = pcb_synth::synthesize(bench.circuit, Some(&missing), &[]).unwrap_err();
    assert!(err.to_string().starts_with("Failed to load synthesis config"));
}
