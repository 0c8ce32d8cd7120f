use pcb_synth::{SynthConfig, SynthError};
use pcb_test_utils::Bench;

fn two_boards() -> Bench {
    pcb_test_utils::init_logging();
    let mut bench = Bench::new();
    let main = bench.board("MAIN");
    let aux = bench.board("AUX");
    let a = bench.part(Some(main), "U1", "clock", "NODE_A");
    let b = bench.part(Some(aux), "U1", "clock", "NODE_B");
    bench.connect(a, "CLK", b, "CLK", "clock");
    bench
}

#[test]
fn nets_split_at_board_boundaries() {
    let bench = two_boards();
    let circuit = &bench.circuit;
    let a = circuit.find("MAIN.U1").unwrap();
    let a3 = bench.pin(a, "A3");

    let mut spec = bench.spec().with_boards(&["MAIN", "AUX"]).unwrap();
    let main = spec.main_board().unwrap();
    assert_eq!(spec.board(a), Some(main));

    let netlist = spec.netlist().unwrap();
    assert_eq!(netlist.len(), 2);
    let on_main = netlist.ordered_nets(Some(main));
    assert_eq!(on_main.len(), 1);
    assert!(on_main[0].contains(a3));
    assert_eq!(on_main[0].name(), Some("SPI_SCK"));

    insta::assert_snapshot!(netlist.render().trim_end(), @r"
    [MAIN]
    SPI_SCK: MAIN.U1.A3
    [AUX]
    SPI_SCK: AUX.U1.B7
    ");
}

#[test]
fn board_split_can_be_turned_off() {
    let config = SynthConfig::from_toml_str("split_by_board = false").unwrap();
    let mut spec = two_boards()
        .spec_with(config)
        .with_boards(&["MAIN", "AUX"])
        .unwrap();
    let netlist = spec.netlist().unwrap();
    assert_eq!(netlist.len(), 1);
    assert_eq!(
        netlist.named_nets()["SPI_SCK"],
        vec!["AUX.U1.B7", "MAIN.U1.A3"]
    );
}

#[test]
fn boards_are_children_of_the_root() {
    let err = two_boards().spec().with_boards(&["MAIN.U1"]).unwrap_err();
    assert!(matches!(err, SynthError::InvalidBoard(_)), "{err}");
}

#[test]
fn references_flatten_per_designator() {
    let spec = two_boards().spec();
    let flat = spec.flattened_references().unwrap();
    assert_eq!(flat["MAIN.U1"], "U1");
    assert_eq!(flat["AUX.U1"], "U2");
    assert_eq!(spec.board_reference(None), "MAIN");
}
