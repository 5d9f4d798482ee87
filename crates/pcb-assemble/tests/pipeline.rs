use approx::assert_abs_diff_eq;
use pcb_assemble::parsers::kicad_sexpr;
use pcb_assemble::{
    assemble, generate, generate_from_file, AssembleError, CircuitDescription, IndexOptions,
    ItemKind, PipelineOptions, ResolutionMethod, SkipReason,
};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/footprints")
}

fn options(output_root: &Path, project: &str) -> PipelineOptions {
    PipelineOptions {
        project_name: project.to_string(),
        output_root: output_root.to_path_buf(),
        index: IndexOptions::only([fixtures()]),
        ..Default::default()
    }
}

fn description(value: Value) -> CircuitDescription {
    CircuitDescription::from_value(value).unwrap()
}

fn blink() -> CircuitDescription {
    description(json!({
        "board": {
            "size": {"width": 60, "height": 45},
            "track_width": 0.3,
            "clearance": 0.25,
            "layers": ["F.Cu Copper", "B.Cu Copper", "F.SilkS"]
        },
        "components": [
            {"name": "U1", "footprint": "DIP-28_W7.62mm", "type": "ATmega328P", "position": {"x": 20, "y": 5}},
            {"name": "R1", "footprint": "R_0805_2012Metric", "value": "330", "position": {"x": 40, "y": 10}, "rotation": 90},
            {"name": "D1", "footprint": "LED_D5.0mm", "value": "red", "position": {"x": 45, "y": 25}}
        ],
        "connections": [
            {"from": "U1:PB5", "to": "R1:1"},
            {"from": "R1:2", "to": "D1:A"},
            {"from": "D1:K", "to": "U1:GND"}
        ],
        "drills": [
            {"position": {"x": 3, "y": 3}, "diameter": 3.2},
            {"position": {"x": 57, "y": 42}, "diameter": 3.2}
        ]
    }))
}

#[test]
fn test_single_resistor_board() {
    let tmp = tempfile::tempdir().unwrap();
    let desc = description(json!({
        "board": {"size": {"width": 50, "height": 30}},
        "components": [
            {"name": "R1", "footprint": "R_0805_2012Metric", "value": "10k", "position": {"x": 10, "y": 10}}
        ]
    }));

    let report = generate(&desc, &options(tmp.path(), "demo")).unwrap();
    assert!(report.assembly.skipped.is_empty());
    assert_eq!(report.assembly.placed.len(), 1);
    assert_eq!(report.assembly.placed[0].method, ResolutionMethod::Exact);

    let text = std::fs::read_to_string(&report.board_file).unwrap();
    let root = kicad_sexpr::parse(text.as_bytes()).unwrap();
    let outline: Vec<_> = root
        .find_all("gr_line")
        .into_iter()
        .filter(|l| l.value("layer") == Some("Edge.Cuts"))
        .collect();
    assert_eq!(outline.len(), 4);
    assert_eq!(root.find_all("footprint").len(), 1);
    assert!(root.find_all("segment").is_empty());

    let names: Vec<String> = report
        .gerber_files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 7);
    assert!(names.iter().all(|n| n.starts_with("demo-")));
    assert_eq!(report.gerber_dir, tmp.path().join("demo").join("gerbers"));
}

#[test]
fn test_outputs_are_byte_identical_across_runs() {
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    let ra = generate(&blink(), &options(a.path(), "blink")).unwrap();
    let rb = generate(&blink(), &options(b.path(), "blink")).unwrap();

    assert_eq!(
        std::fs::read(&ra.board_file).unwrap(),
        std::fs::read(&rb.board_file).unwrap()
    );
    for (fa, fb) in ra.gerber_files.iter().zip(&rb.gerber_files) {
        assert_eq!(fa.file_name(), fb.file_name());
        assert_eq!(std::fs::read(fa).unwrap(), std::fs::read(fb).unwrap());
    }
}

#[test]
fn test_blink_routes_through_aliases() {
    let tmp = tempfile::tempdir().unwrap();
    let assembly = assemble(&blink(), &options(tmp.path(), "blink")).unwrap();
    let board = &assembly.board;

    assert!(assembly.report.skipped.is_empty(), "{:?}", assembly.report.skipped);
    assert_eq!(assembly.report.tracks, 3);
    assert_eq!(assembly.report.drills, 2);
    assert_eq!(board.settings.clearance, 0.25);
    assert_eq!(board.settings.copper_layers, 2);

    // PB5 is pad 19 on the DIP-28: right row, 9 pitches down
    let first = &board.tracks[0];
    assert_abs_diff_eq!(first.start[0], 27.62, epsilon = 1e-9);
    assert_abs_diff_eq!(first.start[1], 5.0 + 9.0 * 2.54, epsilon = 1e-9);
    // R1 is rotated 90°, so pad 1 moves from the left to below the centre
    assert_abs_diff_eq!(first.end[0], 40.0, epsilon = 1e-9);
    assert_abs_diff_eq!(first.end[1], 10.9125, epsilon = 1e-9);
    assert!(board.tracks.iter().all(|t| t.width == 0.3));

    // D1:K is pad 2, U1:GND pad 8
    let last = &board.tracks[2];
    assert_abs_diff_eq!(last.start[0], 47.54, epsilon = 1e-9);
    assert_abs_diff_eq!(last.end[1], 5.0 + 7.0 * 2.54, epsilon = 1e-9);
}

#[test]
fn test_missing_component_skips_only_its_connection() {
    let tmp = tempfile::tempdir().unwrap();
    let desc = description(json!({
        "board": {"size": {"width": 60, "height": 45}},
        "components": [
            {"name": "U1", "footprint": "DIP-28_W7.62mm", "position": {"x": 20, "y": 5}},
            {"name": "D1", "footprint": "LED_D5.0mm", "position": {"x": 45, "y": 25}}
        ],
        "connections": [
            {"from": "U1:VCC", "to": "R1:1"},
            {"from": "U1:PB5", "to": "D1:A"},
            {"from": "U1:PB7", "to": "D1:K"},
            {"from": "U1", "to": "D1:K"}
        ]
    }));

    let assembly = assemble(&desc, &options(tmp.path(), "demo")).unwrap();
    assert_eq!(assembly.report.tracks, 1);
    let skipped = &assembly.report.skipped;
    assert_eq!(skipped.len(), 3);
    assert!(skipped.iter().all(|s| s.kind == ItemKind::Connection));
    assert_eq!(skipped[0].id, "U1:VCC -> R1:1");
    assert_eq!(
        skipped[0].reason,
        SkipReason::ComponentMissing {
            component: "R1".into()
        }
    );
    match &skipped[1].reason {
        SkipReason::PadMissing {
            component,
            pin,
            available,
        } => {
            assert_eq!(component, "U1");
            assert_eq!(pin, "PB7");
            assert_eq!(available.len(), 28);
        }
        other => panic!("unexpected skip: {other:?}"),
    }
    assert!(matches!(
        skipped[2].reason,
        SkipReason::MalformedEndpoint { .. }
    ));
}

#[test]
fn test_fuzzy_and_placeholder_resolution() {
    let tmp = tempfile::tempdir().unwrap();
    let desc = description(json!({
        "board": {"size": {"width": 30, "height": 30}},
        "components": [
            {"name": "R1", "footprint": " r-0603-1608metric ", "position": {"x": 5, "y": 5}},
            {"name": "C1", "footprint": "C_0402_1005Metric", "position": {"x": 15, "y": 5}},
            {"name": "H1", "footprint": "MountingHole_3.2mm_M3", "position": {"x": "25", "y": "25"}}
        ]
    }));

    let assembly = assemble(&desc, &options(tmp.path(), "demo")).unwrap();
    let placed = &assembly.report.placed;
    assert_eq!(placed.len(), 3);
    assert_eq!(placed[0].method, ResolutionMethod::Fuzzy);
    assert_eq!(placed[0].footprint, "Resistor_SMD:R_0603_1608Metric");
    assert_eq!(placed[1].method, ResolutionMethod::Placeholder);
    assert_eq!(placed[1].footprint, "Resistor_SMD:R_0805_2012Metric");
    assert_eq!(placed[1].requested, "C_0402_1005Metric");
    assert_eq!(placed[2].position, [25.0, 25.0]);

    // Value text falls back to the component name
    assert_eq!(assembly.board.footprints[1].value, "C1");
}

#[test]
fn test_malformed_items_are_skipped_individually() {
    let tmp = tempfile::tempdir().unwrap();
    let desc = description(json!({
        "board": {"size": {"width": 50, "height": 30}},
        "components": [
            {"name": "R1", "footprint": "R_0805_2012Metric", "position": {"x": 10, "y": 10}},
            {"name": "R2", "footprint": "R_0805_2012Metric", "position": {"x": 20, "y": 10}, "rotation": [90]},
            {"name": 5, "footprint": "R_0805_2012Metric", "position": {"x": 30, "y": 10}},
            {"name": "R4", "footprint": {"lib": "Resistor_SMD"}, "position": {"x": 40, "y": 10}}
        ],
        "connections": [
            {"from": "R1:2", "to": "5:1"},
            {"from": ["R1", 1], "to": "R2:1"}
        ],
        "drills": [
            {"position": {"x": 3, "y": 3}, "diameter": 3.2},
            {"position": {"x": true, "y": 3}, "diameter": 3.2},
            {"position": {"x": 47, "y": 27}, "diameter": {"mm": 3.2}}
        ]
    }));

    let report = generate(&desc, &options(tmp.path(), "demo")).unwrap();
    let assembly = &report.assembly;
    let placed: Vec<&str> = assembly.placed.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(placed, ["R1", "5"]);
    assert_eq!(assembly.tracks, 1);
    assert_eq!(assembly.drills, 1);
    assert!(report.board_file.exists());

    let skipped: Vec<(ItemKind, &str)> = assembly
        .skipped
        .iter()
        .map(|s| (s.kind, s.id.as_str()))
        .collect();
    assert_eq!(
        skipped,
        [
            (ItemKind::Component, "R2"),
            (ItemKind::Component, "R4"),
            (ItemKind::Connection, "? -> R2:1"),
            (ItemKind::Drill, "1"),
            (ItemKind::Drill, "2"),
        ]
    );
    assert_eq!(
        assembly.skipped[0].reason,
        SkipReason::InvalidField {
            field: "rotation",
            value: "[90]".into()
        }
    );
    assert_eq!(
        assembly.skipped[1].reason,
        SkipReason::MissingField { field: "footprint" }
    );
}

#[test]
fn test_partial_board_config() {
    let tmp = tempfile::tempdir().unwrap();
    let desc = description(json!({
        "board": {"size": {"width": 20, "height": 20}, "track_width": 0.3}
    }));
    let assembly = assemble(&desc, &options(tmp.path(), "demo")).unwrap();
    assert_eq!(assembly.board.settings.track_width, 0.3);
    assert_eq!(assembly.board.settings.clearance, 0.2);
    assert_eq!(assembly.board.settings.copper_layers, 2);
}

#[test]
fn test_invalid_track_width_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let desc = description(json!({
        "board": {"size": {"width": 20, "height": 20}, "track_width": -1}
    }));
    let err = generate(&desc, &options(tmp.path(), "demo")).unwrap_err();
    assert!(matches!(err, AssembleError::Config(_)));
    assert!(!tmp.path().join("demo").exists());
}

#[test]
fn test_description_libraries_are_indexed() {
    let tmp = tempfile::tempdir().unwrap();
    let desc = description(json!({
        "board": {"size": {"width": 20, "height": 20}},
        "components": [
            {"name": "R1", "footprint": "R_0805_2012Metric", "position": {"x": 5, "y": 5}}
        ],
        "libraries": {"footprint_paths": [fixtures().join("Resistor_SMD.pretty")]}
    }));
    let opts = PipelineOptions {
        index: IndexOptions::only(Vec::new()),
        ..options(tmp.path(), "demo")
    };
    let assembly = assemble(&desc, &opts).unwrap();
    assert_eq!(assembly.report.placed.len(), 1);

    let closed = PipelineOptions {
        description_libraries: false,
        ..opts
    };
    let assembly = assemble(&desc, &closed).unwrap();
    assert!(assembly.report.placed.is_empty());
    assert_eq!(
        assembly.report.skipped[0].reason,
        SkipReason::FootprintUnresolved {
            requested: "R_0805_2012Metric".into()
        }
    );
}

#[test]
fn test_raw_response_file_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("design.json");
    std::fs::write(&path, r#"{"raw_response": "Here is your circuit: ..."}"#).unwrap();
    let err = generate_from_file(&path, &options(tmp.path(), "demo")).unwrap_err();
    assert!(matches!(err, AssembleError::UnparsedDescription));
}

#[test]
fn test_zip_bundle() {
    let tmp = tempfile::tempdir().unwrap();
    let opts = PipelineOptions {
        bundle_zip: true,
        ..options(tmp.path(), "blink")
    };
    let report = generate(&blink(), &opts).unwrap();
    let archive_path = report.archive.unwrap();
    assert_eq!(archive_path, tmp.path().join("blink").join("blink-gerbers.zip"));
    let archive = zip::ZipArchive::new(std::fs::File::open(archive_path).unwrap()).unwrap();
    assert_eq!(archive.len(), 7);
}
