//! One generation run: index, configure, outline, place, route, drill,
//! then persist the board and export the fabrication files.

use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::board::Board;
use crate::configure::{draw_outline, BoardConfigurator};
use crate::drills::DrillPlacer;
use crate::error::{AssembleError, SkippedItem};
use crate::export::{bundle, gerber, kicad_pcb};
use crate::library::{FootprintIndex, FootprintResolver, IndexOptions, PlaceholderPolicy};
use crate::pads::PadAliasTable;
use crate::placement::{ComponentPlacer, PlacementRecord};
use crate::router::ConnectionRouter;
use crate::types::CircuitDescription;

pub const DEFAULT_PROJECT: &str = "dynamic_pcb";

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Base name of the output directory and of every output file.
    pub project_name: String,
    /// Directory the project directory is created in.
    pub output_root: PathBuf,
    pub index: IndexOptions,
    /// Also index the `libraries.footprint_paths` named in the description.
    pub description_libraries: bool,
    pub placeholder: PlaceholderPolicy,
    pub pad_aliases: PadAliasTable,
    /// Also write `<project>-gerbers.zip`.
    pub bundle_zip: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            project_name: DEFAULT_PROJECT.to_string(),
            output_root: PathBuf::from("."),
            index: IndexOptions::default(),
            description_libraries: true,
            placeholder: PlaceholderPolicy::default(),
            pad_aliases: PadAliasTable::default(),
            bundle_zip: false,
        }
    }
}

/// Project names become file names, so they are limited to
/// `[A-Za-z0-9._-]` and may not start with a dot.
pub fn validate_project_name(name: &str) -> Result<(), AssembleError> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(AssembleError::ProjectName(name.to_string()))
    }
}

/// What the in-memory stages produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssemblyReport {
    pub placed: Vec<PlacementRecord>,
    pub tracks: usize,
    pub drills: usize,
    pub skipped: Vec<SkippedItem>,
}

#[derive(Debug)]
pub struct Assembly {
    pub board: Board,
    pub report: AssemblyReport,
}

/// Outcome of a full run, printed by the CLI and returned by the server.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub project: String,
    pub board_file: PathBuf,
    pub gerber_dir: PathBuf,
    pub gerber_files: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<PathBuf>,
    #[serde(flatten)]
    pub assembly: AssemblyReport,
}

/// Build the board in memory without touching the output directory.
pub fn assemble(
    desc: &CircuitDescription,
    opts: &PipelineOptions,
) -> Result<Assembly, AssembleError> {
    let mut roots = opts.index.roots();
    if opts.description_libraries {
        roots.extend(desc.footprint_paths().iter().cloned());
    }
    let index = FootprintIndex::build(&roots)?;

    let mut board = Board::new();
    BoardConfigurator::apply(&mut board, desc.board.as_ref())?;
    draw_outline(&mut board, desc.board.as_ref())?;

    let placer = ComponentPlacer::new(FootprintResolver::new(&index, opts.placeholder.clone()));
    let placement = placer.place_all(&mut board, &desc.components);
    info!(
        "Placed {} of {} components",
        placement.placed.len(),
        desc.components.len()
    );
    let mut skipped = placement.skipped;

    let router = ConnectionRouter::new(&opts.pad_aliases);
    let (tracks, route_skips) = router.route(&mut board, &desc.connections, &placement.map);
    info!("Routed {tracks} of {} connections", desc.connections.len());
    skipped.extend(route_skips);

    let (drills, drill_skips) = DrillPlacer::place(&mut board, &desc.drills);
    skipped.extend(drill_skips);

    Ok(Assembly {
        board,
        report: AssemblyReport {
            placed: placement.placed,
            tracks,
            drills,
            skipped,
        },
    })
}

/// Run the whole pipeline and write `<root>/<project>/<project>.kicad_pcb`
/// plus the Gerber set under `<root>/<project>/gerbers/`.
pub fn generate(
    desc: &CircuitDescription,
    opts: &PipelineOptions,
) -> Result<GenerationReport, AssembleError> {
    let project = opts.project_name.as_str();
    validate_project_name(project)?;

    let Assembly { board, report } = assemble(desc, opts)?;

    let project_dir = opts.output_root.join(project);
    let board_file = project_dir.join(format!("{project}.kicad_pcb"));
    kicad_pcb::write_board(&board, &board_file)?;

    let gerber_dir = project_dir.join("gerbers");
    let files = gerber::plot_board(&board, project);
    let gerber_files = gerber::write_gerbers(&files, &gerber_dir)?;

    let archive = if opts.bundle_zip {
        let path = project_dir.join(format!("{project}-gerbers.zip"));
        bundle::write_bundle(&files, &path)?;
        Some(path)
    } else {
        None
    };

    if !report.skipped.is_empty() {
        info!("{} items skipped", report.skipped.len());
    }

    Ok(GenerationReport {
        project: project.to_string(),
        board_file,
        gerber_dir,
        gerber_files,
        archive,
        assembly: report,
    })
}

/// Read a description file and run [`generate`].
pub fn generate_from_file(
    path: &Path,
    opts: &PipelineOptions,
) -> Result<GenerationReport, AssembleError> {
    let data = std::fs::read(path)?;
    let desc = CircuitDescription::from_json_slice(&data)?;
    generate(&desc, opts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ItemKind;
    use serde_json::json;

    const R0805: &str = r#"(footprint "R_0805_2012Metric" (layer "F.Cu")
  (fp_line (start -0.227 -0.735) (end 0.227 -0.735) (layer "F.SilkS") (width 0.12))
  (pad "1" smd roundrect (at -0.9125 0) (size 1.025 1.4) (layers "F.Cu" "F.Paste" "F.Mask") (roundrect_rratio 0.25))
  (pad "2" smd roundrect (at 0.9125 0) (size 1.025 1.4) (layers "F.Cu" "F.Paste" "F.Mask") (roundrect_rratio 0.25))
)"#;

    fn options(root: &Path) -> PipelineOptions {
        let lib = root.join("libs").join("Resistor_SMD.pretty");
        std::fs::create_dir_all(&lib).unwrap();
        std::fs::write(lib.join("R_0805_2012Metric.kicad_mod"), R0805).unwrap();
        PipelineOptions {
            project_name: "demo".into(),
            output_root: root.join("out"),
            index: IndexOptions::only([root.join("libs")]),
            ..Default::default()
        }
    }

    fn description(value: serde_json::Value) -> CircuitDescription {
        CircuitDescription::from_value(value).unwrap()
    }

    #[test]
    fn test_project_names() {
        for ok in ["demo", "blink_v2", "board-1.0"] {
            assert!(validate_project_name(ok).is_ok(), "{ok}");
        }
        for bad in ["", ".hidden", "../escape", "a/b", "with space"] {
            assert!(
                matches!(validate_project_name(bad), Err(AssembleError::ProjectName(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_assemble_collects_skips_per_stage() {
        let tmp = tempfile::tempdir().unwrap();
        let opts = options(tmp.path());
        let desc = description(json!({
            "board": {"size": {"width": 50, "height": 30}},
            "components": [
                {"name": "R1", "footprint": "R_0805_2012Metric", "position": {"x": 10, "y": 10}},
                {"name": "R2", "footprint": "R_0805_2012Metric"}
            ],
            "connections": [{"from": "R1:1", "to": "R9:1"}],
            "drills": [{"position": {"x": 3, "y": 3}, "diameter": 3.2}, {"diameter": 3.2}]
        }));

        let Assembly { board, report } = assemble(&desc, &opts).unwrap();
        assert_eq!(board.footprints.len(), 1);
        assert_eq!(report.placed.len(), 1);
        assert_eq!(report.tracks, 0);
        assert_eq!(report.drills, 1);
        let kinds: Vec<ItemKind> = report.skipped.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![ItemKind::Component, ItemKind::Connection, ItemKind::Drill]
        );
    }

    #[test]
    fn test_missing_outline_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let opts = options(tmp.path());
        let desc = description(json!({"components": []}));
        assert!(matches!(
            assemble(&desc, &opts),
            Err(AssembleError::Outline(_))
        ));
    }

    #[test]
    fn test_generate_writes_outputs() {
        let tmp = tempfile::tempdir().unwrap();
        let opts = PipelineOptions {
            bundle_zip: true,
            ..options(tmp.path())
        };
        let desc = description(json!({
            "board": {"size": {"width": 50, "height": 30}},
            "components": [
                {"name": "R1", "footprint": "R_0805_2012Metric", "position": {"x": 10, "y": 10}}
            ]
        }));

        let report = generate(&desc, &opts).unwrap();
        assert_eq!(report.board_file, tmp.path().join("out/demo/demo.kicad_pcb"));
        assert!(report.board_file.exists());
        assert_eq!(report.gerber_files.len(), 7);
        assert!(report.archive.as_ref().is_some_and(|a| a.exists()));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["project"], "demo");
        assert_eq!(json["placed"][0]["method"], "exact");
    }

    #[test]
    fn test_invalid_project_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let opts = PipelineOptions {
            project_name: "../x".into(),
            ..options(tmp.path())
        };
        let desc = description(json!({"board": {"size": {"width": 10, "height": 10}}}));
        assert!(generate(&desc, &opts).is_err());
        assert!(!tmp.path().join("out").exists());
    }
}
