//! RS-274X writer with X2 file attributes.
//!
//! Each file is built in two passes: the board is walked once to collect
//! plot operations (interning apertures as they are met), then the header,
//! the aperture list and the operations are written out. Nothing depends on
//! hash order or the clock, so equal boards give byte-identical files.

mod apertures;
pub mod coord;
pub mod layers;

use log::{debug, info};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::board::{Board, Drawing, Graphic, Layer, EDGE_WIDTH};
use crate::error::AssembleError;
use crate::footprint::{PadDef, PadKind, PadShape, PlacedFootprint};
use crate::types::{arc_center, rotate_and_translate};

use self::apertures::{ApertureTable, ApertureTemplate};
use self::coord::CoordinateConverter;
pub use self::layers::{FabLayer, PLOT_ORDER};

const GENERATOR: &str = "pcb-assemble";

/// One plotted fabrication file.
#[derive(Debug, Clone, PartialEq)]
pub struct GerberFile {
    pub layer: FabLayer,
    pub file_name: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Op {
    Stroke {
        aperture: u32,
        points: Vec<[f64; 2]>,
    },
    Arc {
        aperture: u32,
        start: [f64; 2],
        end: [f64; 2],
        center: [f64; 2],
        clockwise: bool,
    },
    Circle {
        aperture: u32,
        center: [f64; 2],
        radius: f64,
    },
    Flash {
        aperture: u32,
        at: [f64; 2],
    },
    Region {
        points: Vec<[f64; 2]>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interpolation {
    Linear,
    Clockwise,
    CounterClockwise,
}

impl Interpolation {
    fn code(&self) -> &'static str {
        match self {
            Interpolation::Linear => "G01*",
            Interpolation::Clockwise => "G02*",
            Interpolation::CounterClockwise => "G03*",
        }
    }
}

#[derive(Default)]
struct Plot {
    apertures: ApertureTable,
    ops: Vec<Op>,
}

impl Plot {
    fn stroke(&mut self, width: f64, points: Vec<[f64; 2]>) {
        let aperture = self.apertures.intern(ApertureTemplate::Circle { diameter: width });
        self.ops.push(Op::Stroke { aperture, points });
    }

    fn graphic(&mut self, g: &Graphic) {
        let width = if g.width > 0.0 {
            g.width
        } else if g.layer == Layer::EdgeCuts {
            EDGE_WIDTH
        } else {
            0.0
        };
        let stroked = width > 0.0;

        match &g.drawing {
            Drawing::Segment { start, end } if stroked => self.stroke(width, vec![*start, *end]),
            Drawing::Rect { start, end } if stroked => {
                let [x0, y0] = *start;
                let [x1, y1] = *end;
                self.stroke(
                    width,
                    vec![[x0, y0], [x1, y0], [x1, y1], [x0, y1], [x0, y0]],
                );
            }
            Drawing::Circle { center, radius } if stroked => {
                let aperture = self.apertures.intern(ApertureTemplate::Circle { diameter: width });
                self.ops.push(Op::Circle {
                    aperture,
                    center: *center,
                    radius: *radius,
                });
            }
            Drawing::Arc { start, mid, end } if stroked => match arc_center(*start, *mid, *end) {
                Some((center, _)) => {
                    // Board y points down, so a left turn on the board is a
                    // right turn in Gerber space.
                    let cross = (mid[0] - start[0]) * (end[1] - mid[1])
                        - (mid[1] - start[1]) * (end[0] - mid[0]);
                    let aperture =
                        self.apertures.intern(ApertureTemplate::Circle { diameter: width });
                    self.ops.push(Op::Arc {
                        aperture,
                        start: *start,
                        end: *end,
                        center,
                        clockwise: cross > 0.0,
                    });
                }
                None => self.stroke(width, vec![*start, *end]),
            },
            Drawing::Polygon { points, filled } if points.len() >= 2 => {
                if *filled && points.len() >= 3 {
                    self.ops.push(Op::Region {
                        points: points.clone(),
                    });
                }
                if stroked {
                    let mut closed = points.clone();
                    closed.push(points[0]);
                    self.stroke(width, closed);
                }
            }
            _ => {}
        }
    }

    fn pad(&mut self, fp: &PlacedFootprint, pad: &PadDef) {
        let at = fp.pad_position(pad);
        let angle = fp.pad_angle(pad).rem_euclid(360.0);
        let quarter = (angle / 90.0).round();
        let right_angle = (angle - quarter * 90.0).abs() < 1e-6;
        let [w, h] = pad.size;
        let [w_board, h_board] = if right_angle && (quarter as i64) % 2 == 1 {
            [h, w]
        } else {
            [w, h]
        };
        // local offsets around the pad centre, rotated with the pad
        let local = |dx: f64, dy: f64| {
            let (x, y) = rotate_and_translate(dx, dy, at[0], at[1], angle);
            [x, y]
        };

        match pad.shape {
            PadShape::Circle => {
                let aperture = self.apertures.intern(ApertureTemplate::Circle { diameter: w });
                self.ops.push(Op::Flash { aperture, at });
            }
            PadShape::Oval if right_angle => {
                let aperture = self.apertures.intern(ApertureTemplate::Obround {
                    x_size: w_board,
                    y_size: h_board,
                });
                self.ops.push(Op::Flash { aperture, at });
            }
            PadShape::Oval => {
                let half = (w - h).abs() / 2.0;
                let (a, b) = if w >= h {
                    (local(-half, 0.0), local(half, 0.0))
                } else {
                    (local(0.0, -half), local(0.0, half))
                };
                self.stroke(w.min(h), vec![a, b]);
            }
            _ if right_angle => {
                let aperture = self.apertures.intern(ApertureTemplate::Rectangle {
                    x_size: w_board,
                    y_size: h_board,
                });
                self.ops.push(Op::Flash { aperture, at });
            }
            _ => {
                let (hw, hh) = (w / 2.0, h / 2.0);
                self.ops.push(Op::Region {
                    points: vec![
                        local(-hw, -hh),
                        local(hw, -hh),
                        local(hw, hh),
                        local(-hw, hh),
                    ],
                });
            }
        }
    }

    /// Walk the board and collect everything visible on `layer`.
    fn collect(board: &Board, layer: FabLayer) -> Self {
        let mut plot = Plot::default();
        let target = layer.board_layer();

        for g in board.graphics_on(&target) {
            plot.graphic(g);
        }
        if layer.is_copper() {
            for track in board.tracks.iter().filter(|t| t.layer == target) {
                plot.stroke(track.width, vec![track.start, track.end]);
            }
        }
        for fp in &board.footprints {
            for g in fp.board_graphics().filter(|g| g.layer == target) {
                plot.graphic(&g);
            }
            if layer.is_copper() || layer.is_mask() {
                for pad in fp.def.pads.iter().filter(|p| p.on_layer(&target)) {
                    if layer.is_copper() && pad.kind == PadKind::NpThruHole {
                        continue;
                    }
                    plot.pad(fp, pad);
                }
            }
        }
        plot
    }

    fn render(&self, layer: FabLayer, copper_layers: u8) -> String {
        let conv = CoordinateConverter::default();
        let mut out = String::new();

        let _ = writeln!(
            out,
            "%TF.GenerationSoftware,{GENERATOR},{GENERATOR},{}*%",
            env!("CARGO_PKG_VERSION")
        );
        let _ = writeln!(out, "%TF.SameCoordinates,Original*%");
        let _ = writeln!(out, "%TF.FileFunction,{}*%", layer.file_function(copper_layers));
        let _ = writeln!(out, "%TF.FilePolarity,{}*%", layer.polarity());
        let _ = writeln!(out, "{}", conv.fs_command());
        let _ = writeln!(
            out,
            "G04 Gerber Fmt {}.{}, Leading zero omitted, Abs format (unit mm)*",
            conv.format.integer, conv.format.decimal
        );
        let _ = writeln!(out, "{}", conv.mo_command());
        out.push_str("%LPD*%\nG01*\nG75*\n");
        out.push_str("G04 APERTURE LIST*\n");
        for def in self.apertures.definitions() {
            out.push_str(&def);
            out.push('\n');
        }
        out.push_str("G04 APERTURE END LIST*\n");

        let mut current: Option<u32> = None;
        let mut mode = Interpolation::Linear;
        let mut select = |out: &mut String, aperture: u32| {
            if current != Some(aperture) {
                let _ = writeln!(out, "D{aperture}*");
                current = Some(aperture);
            }
        };
        let mut set_mode = |out: &mut String, wanted: Interpolation| {
            if mode != wanted {
                out.push_str(wanted.code());
                out.push('\n');
                mode = wanted;
            }
        };

        for op in &self.ops {
            match op {
                Op::Stroke { aperture, points } => {
                    select(&mut out, *aperture);
                    set_mode(&mut out, Interpolation::Linear);
                    for (i, p) in points.iter().enumerate() {
                        let d = if i == 0 { "D02" } else { "D01" };
                        let _ = writeln!(out, "{}{d}*", conv.xy(*p));
                    }
                }
                Op::Arc {
                    aperture,
                    start,
                    end,
                    center,
                    clockwise,
                } => {
                    select(&mut out, *aperture);
                    let _ = writeln!(out, "{}D02*", conv.xy(*start));
                    set_mode(
                        &mut out,
                        if *clockwise {
                            Interpolation::Clockwise
                        } else {
                            Interpolation::CounterClockwise
                        },
                    );
                    let _ = writeln!(out, "{}{}D01*", conv.xy(*end), conv.ij(*start, *center));
                }
                Op::Circle {
                    aperture,
                    center,
                    radius,
                } => {
                    select(&mut out, *aperture);
                    let start = [center[0] + radius, center[1]];
                    let _ = writeln!(out, "{}D02*", conv.xy(start));
                    set_mode(&mut out, Interpolation::CounterClockwise);
                    let _ = writeln!(out, "{}{}D01*", conv.xy(start), conv.ij(start, *center));
                }
                Op::Flash { aperture, at } => {
                    select(&mut out, *aperture);
                    let _ = writeln!(out, "{}D03*", conv.xy(*at));
                }
                Op::Region { points } => {
                    set_mode(&mut out, Interpolation::Linear);
                    out.push_str("G36*\n");
                    for (i, p) in points.iter().chain(points.first()).enumerate() {
                        let d = if i == 0 { "D02" } else { "D01" };
                        let _ = writeln!(out, "{}{d}*", conv.xy(*p));
                    }
                    out.push_str("G37*\n");
                }
            }
        }

        out.push_str("M02*\n");
        out
    }
}

/// Plot one fabrication layer of the board.
pub fn plot_layer(board: &Board, layer: FabLayer) -> String {
    let plot = Plot::collect(board, layer);
    debug!(
        "{}: {} apertures, {} operations",
        layer.suffix(),
        plot.apertures.len(),
        plot.ops.len()
    );
    plot.render(layer, board.settings.copper_layers)
}

/// Plot all seven layers in fabrication order.
pub fn plot_board(board: &Board, project: &str) -> Vec<GerberFile> {
    PLOT_ORDER
        .iter()
        .map(|&layer| GerberFile {
            layer,
            file_name: layer.file_name(project),
            content: plot_layer(board, layer),
        })
        .collect()
}

/// Write plotted files into `dir`, returning the paths in plot order.
pub fn write_gerbers(files: &[GerberFile], dir: &Path) -> Result<Vec<PathBuf>, AssembleError> {
    std::fs::create_dir_all(dir)?;
    let mut paths = Vec::new();
    for file in files {
        let path = dir.join(&file.file_name);
        std::fs::write(&path, file.content.as_bytes())?;
        paths.push(path);
    }
    info!("Gerbers written to {}", dir.display());
    Ok(paths)
}
