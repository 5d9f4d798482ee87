use crate::board::{Drawing, Graphic, Layer};
use crate::error::AssembleError;
use crate::footprint::{Drill, FootprintDef, FootprintText, PadDef, PadKind, PadShape, TextKind};
use crate::parsers::kicad_sexpr::{self, SExpr};
use std::path::Path;

/// File extension of a single footprint definition.
pub const FOOTPRINT_EXT: &str = "kicad_mod";

/// Load `<library_dir>/<name>.kicad_mod`.
pub fn load_footprint(library_dir: &Path, name: &str) -> Result<FootprintDef, AssembleError> {
    let path = library_dir.join(format!("{name}.{FOOTPRINT_EXT}"));
    let data = std::fs::read(&path)?;
    let library = library_dir
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_string();
    parse_footprint(&data, &library)
}

/// Parse a KiCad footprint (`footprint`, or legacy `module`) from bytes.
pub fn parse_footprint(data: &[u8], library: &str) -> Result<FootprintDef, AssembleError> {
    let root = kicad_sexpr::parse(data)
        .map_err(|e| AssembleError::ParseError(format!("S-expression parse error: {e}")))?;

    match root.tag() {
        Some("footprint") | Some("module") => {}
        _ => {
            return Err(AssembleError::ParseError(
                "not a kicad_mod footprint".to_string(),
            ))
        }
    }

    let name = root
        .atom_at(0)
        .map(|n| n.rsplit(':').next().unwrap_or(n).to_string())
        .ok_or_else(|| AssembleError::ParseError("footprint has no name".to_string()))?;

    let attributes = root
        .find("attr")
        .map(|a| {
            a.children()
                .iter()
                .filter_map(|c| c.as_atom())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let mut pads = Vec::new();
    let mut graphics = Vec::new();
    let mut texts = Vec::new();

    for child in root.children() {
        let tag = match child.tag() {
            Some(t) => t,
            None => continue,
        };
        match tag {
            "pad" => pads.push(parse_pad(child)),
            "fp_line" | "fp_rect" | "fp_circle" | "fp_arc" | "fp_poly" => {
                if let Some(g) = parse_graphic(child, tag) {
                    graphics.push(g);
                }
            }
            "fp_text" | "property" => {
                if let Some(t) = parse_text(child, tag) {
                    texts.push(t);
                }
            }
            _ => {}
        }
    }

    Ok(FootprintDef {
        name,
        library: library.to_string(),
        description: root.value("descr").map(str::to_string),
        tags: root.value("tags").map(str::to_string),
        attributes,
        pads,
        graphics,
        texts,
    })
}

// ─── Helpers ─────────────────────────────────────────────────────────

fn get_layer_name(node: &SExpr) -> String {
    node.value("layer").unwrap_or("").to_string()
}

fn parse_xy(node: &SExpr, tag: &str) -> Option<[f64; 2]> {
    node.find(tag)
        .map(|n| [n.f64_at(0).unwrap_or(0.0), n.f64_at(1).unwrap_or(0.0)])
}

fn parse_width(node: &SExpr) -> f64 {
    node.value_f64("width")
        .or_else(|| {
            // KiCad 7+ uses (stroke (width N))
            node.find("stroke").and_then(|s| s.value_f64("width"))
        })
        .unwrap_or(0.0)
}

fn parse_fill(node: &SExpr, default: bool) -> bool {
    match node.find("fill") {
        // KiCad 7: (fill solid|none), KiCad 6: (fill (type solid))
        Some(fill) => match fill.atom_at(0).or_else(|| fill.value("type")) {
            Some("solid") | Some("yes") => true,
            Some(_) => false,
            None => default,
        },
        None => default,
    }
}

/// Rotate `p` about `c` by `deg` degrees in file coordinates.
fn rotate_about(p: [f64; 2], c: [f64; 2], deg: f64) -> [f64; 2] {
    let (s, co) = deg.to_radians().sin_cos();
    let dx = p[0] - c[0];
    let dy = p[1] - c[1];
    [c[0] + dx * co - dy * s, c[1] + dx * s + dy * co]
}

// ─── Graphics ────────────────────────────────────────────────────────

fn parse_graphic(node: &SExpr, tag: &str) -> Option<Graphic> {
    let drawing = match tag {
        "fp_line" => Drawing::Segment {
            start: parse_xy(node, "start")?,
            end: parse_xy(node, "end")?,
        },
        "fp_rect" => Drawing::Rect {
            start: parse_xy(node, "start")?,
            end: parse_xy(node, "end")?,
        },
        "fp_circle" => {
            let center = parse_xy(node, "center").or_else(|| parse_xy(node, "start"))?;
            let end = parse_xy(node, "end")?;
            let radius = ((end[0] - center[0]).powi(2) + (end[1] - center[1]).powi(2)).sqrt();
            Drawing::Circle { center, radius }
        }
        "fp_arc" => {
            if let Some(mid) = parse_xy(node, "mid") {
                // KiCad 6+ three-point arc
                Drawing::Arc {
                    start: parse_xy(node, "start")?,
                    mid,
                    end: parse_xy(node, "end")?,
                }
            } else {
                // Legacy: start = centre, end = arc start, angle = sweep
                let center = parse_xy(node, "start")?;
                let from = parse_xy(node, "end")?;
                let angle = node.value_f64("angle").unwrap_or(0.0);
                Drawing::Arc {
                    start: from,
                    mid: rotate_about(from, center, angle / 2.0),
                    end: rotate_about(from, center, angle),
                }
            }
        }
        "fp_poly" => {
            let points: Vec<[f64; 2]> = node
                .find("pts")?
                .find_all("xy")
                .iter()
                .map(|xy| [xy.f64_at(0).unwrap_or(0.0), xy.f64_at(1).unwrap_or(0.0)])
                .collect();
            if points.is_empty() {
                return None;
            }
            Drawing::Polygon {
                points,
                filled: parse_fill(node, true),
            }
        }
        _ => return None,
    };
    Some(Graphic {
        layer: Layer::from_kicad_name(&get_layer_name(node)),
        width: parse_width(node),
        drawing,
    })
}

// ─── Text ────────────────────────────────────────────────────────────

fn parse_text(node: &SExpr, tag: &str) -> Option<FootprintText> {
    let (kind, text) = if tag == "fp_text" {
        let kind = match node.atom_at(0)? {
            "reference" => TextKind::Reference,
            "value" => TextKind::Value,
            _ => TextKind::User,
        };
        (kind, node.atom_at(1).unwrap_or(""))
    } else {
        // KiCad 8+ property node; only the two placed fields matter here
        let kind = match node.atom_at(0)? {
            "Reference" => TextKind::Reference,
            "Value" => TextKind::Value,
            _ => return None,
        };
        (kind, node.atom_at(1).unwrap_or(""))
    };

    let at_node = node.find("at");
    let at = [
        at_node.and_then(|n| n.f64_at(0)).unwrap_or(0.0),
        at_node.and_then(|n| n.f64_at(1)).unwrap_or(0.0),
    ];
    let angle = at_node.and_then(|n| n.f64_at(2)).unwrap_or(0.0);

    let effects = node.find("effects");
    let font = effects.and_then(|e| e.find("font"));
    let size_node = font.and_then(|f| f.find("size"));
    let size = [
        size_node.and_then(|s| s.f64_at(0)).unwrap_or(1.0),
        size_node.and_then(|s| s.f64_at(1)).unwrap_or(1.0),
    ];
    let thickness = font.and_then(|f| f.value_f64("thickness")).unwrap_or(0.15);
    let hidden = node.has_symbol("hide")
        || node.value("hide") == Some("yes")
        || effects.map(|e| e.has_symbol("hide")).unwrap_or(false);

    Some(FootprintText {
        kind,
        text: text.to_string(),
        at,
        angle,
        layer: Layer::from_kicad_name(&get_layer_name(node)),
        size,
        thickness,
        hidden,
    })
}

// ─── Pads ────────────────────────────────────────────────────────────

fn parse_pad(node: &SExpr) -> PadDef {
    let number = node.atom_at(0).unwrap_or("").to_string();
    let kind = PadKind::from_kicad(node.atom_at(1).unwrap_or("smd"));

    let shape = match node.atom_at(2).unwrap_or("rect") {
        "circle" => PadShape::Circle,
        "oval" => PadShape::Oval,
        "roundrect" => PadShape::RoundRect {
            ratio: node.value_f64("roundrect_rratio").unwrap_or(0.25),
        },
        "trapezoid" => PadShape::Trapezoid,
        "custom" => PadShape::Custom,
        _ => PadShape::Rect,
    };

    let at_node = node.find("at");
    let at = [
        at_node.and_then(|n| n.f64_at(0)).unwrap_or(0.0),
        at_node.and_then(|n| n.f64_at(1)).unwrap_or(0.0),
    ];
    let angle = at_node.and_then(|n| n.f64_at(2)).unwrap_or(0.0);

    let size_node = node.find("size");
    let size = [
        size_node.and_then(|n| n.f64_at(0)).unwrap_or(0.0),
        size_node.and_then(|n| n.f64_at(1)).unwrap_or(0.0),
    ];

    let drill = node.find("drill").map(|d| {
        if d.atom_at(0) == Some("oval") {
            let w = d.f64_at(1).unwrap_or(0.0);
            Drill {
                oval: true,
                size: [w, d.f64_at(2).unwrap_or(w)],
            }
        } else {
            let dia = d.f64_at(0).unwrap_or(0.0);
            Drill {
                oval: false,
                size: [dia, dia],
            }
        }
    });

    let layers = node
        .find("layers")
        .map(|l| {
            l.children()
                .iter()
                .filter_map(|c| c.as_atom())
                .map(Layer::from_kicad_name)
                .collect()
        })
        .unwrap_or_else(|| vec![Layer::FCu]);

    PadDef {
        number,
        kind,
        shape,
        at,
        angle,
        size,
        drill,
        layers,
    }
}
