//! `.kicad_pcb` writer (KiCad 6 file format).

use log::info;
use std::path::Path;

use crate::board::{Board, Drawing, Graphic, Layer};
use crate::error::AssembleError;
use crate::footprint::{FootprintText, PadDef, PadShape, PlacedFootprint, TextKind};
use crate::parsers::kicad_sexpr::SExpr;

/// File format version understood by KiCad 6 and later.
pub const FORMAT_VERSION: f64 = 20211014.0;

const GENERATOR: &str = "pcb-assemble";

/// Non-copper layers in KiCad's fixed numbering: (id, name, alias).
const USER_LAYERS: [(u32, &str, Option<&str>); 18] = [
    (32, "B.Adhes", Some("B.Adhesive")),
    (33, "F.Adhes", Some("F.Adhesive")),
    (34, "B.Paste", None),
    (35, "F.Paste", None),
    (36, "B.SilkS", Some("B.Silkscreen")),
    (37, "F.SilkS", Some("F.Silkscreen")),
    (38, "B.Mask", None),
    (39, "F.Mask", None),
    (40, "Dwgs.User", Some("User.Drawings")),
    (41, "Cmts.User", Some("User.Comments")),
    (42, "Eco1.User", Some("User.Eco1")),
    (43, "Eco2.User", Some("User.Eco2")),
    (44, "Edge.Cuts", None),
    (45, "Margin", None),
    (46, "B.CrtYd", Some("B.Courtyard")),
    (47, "F.CrtYd", Some("F.Courtyard")),
    (48, "B.Fab", None),
    (49, "F.Fab", None),
];

fn xy(tag: &str, p: [f64; 2]) -> SExpr {
    SExpr::nums(tag, &p)
}

/// `(at x y)` or `(at x y angle)`; KiCad leaves out a zero angle.
fn at(p: [f64; 2], angle: f64) -> SExpr {
    let angle = normalize_angle(angle);
    if angle == 0.0 {
        xy("at", p)
    } else {
        SExpr::nums("at", &[p[0], p[1], angle])
    }
}

fn normalize_angle(angle: f64) -> f64 {
    let a = angle.rem_euclid(360.0);
    if (a - 360.0).abs() < 1e-9 {
        0.0
    } else {
        a
    }
}

fn layer(l: &Layer) -> SExpr {
    SExpr::tagged_str("layer", &l.kicad_name())
}

fn layer_table(copper_layers: u8) -> SExpr {
    let signal = |id: u32, name: String| {
        SExpr::List(vec![
            SExpr::num(id as f64),
            SExpr::string(name),
            SExpr::sym("signal"),
        ])
    };

    let mut layers = SExpr::list("layers");
    layers.push(signal(0, "F.Cu".into()));
    for n in 1..copper_layers.saturating_sub(1) {
        layers.push(signal(n as u32, format!("In{n}.Cu")));
    }
    layers.push(signal(31, "B.Cu".into()));
    for (id, name, alias) in USER_LAYERS {
        let mut node = SExpr::List(vec![
            SExpr::num(id as f64),
            SExpr::string(name),
            SExpr::sym("user"),
        ]);
        if let Some(alias) = alias {
            node.push(SExpr::string(alias));
        }
        layers.push(node);
    }
    layers
}

/// A drawing as `gr_*` (board) or `fp_*` (footprint) node.
fn graphic(prefix: &str, g: &Graphic) -> SExpr {
    let node = match &g.drawing {
        Drawing::Segment { start, end } => SExpr::list(&format!("{prefix}_line"))
            .with(xy("start", *start))
            .with(xy("end", *end)),
        Drawing::Rect { start, end } => SExpr::list(&format!("{prefix}_rect"))
            .with(xy("start", *start))
            .with(xy("end", *end)),
        Drawing::Circle { center, radius } => SExpr::list(&format!("{prefix}_circle"))
            .with(xy("center", *center))
            .with(xy("end", [center[0] + radius, center[1]])),
        Drawing::Arc { start, mid, end } => SExpr::list(&format!("{prefix}_arc"))
            .with(xy("start", *start))
            .with(xy("mid", *mid))
            .with(xy("end", *end)),
        Drawing::Polygon { points, .. } => {
            let pts = points
                .iter()
                .fold(SExpr::list("pts"), |pts, p| pts.with(xy("xy", *p)));
            SExpr::list(&format!("{prefix}_poly")).with(pts)
        }
    };
    let node = node
        .with(layer(&g.layer))
        .with(SExpr::nums("width", &[g.width]));
    match &g.drawing {
        Drawing::Rect { .. } | Drawing::Circle { .. } => {
            node.with(SExpr::tagged_sym("fill", "none"))
        }
        Drawing::Polygon { filled, .. } => {
            node.with(SExpr::tagged_sym("fill", if *filled { "solid" } else { "none" }))
        }
        _ => node,
    }
}

fn text(kind: TextKind, content: &str, t: &FootprintText, rotation: f64) -> SExpr {
    let kind = match kind {
        TextKind::Reference => "reference",
        TextKind::Value => "value",
        TextKind::User => "user",
    };
    let mut node = SExpr::list("fp_text")
        .with(SExpr::sym(kind))
        .with(SExpr::string(content))
        .with(at(t.at, t.angle + rotation))
        .with(layer(&t.layer));
    if t.hidden {
        node.push(SExpr::sym("hide"));
    }
    node.with(
        SExpr::list("effects").with(
            SExpr::list("font")
                .with(SExpr::nums("size", &t.size))
                .with(SExpr::nums("thickness", &[t.thickness])),
        ),
    )
}

fn default_text(kind: TextKind, y: f64, l: Layer) -> FootprintText {
    FootprintText {
        kind,
        text: String::new(),
        at: [0.0, y],
        angle: 0.0,
        layer: l,
        size: [1.0, 1.0],
        thickness: 0.15,
        hidden: false,
    }
}

fn pad(p: &PadDef, rotation: f64) -> SExpr {
    let mut node = SExpr::list("pad")
        .with(SExpr::string(p.number.clone()))
        .with(SExpr::sym(p.kind.kicad_name()))
        .with(SExpr::sym(p.shape.kicad_name()))
        .with(at(p.at, p.angle + rotation))
        .with(SExpr::nums("size", &p.size));
    if let Some(drill) = &p.drill {
        node.push(if drill.oval {
            SExpr::list("drill")
                .with(SExpr::sym("oval"))
                .with(SExpr::num(drill.size[0]))
                .with(SExpr::num(drill.size[1]))
        } else {
            SExpr::nums("drill", &[drill.size[0]])
        });
    }
    let layers = p.layers.iter().fold(SExpr::list("layers"), |node, l| {
        node.with(SExpr::string(l.kicad_name()))
    });
    node.push(layers);
    if let PadShape::RoundRect { ratio } = p.shape {
        node.push(SExpr::nums("roundrect_rratio", &[ratio]));
    }
    node
}

fn footprint(fp: &PlacedFootprint) -> SExpr {
    let def = &fp.def;
    let mut node = SExpr::list("footprint")
        .with(SExpr::string(def.lib_id()))
        .with(SExpr::tagged_str("layer", "F.Cu"))
        .with(at(fp.position, fp.rotation));
    if let Some(descr) = &def.description {
        node.push(SExpr::tagged_str("descr", descr));
    }
    if let Some(tags) = &def.tags {
        node.push(SExpr::tagged_str("tags", tags));
    }
    if !def.attributes.is_empty() {
        node.push(
            def.attributes
                .iter()
                .fold(SExpr::list("attr"), |attr, a| attr.with(SExpr::sym(a.as_str()))),
        );
    }

    let find = |kind: TextKind| def.texts.iter().find(|t| t.kind == kind);
    let reference = find(TextKind::Reference)
        .cloned()
        .unwrap_or_else(|| default_text(TextKind::Reference, -1.5, Layer::FSilkS));
    let value = find(TextKind::Value)
        .cloned()
        .unwrap_or_else(|| default_text(TextKind::Value, 1.5, Layer::FFab));
    node.push(text(TextKind::Reference, &fp.reference, &reference, fp.rotation));
    node.push(text(TextKind::Value, &fp.value, &value, fp.rotation));
    for t in def.texts.iter().filter(|t| t.kind == TextKind::User) {
        node.push(text(TextKind::User, &t.text, t, fp.rotation));
    }

    for g in &def.graphics {
        node.push(graphic("fp", g));
    }
    for p in &def.pads {
        node.push(pad(p, fp.rotation));
    }
    node
}

/// Build the complete board tree.
pub fn board_to_sexpr(board: &Board) -> SExpr {
    let settings = &board.settings;
    let mut root = SExpr::list("kicad_pcb")
        .with(SExpr::nums("version", &[FORMAT_VERSION]))
        .with(SExpr::tagged_sym("generator", GENERATOR))
        .with(SExpr::list("general").with(SExpr::nums("thickness", &[1.6])))
        .with(SExpr::tagged_str("paper", "A4"))
        .with(layer_table(settings.copper_layers))
        .with(SExpr::list("setup").with(SExpr::nums("pad_to_mask_clearance", &[0.0])))
        .with(
            SExpr::list("net")
                .with(SExpr::num(0.0))
                .with(SExpr::string("")),
        )
        .with(
            SExpr::list("net_class")
                .with(SExpr::string("Default"))
                .with(SExpr::string("This is the default net class."))
                .with(SExpr::nums("clearance", &[settings.clearance]))
                .with(SExpr::nums("trace_width", &[settings.track_width]))
                .with(SExpr::nums("via_dia", &[0.8]))
                .with(SExpr::nums("via_drill", &[0.4]))
                .with(SExpr::nums("uvia_dia", &[0.3]))
                .with(SExpr::nums("uvia_drill", &[0.1])),
        );

    for fp in &board.footprints {
        root.push(footprint(fp));
    }
    for g in &board.graphics {
        root.push(graphic("gr", g));
    }
    for t in &board.tracks {
        root.push(
            SExpr::list("segment")
                .with(xy("start", t.start))
                .with(xy("end", t.end))
                .with(SExpr::nums("width", &[t.width]))
                .with(layer(&t.layer))
                .with(SExpr::nums("net", &[0.0])),
        );
    }
    root
}

pub fn render(board: &Board) -> String {
    board_to_sexpr(board).to_pretty()
}

/// Persist the board, creating the parent directory if needed.
pub fn write_board(board: &Board, path: &Path) -> Result<(), AssembleError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render(board))?;
    info!("PCB saved to {}", path.display());
    Ok(())
}
