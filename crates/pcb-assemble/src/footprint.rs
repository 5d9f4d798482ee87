use serde::Serialize;

use crate::board::{Graphic, Layer};
use crate::library::ResolutionMethod;
use crate::types::{rotate_and_translate, serialize_f64_rounded, serialize_point};

// ─── Footprint definitions (as loaded from a library) ────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PadKind {
    Smd,
    ThruHole,
    NpThruHole,
    Connect,
}

impl PadKind {
    pub fn from_kicad(s: &str) -> Self {
        match s {
            "thru_hole" => PadKind::ThruHole,
            "np_thru_hole" => PadKind::NpThruHole,
            "connect" => PadKind::Connect,
            _ => PadKind::Smd,
        }
    }

    pub fn kicad_name(&self) -> &'static str {
        match self {
            PadKind::Smd => "smd",
            PadKind::ThruHole => "thru_hole",
            PadKind::NpThruHole => "np_thru_hole",
            PadKind::Connect => "connect",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PadShape {
    Rect,
    Circle,
    Oval,
    RoundRect { ratio: f64 },
    Trapezoid,
    Custom,
}

impl PadShape {
    pub fn kicad_name(&self) -> &'static str {
        match self {
            PadShape::Rect => "rect",
            PadShape::Circle => "circle",
            PadShape::Oval => "oval",
            PadShape::RoundRect { .. } => "roundrect",
            PadShape::Trapezoid => "trapezoid",
            PadShape::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Drill {
    pub oval: bool,
    #[serde(serialize_with = "serialize_point")]
    pub size: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PadDef {
    /// Pad number or name; empty for mechanical pads.
    pub number: String,
    pub kind: PadKind,
    pub shape: PadShape,
    /// Position relative to the footprint origin.
    #[serde(serialize_with = "serialize_point")]
    pub at: [f64; 2],
    /// Absolute pad angle in the library (before placement rotation).
    pub angle: f64,
    #[serde(serialize_with = "serialize_point")]
    pub size: [f64; 2],
    pub drill: Option<Drill>,
    pub layers: Vec<Layer>,
}

impl PadDef {
    pub fn on_layer(&self, target: &Layer) -> bool {
        self.layers.iter().any(|l| l.covers(target))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextKind {
    Reference,
    Value,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FootprintText {
    pub kind: TextKind,
    pub text: String,
    #[serde(serialize_with = "serialize_point")]
    pub at: [f64; 2],
    pub angle: f64,
    pub layer: Layer,
    #[serde(serialize_with = "serialize_point")]
    pub size: [f64; 2],
    pub thickness: f64,
    pub hidden: bool,
}

/// A footprint as defined in a `.kicad_mod` file, in local coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FootprintDef {
    pub name: String,
    /// Library nickname, the `.pretty` directory stem.
    pub library: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    pub attributes: Vec<String>,
    pub pads: Vec<PadDef>,
    pub graphics: Vec<Graphic>,
    pub texts: Vec<FootprintText>,
}

impl FootprintDef {
    /// `Library:Name` identifier written into the board file.
    pub fn lib_id(&self) -> String {
        format!("{}:{}", self.library, self.name)
    }

    /// Pad numbers in definition order, unnamed pads left out.
    pub fn pad_numbers(&self) -> Vec<String> {
        let mut numbers: Vec<String> = Vec::new();
        for pad in &self.pads {
            if !pad.number.is_empty() && !numbers.contains(&pad.number) {
                numbers.push(pad.number.clone());
            }
        }
        numbers
    }
}

// ─── Placed footprints ───────────────────────────────────────────────

/// A component bound to a resolved footprint and placed on the board.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedFootprint {
    pub reference: String,
    pub value: String,
    /// Footprint name the description asked for.
    pub requested: String,
    pub resolution: ResolutionMethod,
    #[serde(serialize_with = "serialize_point")]
    pub position: [f64; 2],
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub rotation: f64,
    pub def: FootprintDef,
}

impl PlacedFootprint {
    pub fn new(
        def: FootprintDef,
        reference: &str,
        value: &str,
        position: [f64; 2],
        rotation: f64,
    ) -> Self {
        Self {
            reference: reference.to_string(),
            value: value.to_string(),
            requested: def.name.clone(),
            resolution: ResolutionMethod::Exact,
            position,
            rotation,
            def,
        }
    }

    /// Map a footprint-local point to board coordinates.
    pub fn to_board(&self, local: [f64; 2]) -> [f64; 2] {
        let (x, y) = rotate_and_translate(
            local[0],
            local[1],
            self.position[0],
            self.position[1],
            self.rotation,
        );
        [x, y]
    }

    /// Board position of a pad centre.
    pub fn pad_position(&self, pad: &PadDef) -> [f64; 2] {
        self.to_board(pad.at)
    }

    /// Pad angle on the board in degrees.
    pub fn pad_angle(&self, pad: &PadDef) -> f64 {
        pad.angle + self.rotation
    }

    /// Footprint graphics in board coordinates.
    pub fn board_graphics(&self) -> impl Iterator<Item = Graphic> + '_ {
        self.def.graphics.iter().map(move |g| Graphic {
            layer: g.layer.clone(),
            width: g.width,
            drawing: g.drawing.transformed(|p| self.to_board(p)),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::board::Drawing;
    use approx::assert_abs_diff_eq;

    /// A two-pad 0805 resistor, enough for placement and routing tests.
    pub(crate) fn resistor_def() -> FootprintDef {
        let pad = |number: &str, x: f64| PadDef {
            number: number.to_string(),
            kind: PadKind::Smd,
            shape: PadShape::RoundRect { ratio: 0.25 },
            at: [x, 0.0],
            angle: 0.0,
            size: [1.025, 1.4],
            drill: None,
            layers: vec![Layer::FCu, Layer::FPaste, Layer::FMask],
        };
        FootprintDef {
            name: "R_0805_2012Metric".into(),
            library: "Resistor_SMD".into(),
            description: None,
            tags: None,
            attributes: vec!["smd".into()],
            pads: vec![pad("1", -0.9125), pad("2", 0.9125)],
            graphics: vec![Graphic {
                layer: Layer::FSilkS,
                width: 0.12,
                drawing: Drawing::Segment {
                    start: [-0.227, -0.735],
                    end: [0.227, -0.735],
                },
            }],
            texts: vec![],
        }
    }

    #[test]
    fn test_lib_id_and_pad_numbers() {
        let def = resistor_def();
        assert_eq!(def.lib_id(), "Resistor_SMD:R_0805_2012Metric");
        assert_eq!(def.pad_numbers(), vec!["1", "2"]);
    }

    #[test]
    fn test_pad_position_unrotated() {
        let placed = PlacedFootprint::new(resistor_def(), "R1", "10k", [10.0, 10.0], 0.0);
        let pad = &placed.def.pads[1];
        let pos = placed.pad_position(pad);
        assert_abs_diff_eq!(pos[0], 10.9125);
        assert_abs_diff_eq!(pos[1], 10.0);
    }

    #[test]
    fn test_pad_position_rotated_90() {
        let placed = PlacedFootprint::new(resistor_def(), "R1", "10k", [10.0, 10.0], 90.0);
        let pad = &placed.def.pads[1];
        let pos = placed.pad_position(pad);
        assert_abs_diff_eq!(pos[0], 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(pos[1], 10.0 - 0.9125, epsilon = 1e-9);
        assert_abs_diff_eq!(placed.pad_angle(pad), 90.0);
    }

    #[test]
    fn test_board_graphics_are_translated() {
        let placed = PlacedFootprint::new(resistor_def(), "R1", "10k", [5.0, 5.0], 0.0);
        let g: Vec<Graphic> = placed.board_graphics().collect();
        assert_eq!(g.len(), 1);
        match &g[0].drawing {
            Drawing::Segment { start, .. } => {
                assert_abs_diff_eq!(start[0], 4.773, epsilon = 1e-9);
                assert_abs_diff_eq!(start[1], 4.265, epsilon = 1e-9);
            }
            other => panic!("unexpected drawing {other:?}"),
        }
    }

    #[test]
    fn test_wildcard_pad_layers() {
        let mut def = resistor_def();
        def.pads[0].layers = vec![Layer::AllCu, Layer::AllMask];
        assert!(def.pads[0].on_layer(&Layer::BCu));
        assert!(def.pads[0].on_layer(&Layer::FMask));
        assert!(!def.pads[1].on_layer(&Layer::BCu));
    }
}
