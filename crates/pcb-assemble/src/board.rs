//! In-memory board: the geometry sink the assembly stages write into and
//! the exporters read from.

use serde::{Serialize, Serializer};

use crate::footprint::PlacedFootprint;
use crate::types::serialize_point;

/// Stroke width used for outline segments and drill cutouts.
pub const EDGE_WIDTH: f64 = 0.1;

// ─── Layers ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Layer {
    FCu,
    BCu,
    /// Inner copper, `In1.Cu` .. `In30.Cu`.
    InnerCu(u8),
    FSilkS,
    BSilkS,
    FMask,
    BMask,
    FPaste,
    BPaste,
    FFab,
    BFab,
    FCrtYd,
    BCrtYd,
    EdgeCuts,
    /// `*.Cu` on through-hole pads.
    AllCu,
    /// `*.Mask` on through-hole pads.
    AllMask,
    Other(String),
}

impl Layer {
    /// Parse a KiCad layer name, accepting both the KiCad 6 canonical names
    /// and the KiCad 7+ long names.
    pub fn from_kicad_name(name: &str) -> Layer {
        match name {
            "F.Cu" => Layer::FCu,
            "B.Cu" => Layer::BCu,
            "F.SilkS" | "F.Silkscreen" => Layer::FSilkS,
            "B.SilkS" | "B.Silkscreen" => Layer::BSilkS,
            "F.Mask" => Layer::FMask,
            "B.Mask" => Layer::BMask,
            "F.Paste" => Layer::FPaste,
            "B.Paste" => Layer::BPaste,
            "F.Fab" | "F.Fabrication" => Layer::FFab,
            "B.Fab" | "B.Fabrication" => Layer::BFab,
            "F.CrtYd" | "F.Courtyard" => Layer::FCrtYd,
            "B.CrtYd" | "B.Courtyard" => Layer::BCrtYd,
            "Edge.Cuts" => Layer::EdgeCuts,
            "*.Cu" => Layer::AllCu,
            "*.Mask" => Layer::AllMask,
            n => inner_copper_index(n)
                .map(Layer::InnerCu)
                .unwrap_or_else(|| Layer::Other(n.to_string())),
        }
    }

    pub fn kicad_name(&self) -> String {
        match self {
            Layer::FCu => "F.Cu".into(),
            Layer::BCu => "B.Cu".into(),
            Layer::InnerCu(n) => format!("In{n}.Cu"),
            Layer::FSilkS => "F.SilkS".into(),
            Layer::BSilkS => "B.SilkS".into(),
            Layer::FMask => "F.Mask".into(),
            Layer::BMask => "B.Mask".into(),
            Layer::FPaste => "F.Paste".into(),
            Layer::BPaste => "B.Paste".into(),
            Layer::FFab => "F.Fab".into(),
            Layer::BFab => "B.Fab".into(),
            Layer::FCrtYd => "F.CrtYd".into(),
            Layer::BCrtYd => "B.CrtYd".into(),
            Layer::EdgeCuts => "Edge.Cuts".into(),
            Layer::AllCu => "*.Cu".into(),
            Layer::AllMask => "*.Mask".into(),
            Layer::Other(n) => n.clone(),
        }
    }

    pub fn is_copper(&self) -> bool {
        matches!(
            self,
            Layer::FCu | Layer::BCu | Layer::InnerCu(_) | Layer::AllCu
        )
    }

    /// True if an item on `self` shows up on the concrete layer `target`.
    pub fn covers(&self, target: &Layer) -> bool {
        match self {
            Layer::AllCu => target.is_copper(),
            Layer::AllMask => matches!(target, Layer::FMask | Layer::BMask),
            l => l == target,
        }
    }
}

fn inner_copper_index(name: &str) -> Option<u8> {
    name.strip_prefix("In")?.strip_suffix(".Cu")?.parse().ok()
}

impl Serialize for Layer {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.kicad_name())
    }
}

// ─── Design settings ─────────────────────────────────────────────────

/// Board-wide design rules. Defaults match a fresh KiCad board.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DesignSettings {
    pub track_width: f64,
    pub clearance: f64,
    pub copper_layers: u8,
}

impl Default for DesignSettings {
    fn default() -> Self {
        Self {
            track_width: 0.25,
            clearance: 0.2,
            copper_layers: 2,
        }
    }
}

// ─── Primitives ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Drawing {
    Segment {
        #[serde(serialize_with = "serialize_point")]
        start: [f64; 2],
        #[serde(serialize_with = "serialize_point")]
        end: [f64; 2],
    },
    Rect {
        #[serde(serialize_with = "serialize_point")]
        start: [f64; 2],
        #[serde(serialize_with = "serialize_point")]
        end: [f64; 2],
    },
    Circle {
        #[serde(serialize_with = "serialize_point")]
        center: [f64; 2],
        radius: f64,
    },
    /// Three-point arc, KiCad 6 style.
    Arc {
        #[serde(serialize_with = "serialize_point")]
        start: [f64; 2],
        #[serde(serialize_with = "serialize_point")]
        mid: [f64; 2],
        #[serde(serialize_with = "serialize_point")]
        end: [f64; 2],
    },
    Polygon {
        points: Vec<[f64; 2]>,
        filled: bool,
    },
}

impl Drawing {
    /// Apply a placement transform to every coordinate.
    pub fn transformed(&self, f: impl Fn([f64; 2]) -> [f64; 2]) -> Drawing {
        match self {
            Drawing::Segment { start, end } => Drawing::Segment {
                start: f(*start),
                end: f(*end),
            },
            Drawing::Rect { start, end } => Drawing::Rect {
                start: f(*start),
                end: f(*end),
            },
            Drawing::Circle { center, radius } => Drawing::Circle {
                center: f(*center),
                radius: *radius,
            },
            Drawing::Arc { start, mid, end } => Drawing::Arc {
                start: f(*start),
                mid: f(*mid),
                end: f(*end),
            },
            Drawing::Polygon { points, filled } => Drawing::Polygon {
                points: points.iter().map(|p| f(*p)).collect(),
                filled: *filled,
            },
        }
    }
}

/// A drawing on a layer with a stroke width.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Graphic {
    pub layer: Layer,
    pub width: f64,
    #[serde(flatten)]
    pub drawing: Drawing,
}

/// A straight copper track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    #[serde(serialize_with = "serialize_point")]
    pub start: [f64; 2],
    #[serde(serialize_with = "serialize_point")]
    pub end: [f64; 2],
    pub width: f64,
    pub layer: Layer,
}

// ─── Board ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Board {
    pub settings: DesignSettings,
    pub graphics: Vec<Graphic>,
    pub tracks: Vec<Track>,
    pub footprints: Vec<PlacedFootprint>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_graphic(&mut self, graphic: Graphic) {
        self.graphics.push(graphic);
    }

    pub fn add_track(&mut self, track: Track) {
        self.tracks.push(track);
    }

    /// Take ownership of a placed footprint, returning its index.
    pub fn add_footprint(&mut self, footprint: PlacedFootprint) -> usize {
        self.footprints.push(footprint);
        self.footprints.len() - 1
    }

    /// Board graphics on one layer.
    pub fn graphics_on<'a>(&'a self, layer: &'a Layer) -> impl Iterator<Item = &'a Graphic> + 'a {
        self.graphics.iter().filter(move |g| &g.layer == layer)
    }

    /// Copper layers present in the stackup, outermost first.
    pub fn copper_stack(&self) -> Vec<Layer> {
        let inner = self.settings.copper_layers.saturating_sub(2);
        std::iter::once(Layer::FCu)
            .chain((1..=inner).map(Layer::InnerCu))
            .chain(std::iter::once(Layer::BCu))
            .collect()
    }
}
