use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::f64::consts::PI;
use std::fmt;
use std::path::PathBuf;

use crate::error::AssembleError;

/// Round a float to N decimal places.
pub fn round_f64(v: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (v * factor).round() / factor
}

/// Format a millimetre value the way KiCad writes it: at most 6 decimals,
/// no trailing zeros, never `-0`.
pub fn fmt_mm(v: f64) -> String {
    let rounded = round_f64(v, 6);
    if rounded == 0.0 {
        return "0".to_string();
    }
    let mut s = format!("{rounded:.6}");
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}

/// Wrapper that rounds f64 to 6 decimal places on serialization.
pub(crate) fn serialize_f64_rounded<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(round_f64(*v, 6))
}

pub(crate) fn serialize_point<S: Serializer>(p: &[f64; 2], s: S) -> Result<S::Ok, S::Error> {
    let rounded = [round_f64(p[0], 6), round_f64(p[1], 6)];
    rounded.serialize(s)
}

// ─── Geometry helpers ────────────────────────────────────────────────

/// Rotate point (lx, ly) by angle degrees and translate to (tx, ty).
///
/// KiCad coordinates are y-down and a positive orientation turns the part
/// counter-clockwise on screen, hence the negated angle.
pub fn rotate_and_translate(lx: f64, ly: f64, tx: f64, ty: f64, angle_deg: f64) -> (f64, f64) {
    if angle_deg == 0.0 {
        return (lx + tx, ly + ty);
    }
    let angle_rad = -angle_deg * PI / 180.0;
    let cos_a = angle_rad.cos();
    let sin_a = angle_rad.sin();
    let rx = lx * cos_a - ly * sin_a;
    let ry = lx * sin_a + ly * cos_a;
    (rx + tx, ry + ty)
}

/// Compute the circumcenter and radius of three points.
pub fn arc_center(p1: [f64; 2], p2: [f64; 2], p3: [f64; 2]) -> Option<([f64; 2], f64)> {
    let [ax, ay] = p1;
    let [bx, by] = p2;
    let [cx, cy] = p3;

    let d = 2.0 * (ax * (by - cy) + bx * (cy - ay) + cx * (ay - by));
    if d.abs() < 1e-10 {
        return None;
    }

    let ux = ((ax * ax + ay * ay) * (by - cy)
        + (bx * bx + by * by) * (cy - ay)
        + (cx * cx + cy * cy) * (ay - by))
        / d;
    let uy = ((ax * ax + ay * ay) * (cx - bx)
        + (bx * bx + by * by) * (ax - cx)
        + (cx * cx + cy * cy) * (bx - ax))
        / d;

    let radius = ((ax - ux).powi(2) + (ay - uy).powi(2)).sqrt();
    Some(([ux, uy], radius))
}

// ─── Circuit description (input) ─────────────────────────────────────

/// A numeric field as it arrives from a generated document: either a JSON
/// number or a string holding one. Anything else is kept as `Other` so the
/// item carrying it can be skipped on its own.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
    Other(Value),
}

impl Scalar {
    /// The finite numeric value, if there is one.
    pub fn as_f64(&self) -> Option<f64> {
        let v = match self {
            Scalar::Number(v) => *v,
            Scalar::Text(s) => s.trim().parse().ok()?,
            Scalar::Other(_) => return None,
        };
        v.is_finite().then_some(v)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(v) => write!(f, "{v}"),
            Scalar::Text(s) => f.write_str(s),
            Scalar::Other(v) => write!(f, "{v}"),
        }
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Number(v)
    }
}

/// Text field that also takes a bare number (`"name": 5`). Other JSON
/// types read as absent.
fn lenient_text<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Nested object that reads as absent when it has the wrong shape.
fn lenient_object<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(serde_json::from_value(Value::deserialize(de)?).ok())
}

/// Item list where an entry that is not an object becomes an empty item,
/// which the owning stage then skips.
fn lenient_items<'de, D, T>(de: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let items = Vec::<Value>::deserialize(de)?;
    Ok(items
        .into_iter()
        .map(|item| serde_json::from_value(item).unwrap_or_default())
        .collect())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CircuitDescription {
    #[serde(default)]
    pub board: Option<BoardSpec>,
    #[serde(default, deserialize_with = "lenient_items")]
    pub components: Vec<ComponentSpec>,
    #[serde(default, deserialize_with = "lenient_items")]
    pub connections: Vec<ConnectionSpec>,
    #[serde(default, deserialize_with = "lenient_items")]
    pub drills: Vec<DrillSpec>,
    #[serde(default)]
    pub libraries: Option<LibrariesSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoardSpec {
    #[serde(default)]
    pub size: Option<SizeSpec>,
    #[serde(default)]
    pub track_width: Option<Scalar>,
    #[serde(default)]
    pub clearance: Option<Scalar>,
    #[serde(default)]
    pub layers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SizeSpec {
    #[serde(default)]
    pub width: Option<Scalar>,
    #[serde(default)]
    pub height: Option<Scalar>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PositionSpec {
    #[serde(default)]
    pub x: Option<Scalar>,
    #[serde(default)]
    pub y: Option<Scalar>,
}

impl PositionSpec {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: Some(x.into()),
            y: Some(y.into()),
        }
    }

    pub fn point(&self) -> Option<[f64; 2]> {
        let x = self.x.as_ref()?.as_f64()?;
        let y = self.y.as_ref()?.as_f64()?;
        Some([x, y])
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComponentSpec {
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub footprint: Option<String>,
    #[serde(default)]
    pub value: Option<Scalar>,
    #[serde(default, rename = "type", deserialize_with = "lenient_text")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_object")]
    pub position: Option<PositionSpec>,
    #[serde(default)]
    pub rotation: Option<Scalar>,
}

impl ComponentSpec {
    /// Value text for the placed part: explicit value, else the type label,
    /// else the component name.
    pub fn value_text(&self) -> String {
        self.value
            .as_ref()
            .filter(|v| !matches!(v, Scalar::Other(_)))
            .map(|v| v.to_string())
            .or_else(|| self.kind.clone())
            .or_else(|| self.name.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionSpec {
    #[serde(default, deserialize_with = "lenient_text")]
    pub from: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub to: Option<String>,
}

impl ConnectionSpec {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: Some(from.to_string()),
            to: Some(to.to_string()),
        }
    }

    /// `from -> to` for log lines and skip records.
    pub fn label(&self) -> String {
        format!(
            "{} -> {}",
            self.from.as_deref().unwrap_or("?"),
            self.to.as_deref().unwrap_or("?")
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DrillSpec {
    #[serde(default, deserialize_with = "lenient_object")]
    pub position: Option<PositionSpec>,
    #[serde(default)]
    pub diameter: Option<Scalar>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibrariesSpec {
    #[serde(default)]
    pub footprint_paths: Vec<PathBuf>,
}

/// Key under which the synthesizer wraps model output it could not parse.
pub const RAW_RESPONSE_KEY: &str = "raw_response";

impl CircuitDescription {
    /// Parse a description document from JSON bytes.
    pub fn from_json_slice(data: &[u8]) -> Result<Self, AssembleError> {
        let value: serde_json::Value = serde_json::from_slice(data)?;
        Self::from_value(value)
    }

    /// Convert an already-parsed JSON document, rejecting the synthesizer's
    /// raw-text fallback wrapper.
    pub fn from_value(value: serde_json::Value) -> Result<Self, AssembleError> {
        let obj = value.as_object().ok_or_else(|| {
            AssembleError::InvalidDescription("top level must be a JSON object".to_string())
        })?;
        if obj.contains_key(RAW_RESPONSE_KEY) && !obj.contains_key("components") {
            return Err(AssembleError::UnparsedDescription);
        }
        serde_json::from_value(value).map_err(|e| AssembleError::InvalidDescription(e.to_string()))
    }

    pub fn footprint_paths(&self) -> &[PathBuf] {
        self.libraries
            .as_ref()
            .map(|l| l.footprint_paths.as_slice())
            .unwrap_or(&[])
    }
}
