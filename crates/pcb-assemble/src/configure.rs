//! Board-wide rules and the board outline, applied before any parts go on.

use log::{info, warn};

use crate::board::{Board, Drawing, Graphic, Layer, EDGE_WIDTH};
use crate::error::AssembleError;
use crate::types::{BoardSpec, Scalar};

/// KiCad stackups top out at 32 copper layers.
pub const MAX_COPPER_LAYERS: u8 = 32;

pub struct BoardConfigurator;

impl BoardConfigurator {
    /// Copy track width, clearance and copper layer count onto the board.
    /// Fields that are absent keep the board defaults.
    pub fn apply(board: &mut Board, config: Option<&BoardSpec>) -> Result<(), AssembleError> {
        let Some(config) = config else {
            info!("No board settings given, using defaults");
            return Ok(());
        };

        if let Some(width) = &config.track_width {
            board.settings.track_width = positive_mm("track_width", width)?;
            info!("Default track width: {}mm", board.settings.track_width);
        }
        if let Some(clearance) = &config.clearance {
            board.settings.clearance = positive_mm("clearance", clearance)?;
            info!("Default clearance: {}mm", board.settings.clearance);
        }

        board.settings.copper_layers = copper_layer_count(config.layers.as_deref());
        info!("Copper layer count: {}", board.settings.copper_layers);
        Ok(())
    }
}

fn positive_mm(field: &str, value: &Scalar) -> Result<f64, AssembleError> {
    match value.as_f64() {
        Some(v) if v > 0.0 => Ok(v),
        _ => Err(AssembleError::Config(format!(
            "{field} must be a positive number of millimetres, got {value}"
        ))),
    }
}

/// Entries mentioning "Copper" count as copper layers; none means two.
/// Odd counts round up since copper comes in pairs.
pub fn copper_layer_count(layers: Option<&[String]>) -> u8 {
    let tagged = layers
        .unwrap_or(&[])
        .iter()
        .filter(|l| l.contains("Copper"))
        .count();
    if tagged == 0 {
        return 2;
    }
    let mut count = tagged.min(MAX_COPPER_LAYERS as usize) as u8;
    if tagged > MAX_COPPER_LAYERS as usize {
        warn!("{tagged} copper layers requested, capping at {MAX_COPPER_LAYERS}");
    }
    if count % 2 == 1 {
        warn!("Odd copper layer count {count}, rounding up to {}", count + 1);
        count += 1;
    }
    count
}

/// Draw the rectangular outline `(0,0)-(width,height)` on Edge.Cuts as four
/// segments.
pub fn draw_outline(board: &mut Board, config: Option<&BoardSpec>) -> Result<(), AssembleError> {
    let size = config
        .and_then(|c| c.size.as_ref())
        .ok_or_else(|| AssembleError::Outline("board.size is required".to_string()))?;

    let dimension = |field: &str, value: Option<&Scalar>| -> Result<f64, AssembleError> {
        match value.and_then(Scalar::as_f64) {
            Some(v) if v > 0.0 => Ok(v),
            _ => Err(AssembleError::Outline(format!(
                "board.size.{field} must be a positive number"
            ))),
        }
    };
    let w = dimension("width", size.width.as_ref())?;
    let h = dimension("height", size.height.as_ref())?;

    let corners = [[0.0, 0.0], [w, 0.0], [w, h], [0.0, h], [0.0, 0.0]];
    for pair in corners.windows(2) {
        board.add_graphic(Graphic {
            layer: Layer::EdgeCuts,
            width: EDGE_WIDTH,
            drawing: Drawing::Segment {
                start: pair[0],
                end: pair[1],
            },
        });
    }
    info!("Board outline {w}mm x {h}mm");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::DesignSettings;
    use crate::types::SizeSpec;

    fn spec(value: serde_json::Value) -> BoardSpec {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_track_width_without_clearance() {
        let mut board = Board::new();
        let config = spec(serde_json::json!({"track_width": 0.3}));
        BoardConfigurator::apply(&mut board, Some(&config)).unwrap();
        assert_eq!(board.settings.track_width, 0.3);
        assert_eq!(board.settings.clearance, 0.2);
        assert_eq!(board.settings.copper_layers, 2);
    }

    #[test]
    fn test_missing_config_keeps_defaults() {
        let mut board = Board::new();
        BoardConfigurator::apply(&mut board, None).unwrap();
        assert_eq!(board.settings, DesignSettings::default());
    }

    #[test]
    fn test_numeric_string_is_accepted() {
        let mut board = Board::new();
        let config = spec(serde_json::json!({"clearance": "0.15"}));
        BoardConfigurator::apply(&mut board, Some(&config)).unwrap();
        assert_eq!(board.settings.clearance, 0.15);
    }

    #[test]
    fn test_non_positive_width_is_fatal() {
        let mut board = Board::new();
        for bad in [serde_json::json!(0), serde_json::json!(-1.0), serde_json::json!("wide")] {
            let config = spec(serde_json::json!({ "track_width": bad }));
            let err = BoardConfigurator::apply(&mut board, Some(&config)).unwrap_err();
            assert!(matches!(err, AssembleError::Config(_)));
        }
    }

    #[test]
    fn test_copper_layer_count() {
        let count = |names: &[&str]| {
            let layers: Vec<String> = names.iter().map(|s| s.to_string()).collect();
            copper_layer_count(Some(layers.as_slice()))
        };
        assert_eq!(copper_layer_count(None), 2);
        assert_eq!(count(&[]), 2);
        assert_eq!(count(&["Silkscreen", "Mask"]), 2);
        assert_eq!(count(&["Top Copper", "Bottom Copper", "Silkscreen"]), 2);
        // three round up to four
        assert_eq!(count(&["Top Copper", "Inner Copper", "Bottom Copper"]), 4);
        assert_eq!(count(&["Copper"; 40]), 32);
    }

    #[test]
    fn test_outline_is_four_segments() {
        let mut board = Board::new();
        let config = spec(serde_json::json!({"size": {"width": 50, "height": 30}}));
        draw_outline(&mut board, Some(&config)).unwrap();
        let edges: Vec<_> = board.graphics_on(&Layer::EdgeCuts).collect();
        assert_eq!(edges.len(), 4);
        assert_eq!(
            edges[1].drawing,
            Drawing::Segment {
                start: [50.0, 0.0],
                end: [50.0, 30.0]
            }
        );
    }

    #[test]
    fn test_outline_requires_size() {
        let mut board = Board::new();
        assert!(matches!(
            draw_outline(&mut board, None),
            Err(AssembleError::Outline(_))
        ));
        let config = BoardSpec {
            size: Some(SizeSpec {
                width: Some(50.0.into()),
                height: None,
            }),
            ..Default::default()
        };
        assert!(matches!(
            draw_outline(&mut board, Some(&config)),
            Err(AssembleError::Outline(_))
        ));
        assert!(board.graphics.is_empty());
    }
}
