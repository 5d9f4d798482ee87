use log::{info, warn};

use crate::board::{Board, Drawing, Graphic, Layer, EDGE_WIDTH};
use crate::error::{ItemKind, SkipReason, SkippedItem};
use crate::types::DrillSpec;

/// Non-plated mounting holes, cut as circles on Edge.Cuts.
pub struct DrillPlacer;

impl DrillPlacer {
    /// Returns the number of holes added and the skipped drills, identified
    /// by their index in the input.
    pub fn place(board: &mut Board, drills: &[DrillSpec]) -> (usize, Vec<SkippedItem>) {
        let mut placed = 0;
        let mut skipped = Vec::new();

        for (i, drill) in drills.iter().enumerate() {
            match cutout(drill) {
                Ok(graphic) => {
                    if let Drawing::Circle { center, radius } = &graphic.drawing {
                        info!(
                            "Drill at ({}, {}) diameter {}mm",
                            center[0],
                            center[1],
                            radius * 2.0
                        );
                    }
                    board.add_graphic(graphic);
                    placed += 1;
                }
                Err(reason) => {
                    warn!("Skipping drill {i}: {reason}");
                    skipped.push(SkippedItem::new(ItemKind::Drill, i.to_string(), reason));
                }
            }
        }
        (placed, skipped)
    }
}

fn cutout(drill: &DrillSpec) -> Result<Graphic, SkipReason> {
    let invalid = |message: &str| SkipReason::InvalidDrill {
        message: message.to_string(),
    };

    let center = drill
        .position
        .as_ref()
        .ok_or_else(|| invalid("missing position"))?
        .point()
        .ok_or_else(|| invalid("position needs numeric x and y"))?;
    let diameter = drill
        .diameter
        .as_ref()
        .ok_or_else(|| invalid("missing diameter"))?
        .as_f64()
        .ok_or_else(|| invalid("diameter is not a number"))?;
    if diameter <= 0.0 {
        return Err(invalid("diameter must be positive"));
    }

    Ok(Graphic {
        layer: Layer::EdgeCuts,
        width: EDGE_WIDTH,
        drawing: Drawing::Circle {
            center,
            radius: diameter / 2.0,
        },
    })
}
