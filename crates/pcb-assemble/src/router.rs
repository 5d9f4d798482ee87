use log::{info, warn};

use crate::board::{Board, Layer, Track};
use crate::error::{ItemKind, SkipReason, SkippedItem};
use crate::footprint::PlacedFootprint;
use crate::pads::PadAliasTable;
use crate::placement::PlacementMap;
use crate::types::ConnectionSpec;

/// A `Component:Pin` endpoint, split at the first colon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint<'a> {
    pub component: &'a str,
    pub pin: &'a str,
}

impl<'a> Endpoint<'a> {
    pub fn parse(s: &'a str) -> Result<Self, SkipReason> {
        match s.trim().split_once(':') {
            Some((component, pin)) if !component.trim().is_empty() && !pin.trim().is_empty() => {
                Ok(Endpoint {
                    component: component.trim(),
                    pin: pin.trim(),
                })
            }
            _ => Err(SkipReason::MalformedEndpoint {
                endpoint: s.to_string(),
            }),
        }
    }
}

/// Turns pin-to-pin connections into straight F.Cu tracks between pad
/// centres.
pub struct ConnectionRouter<'a> {
    aliases: &'a PadAliasTable,
}

impl<'a> ConnectionRouter<'a> {
    pub fn new(aliases: &'a PadAliasTable) -> Self {
        Self { aliases }
    }

    /// Route every connection independently at the board's default track
    /// width. Returns the number of tracks added and the skipped connections.
    pub fn route(
        &self,
        board: &mut Board,
        connections: &[ConnectionSpec],
        placements: &PlacementMap,
    ) -> (usize, Vec<SkippedItem>) {
        let mut routed = 0;
        let mut skipped = Vec::new();

        for conn in connections {
            match self.resolve(board, conn, placements) {
                Ok((start, end)) => {
                    board.add_track(Track {
                        start,
                        end,
                        width: board.settings.track_width,
                        layer: Layer::FCu,
                    });
                    routed += 1;
                    info!("Connected {}", conn.label());
                }
                Err(reason) => {
                    warn!("Skipping connection {}: {reason}", conn.label());
                    skipped.push(SkippedItem::new(ItemKind::Connection, conn.label(), reason));
                }
            }
        }
        (routed, skipped)
    }

    /// Board positions of both endpoint pads.
    fn resolve(
        &self,
        board: &Board,
        conn: &ConnectionSpec,
        placements: &PlacementMap,
    ) -> Result<([f64; 2], [f64; 2]), SkipReason> {
        let from = conn
            .from
            .as_deref()
            .ok_or(SkipReason::MalformedEndpoint {
                endpoint: String::new(),
            })
            .and_then(Endpoint::parse)?;
        let to = conn
            .to
            .as_deref()
            .ok_or(SkipReason::MalformedEndpoint {
                endpoint: String::new(),
            })
            .and_then(Endpoint::parse)?;

        let from_fp = lookup(board, placements, from.component)?;
        let to_fp = lookup(board, placements, to.component)?;

        Ok((
            self.pad_position(from_fp, &from)?,
            self.pad_position(to_fp, &to)?,
        ))
    }

    fn pad_position(&self, fp: &PlacedFootprint, ep: &Endpoint) -> Result<[f64; 2], SkipReason> {
        match self.aliases.find_pad(&fp.def, ep.pin) {
            Some(pad) => Ok(fp.pad_position(pad)),
            None => {
                let available = fp.def.pad_numbers();
                warn!(
                    "Available pads on {}: [{}]",
                    fp.reference,
                    available.join(", ")
                );
                Err(SkipReason::PadMissing {
                    component: ep.component.to_string(),
                    pin: ep.pin.to_string(),
                    available,
                })
            }
        }
    }
}

fn lookup<'b>(
    board: &'b Board,
    placements: &PlacementMap,
    component: &str,
) -> Result<&'b PlacedFootprint, SkipReason> {
    placements
        .get(component)
        .and_then(|&i| board.footprints.get(i))
        .ok_or_else(|| {
            let known: Vec<&str> = placements.keys().map(String::as_str).collect();
            warn!("Available components: [{}]", known.join(", "));
            SkipReason::ComponentMissing {
                component: component.to_string(),
            }
        })
}
