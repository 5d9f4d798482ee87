use indexmap::IndexMap;
use log::{info, warn};
use serde::Serialize;

use crate::board::Board;
use crate::error::{ItemKind, SkipReason, SkippedItem};
use crate::footprint::{FootprintDef, PlacedFootprint};
use crate::library::{FootprintResolver, ResolutionMethod, Resolved};
use crate::parsers::kicad::load_footprint;
use crate::types::{serialize_point, ComponentSpec, Scalar};

/// Component name to the index of its footprint on the board.
pub type PlacementMap = IndexMap<String, usize>;

/// What was placed for one component, for the generation report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacementRecord {
    pub name: String,
    pub requested: String,
    /// `Library:Footprint` actually placed.
    pub footprint: String,
    pub method: ResolutionMethod,
    #[serde(serialize_with = "serialize_point")]
    pub position: [f64; 2],
    pub rotation: f64,
}

#[derive(Debug, Default)]
pub struct PlacementOutcome {
    pub map: PlacementMap,
    pub placed: Vec<PlacementRecord>,
    pub skipped: Vec<SkippedItem>,
}

pub struct ComponentPlacer<'a> {
    resolver: FootprintResolver<'a>,
}

impl<'a> ComponentPlacer<'a> {
    pub fn new(resolver: FootprintResolver<'a>) -> Self {
        Self { resolver }
    }

    /// Place every component in input order. Failures skip that component
    /// only; a repeated name points the map at the later footprint.
    pub fn place_all(&self, board: &mut Board, components: &[ComponentSpec]) -> PlacementOutcome {
        let mut outcome = PlacementOutcome::default();

        for (i, comp) in components.iter().enumerate() {
            let id = comp
                .name
                .as_deref()
                .filter(|n| !n.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("components[{i}]"));

            match self.place(board, comp) {
                Ok(record) => {
                    let index = board.footprints.len() - 1;
                    if let Some(previous) = outcome.map.insert(record.name.clone(), index) {
                        warn!(
                            "Duplicate component name '{}': footprint #{previous} is no longer routable",
                            record.name
                        );
                    }
                    outcome.placed.push(record);
                }
                Err(reason) => {
                    warn!("Skipping component {id}: {reason}");
                    outcome
                        .skipped
                        .push(SkippedItem::new(ItemKind::Component, id, reason));
                }
            }
        }
        outcome
    }

    /// Resolve, load and add one component to the board.
    pub fn place(
        &self,
        board: &mut Board,
        comp: &ComponentSpec,
    ) -> Result<PlacementRecord, SkipReason> {
        let name = comp
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or(SkipReason::MissingField { field: "name" })?;
        let requested = comp
            .footprint
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .ok_or(SkipReason::MissingField { field: "footprint" })?;
        let position = comp
            .position
            .as_ref()
            .ok_or(SkipReason::MissingField { field: "position" })?;
        let at = match (&position.x, &position.y) {
            (Some(x), Some(y)) => [number("position", x)?, number("position", y)?],
            _ => return Err(SkipReason::MissingField { field: "position" }),
        };
        let rotation = match &comp.rotation {
            Some(r) => number("rotation", r)?,
            None => 0.0,
        };

        let resolved = self
            .resolver
            .resolve(requested)
            .ok_or_else(|| SkipReason::FootprintUnresolved {
                requested: requested.to_string(),
            })?;
        let (def, method) = self.load(&resolved)?;

        let mut placed = PlacedFootprint::new(def, name, &comp.value_text(), at, rotation);
        placed.requested = requested.to_string();
        placed.resolution = method;

        let record = PlacementRecord {
            name: name.to_string(),
            requested: requested.to_string(),
            footprint: placed.def.lib_id(),
            method,
            position: at,
            rotation,
        };
        info!(
            "{name}: {} ({method}) at ({}, {}) rot {rotation}",
            record.footprint, at[0], at[1]
        );
        board.add_footprint(placed);
        Ok(record)
    }

    /// Load the resolved footprint; a file that will not load is replaced by
    /// the placeholder.
    fn load(&self, resolved: &Resolved) -> Result<(FootprintDef, ResolutionMethod), SkipReason> {
        let first_error = match load_footprint(&resolved.library, &resolved.name) {
            Ok(def) => return Ok((def, resolved.method)),
            Err(e) => e.to_string(),
        };
        warn!(
            "Failed to load {} from {}: {first_error}",
            resolved.name,
            resolved.library.display()
        );

        let fallback = self
            .resolver
            .placeholder()
            .filter(|p| p.library != resolved.library || p.name != resolved.name);
        let Some(fallback) = fallback else {
            return Err(SkipReason::FootprintLoad {
                footprint: resolved.name.clone(),
                message: first_error,
            });
        };

        load_footprint(&fallback.library, &fallback.name)
            .map(|def| (def, ResolutionMethod::Placeholder))
            .map_err(|e| SkipReason::FootprintLoad {
                footprint: fallback.name.clone(),
                message: e.to_string(),
            })
    }
}

fn number(field: &'static str, value: &Scalar) -> Result<f64, SkipReason> {
    value.as_f64().ok_or_else(|| SkipReason::InvalidField {
        field,
        value: value.to_string(),
    })
}
