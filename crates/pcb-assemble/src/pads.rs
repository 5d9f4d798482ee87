//! Symbolic pin names to physical pad numbers.
//!
//! Lookup order for a pin on a footprint: a pad whose number equals the pin,
//! then the aliases of every family whose pattern matches the footprint name
//! (table order), then the global aliases. Within one alias entry the
//! candidates are tried left to right; the first pad found wins.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::AssembleError;
use crate::footprint::{FootprintDef, PadDef};

/// Aliases that only apply to footprints whose name contains `pattern`
/// (ASCII case-insensitive).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyAliases {
    pub pattern: String,
    #[serde(default)]
    pub aliases: IndexMap<String, Vec<String>>,
}

impl FamilyAliases {
    pub fn matches(&self, footprint_name: &str) -> bool {
        footprint_name
            .to_ascii_lowercase()
            .contains(&self.pattern.to_ascii_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PadAliasTable {
    #[serde(default)]
    pub global: IndexMap<String, Vec<String>>,
    #[serde(default)]
    pub families: Vec<FamilyAliases>,
}

fn entries(pairs: &[(&str, &str)]) -> IndexMap<String, Vec<String>> {
    pairs
        .iter()
        .map(|(pin, pad)| (pin.to_string(), vec![pad.to_string()]))
        .collect()
}

impl Default for PadAliasTable {
    /// ATmega328P DIP-28 power and LED pins, plus the usual two-terminal
    /// names for LEDs and polarised capacitors.
    fn default() -> Self {
        Self {
            global: entries(&[
                ("PB5", "19"),
                ("VCC", "7"),
                ("GND", "8"),
                ("Power", "7"),
                ("Anode", "1"),
                ("Cathode", "2"),
            ]),
            families: vec![
                FamilyAliases {
                    pattern: "LED".into(),
                    aliases: entries(&[("A", "1"), ("K", "2")]),
                },
                FamilyAliases {
                    pattern: "CP_".into(),
                    aliases: entries(&[("+", "1"), ("-", "2")]),
                },
            ],
        }
    }
}

impl PadAliasTable {
    /// A table with no aliases; only exact pad numbers match.
    pub fn empty() -> Self {
        Self {
            global: IndexMap::new(),
            families: Vec::new(),
        }
    }

    pub fn from_json(data: &[u8]) -> Result<Self, AssembleError> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn load(path: &Path) -> Result<Self, AssembleError> {
        let data = std::fs::read(path)?;
        Self::from_json(&data)
    }

    pub fn insert_global(&mut self, pin: &str, pads: Vec<String>) {
        self.global.insert(pin.to_string(), pads);
    }

    pub fn insert_family(&mut self, pattern: &str, pin: &str, pads: Vec<String>) {
        match self.families.iter_mut().find(|f| f.pattern == pattern) {
            Some(family) => {
                family.aliases.insert(pin.to_string(), pads);
            }
            None => {
                let mut aliases = IndexMap::new();
                aliases.insert(pin.to_string(), pads);
                self.families.push(FamilyAliases {
                    pattern: pattern.to_string(),
                    aliases,
                });
            }
        }
    }

    /// Merge `other` into this table; its entries replace ours on conflict.
    pub fn extend(&mut self, other: PadAliasTable) {
        for (pin, pads) in other.global {
            self.insert_global(&pin, pads);
        }
        for family in other.families {
            for (pin, pads) in family.aliases {
                self.insert_family(&family.pattern, &pin, pads);
            }
        }
    }

    /// Alias candidates for `pin` on a footprint, family entries first.
    pub fn candidates<'a>(
        &'a self,
        footprint_name: &'a str,
        pin: &'a str,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.families
            .iter()
            .filter(move |f| f.matches(footprint_name))
            .filter_map(move |f| f.aliases.get(pin))
            .chain(self.global.get(pin))
            .flatten()
            .map(String::as_str)
    }

    pub fn find_pad<'f>(&self, footprint: &'f FootprintDef, pin: &str) -> Option<&'f PadDef> {
        if pin.is_empty() {
            return None;
        }
        let by_number = |number: &str| footprint.pads.iter().find(|p| p.number == number);

        by_number(pin).or_else(|| {
            self.candidates(&footprint.name, pin)
                .find_map(|alt| by_number(alt))
        })
    }
}
