//! Footprint library discovery and name resolution.

mod index;
mod resolver;

pub use index::{system_roots, FootprintIndex, IndexOptions, LibraryRoot, PRETTY_EXT};
pub use resolver::{
    fuzzy_find, normalize, FootprintResolver, PlaceholderPolicy, Resolved, DEFAULT_PLACEHOLDER,
};

use serde::Serialize;

/// How a requested footprint name was bound to an indexed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    Exact,
    Fuzzy,
    Placeholder,
}

impl std::fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ResolutionMethod::Exact => "exact",
            ResolutionMethod::Fuzzy => "fuzzy",
            ResolutionMethod::Placeholder => "placeholder",
        })
    }
}
