use log::{info, warn};
use std::path::PathBuf;

use super::{FootprintIndex, ResolutionMethod};

/// Footprint substituted for anything that cannot be matched.
pub const DEFAULT_PLACEHOLDER: &str = "R_0805_2012Metric";

/// What to fall back to when neither exact nor fuzzy lookup finds a name.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceholderPolicy {
    pub name: String,
    /// Substrings that must all appear in a substitute when `name` itself
    /// is not indexed.
    pub heuristic: Vec<String>,
}

impl Default for PlaceholderPolicy {
    fn default() -> Self {
        Self {
            name: DEFAULT_PLACEHOLDER.to_string(),
            heuristic: vec!["R_".to_string(), "0805".to_string()],
        }
    }
}

/// A footprint name bound to the library that will supply it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub library: PathBuf,
    pub name: String,
    pub method: ResolutionMethod,
}

/// Strip everything but ASCII letters and digits, then lowercase.
pub fn normalize(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Best-effort match ignoring case and punctuation: the first candidate with
/// an equal normalized form, else the first whose normalized form contains
/// the request.
pub fn fuzzy_find<'a>(
    requested: &str,
    candidates: impl IntoIterator<Item = &'a str> + Clone,
) -> Option<&'a str> {
    let wanted = normalize(requested);
    if wanted.is_empty() {
        return None;
    }
    candidates
        .clone()
        .into_iter()
        .find(|c| normalize(c) == wanted)
        .or_else(|| candidates.into_iter().find(|c| normalize(c).contains(&wanted)))
}

pub struct FootprintResolver<'a> {
    index: &'a FootprintIndex,
    placeholder: PlaceholderPolicy,
}

impl<'a> FootprintResolver<'a> {
    pub fn new(index: &'a FootprintIndex, placeholder: PlaceholderPolicy) -> Self {
        Self { index, placeholder }
    }

    /// Exact, then fuzzy, then placeholder.
    pub fn resolve(&self, requested: &str) -> Option<Resolved> {
        let requested = requested.trim();

        if let Some(dir) = self.index.first(requested) {
            return Some(Resolved {
                library: dir.to_path_buf(),
                name: requested.to_string(),
                method: ResolutionMethod::Exact,
            });
        }

        if let Some(name) = fuzzy_find(requested, self.index.names()) {
            if let Some(dir) = self.index.first(name) {
                info!("Fuzzy matched '{requested}' -> '{name}'");
                return Some(Resolved {
                    library: dir.to_path_buf(),
                    name: name.to_string(),
                    method: ResolutionMethod::Fuzzy,
                });
            }
        }

        let resolved = self.placeholder();
        match &resolved {
            Some(p) => warn!("No footprint matches '{requested}', using placeholder {}", p.name),
            None => warn!("No footprint matches '{requested}' and no placeholder is indexed"),
        }
        resolved
    }

    /// The configured placeholder, or the first indexed name satisfying the
    /// heuristic.
    pub fn placeholder(&self) -> Option<Resolved> {
        let name = if self.index.contains(&self.placeholder.name) {
            Some(self.placeholder.name.as_str())
        } else if self.placeholder.heuristic.is_empty() {
            None
        } else {
            self.index.names().find(|name| {
                self.placeholder
                    .heuristic
                    .iter()
                    .all(|part| name.contains(part.as_str()))
            })
        }?;

        let dir = self.index.first(name)?;
        Some(Resolved {
            library: dir.to_path_buf(),
            name: name.to_string(),
            method: ResolutionMethod::Placeholder,
        })
    }
}
