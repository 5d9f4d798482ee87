use indexmap::{IndexMap, IndexSet};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::error::AssembleError;
use crate::parsers::kicad::FOOTPRINT_EXT;

/// Directory suffix of a KiCad footprint library.
pub const PRETTY_EXT: &str = "pretty";

const FOOTPRINT_DIR_VARS: [&str; 4] = [
    "KICAD9_FOOTPRINT_DIR",
    "KICAD8_FOOTPRINT_DIR",
    "KICAD7_FOOTPRINT_DIR",
    "KICAD6_FOOTPRINT_DIR",
];

const KICAD_MAJORS: [&str; 4] = ["9.0", "8.0", "7.0", "6.0"];

/// One scanned `.pretty` directory.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryRoot {
    pub path: PathBuf,
    /// Footprint names in scan order.
    pub footprints: Vec<String>,
}

/// Footprint name to the library directories defining it, in scan order.
#[derive(Debug, Clone, Default)]
pub struct FootprintIndex {
    entries: IndexMap<String, Vec<PathBuf>>,
    libraries: Vec<LibraryRoot>,
}

/// Which roots to scan.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Include the installed KiCad libraries.
    pub system_libraries: bool,
    /// User libraries, scanned after the system ones.
    pub extra_roots: Vec<PathBuf>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            system_libraries: true,
            extra_roots: Vec::new(),
        }
    }
}

impl IndexOptions {
    /// Library roots only from the given paths.
    pub fn only(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            system_libraries: false,
            extra_roots: roots.into_iter().collect(),
        }
    }

    pub fn roots(&self) -> Vec<PathBuf> {
        let mut roots = if self.system_libraries {
            system_roots()
        } else {
            Vec::new()
        };
        roots.extend(self.extra_roots.iter().cloned());
        roots
    }
}

/// Installed KiCad footprint directories: the `KICAD*_FOOTPRINT_DIR`
/// variables first, then the stock install locations. Only existing
/// directories are returned.
pub fn system_roots() -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = FOOTPRINT_DIR_VARS
        .iter()
        .filter_map(|var| std::env::var_os(var))
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .collect();

    candidates.push(PathBuf::from("/usr/share/kicad/footprints"));
    candidates.push(PathBuf::from("/usr/local/share/kicad/footprints"));
    candidates.push(PathBuf::from(
        "/Applications/KiCad/KiCad.app/Contents/SharedSupport/footprints",
    ));
    for major in KICAD_MAJORS {
        candidates.push(
            Path::new(r"C:\Program Files\KiCad")
                .join(major)
                .join("share")
                .join("kicad")
                .join("footprints"),
        );
    }

    candidates.into_iter().filter(|p| p.is_dir()).collect()
}

fn is_pretty(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(PRETTY_EXT))
        .unwrap_or(false)
}

/// Directory entries sorted by file name (byte order).
fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, AssembleError> {
    let read = std::fs::read_dir(dir).map_err(|source| AssembleError::Index {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths = Vec::new();
    for entry in read {
        let entry = entry.map_err(|source| AssembleError::Index {
            path: dir.to_path_buf(),
            source,
        })?;
        paths.push(entry.path());
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

impl FootprintIndex {
    /// Scan the given roots. Each root is a `.pretty` library or a directory
    /// holding libraries; missing roots are skipped with a warning.
    pub fn build(roots: &[PathBuf]) -> Result<Self, AssembleError> {
        let unique: IndexSet<&PathBuf> = roots.iter().collect();

        let mut library_dirs: IndexSet<PathBuf> = IndexSet::new();
        for root in unique {
            if !root.exists() {
                warn!("Footprint library root {} does not exist, skipping", root.display());
                continue;
            }
            if !root.is_dir() {
                warn!("Footprint library root {} is not a directory, skipping", root.display());
                continue;
            }
            info!("Scanning footprint libraries under {}", root.display());
            if is_pretty(root) {
                library_dirs.insert(root.clone());
            } else {
                for child in sorted_entries(root)? {
                    if child.is_dir() && is_pretty(&child) {
                        library_dirs.insert(child);
                    }
                }
            }
        }

        let mut index = FootprintIndex::default();
        for dir in library_dirs {
            let mut footprints = Vec::new();
            for file in sorted_entries(&dir)? {
                if file.extension().and_then(|e| e.to_str()) != Some(FOOTPRINT_EXT) {
                    continue;
                }
                let Some(name) = file.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                index
                    .entries
                    .entry(name.to_string())
                    .or_default()
                    .push(dir.clone());
                footprints.push(name.to_string());
            }
            debug!("{}: {} footprints", dir.display(), footprints.len());
            index.libraries.push(LibraryRoot {
                path: dir,
                footprints,
            });
        }

        info!(
            "Indexed {} unique footprints in {} libraries",
            index.entries.len(),
            index.libraries.len()
        );
        Ok(index)
    }

    /// Library directories defining `name`, first-found first.
    pub fn get(&self, name: &str) -> Option<&[PathBuf]> {
        self.entries
            .get(name)
            .map(Vec::as_slice)
            .filter(|dirs| !dirs.is_empty())
    }

    /// The winning library directory for `name`.
    pub fn first(&self, name: &str) -> Option<&Path> {
        self.get(name).and_then(|dirs| dirs.first()).map(PathBuf::as_path)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Indexed names in first-insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> + Clone {
        self.entries.keys().map(String::as_str)
    }

    pub fn libraries(&self) -> &[LibraryRoot] {
        &self.libraries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
