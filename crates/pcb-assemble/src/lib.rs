//! Turn a declarative circuit description into a KiCad board file and a
//! Gerber fabrication set.

pub mod board;
pub mod configure;
pub mod drills;
pub mod error;
pub mod export;
pub mod footprint;
pub mod library;
pub mod pads;
pub mod parsers;
pub mod pipeline;
pub mod placement;
pub mod router;
pub mod types;

pub use board::{Board, Layer};
pub use error::{AssembleError, ItemKind, SkipReason, SkippedItem};
pub use library::{FootprintIndex, FootprintResolver, IndexOptions, PlaceholderPolicy, ResolutionMethod};
pub use pads::PadAliasTable;
pub use pipeline::{
    assemble, generate, generate_from_file, validate_project_name, Assembly, AssemblyReport,
    GenerationReport, PipelineOptions, DEFAULT_PROJECT,
};
pub use types::CircuitDescription;
