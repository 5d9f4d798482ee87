use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a whole generation run.
#[derive(Error, Debug)]
pub enum AssembleError {
    #[error("invalid circuit description: {0}")]
    InvalidDescription(String),

    #[error("circuit description was never parsed (only a raw model response is present)")]
    UnparsedDescription,

    #[error("cannot read footprint library {}: {source}", path.display())]
    Index {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid board configuration: {0}")]
    Config(String),

    #[error("invalid board outline: {0}")]
    Outline(String),

    #[error("invalid project name: {0:?}")]
    ProjectName(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Why a single component, connection or drill was left off the board.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    #[error("component is missing field `{field}`")]
    MissingField { field: &'static str },

    #[error("component field `{field}` is not a number: {value}")]
    InvalidField { field: &'static str, value: String },

    #[error("no footprint matches '{requested}' and no placeholder is available")]
    FootprintUnresolved { requested: String },

    #[error("footprint '{footprint}' could not be loaded: {message}")]
    FootprintLoad { footprint: String, message: String },

    #[error("malformed endpoint '{endpoint}', expected Component:Pin")]
    MalformedEndpoint { endpoint: String },

    #[error("component '{component}' is not on the board")]
    ComponentMissing { component: String },

    #[error("pad '{pin}' not found on {component} (available: {})", available.join(", "))]
    PadMissing {
        component: String,
        pin: String,
        available: Vec<String>,
    },

    #[error("invalid drill: {message}")]
    InvalidDrill { message: String },
}

/// The kind of input item a skip refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Component,
    Connection,
    Drill,
}

/// One entry of the skip list returned with every generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedItem {
    pub kind: ItemKind,
    /// Component name, connection label or drill index.
    pub id: String,
    #[serde(flatten)]
    pub reason: SkipReason,
    pub message: String,
}

impl SkippedItem {
    pub fn new(kind: ItemKind, id: impl Into<String>, reason: SkipReason) -> Self {
        let message = reason.to_string();
        Self {
            kind,
            id: id.into(),
            reason,
            message,
        }
    }
}
