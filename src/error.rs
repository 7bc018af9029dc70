//! Error types for the mapping, queue and settings layers
use thiserror::Error;

/// Errors raised by library modules
///
/// Application edges (`main`, CLI, MIDI connection) wrap these in `anyhow`.
#[derive(Error, Debug)]
pub enum MapperError {
    /// I/O error (mapping files, bake output)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Embedded settings store error
    #[error("Settings store error: {0}")]
    Settings(#[from] sled::Error),

    /// MIDI backend error
    #[error("MIDI error: {0}")]
    Midi(String),

    /// Action name not present in the action catalog
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Control id could not be parsed from an event id
    #[error("Invalid control id in '{0}'")]
    InvalidControlId(String),

    /// Index outside the bounds of a list
    #[error("Index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// No sequence is open in the sequencer
    #[error("No open sequence")]
    NoOpenSequence,

    /// Invalid parameter value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type for library operations
pub type Result<T> = std::result::Result<T, MapperError>;
