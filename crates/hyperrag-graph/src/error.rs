//! Error types for the graph crate.

use thiserror::Error;

/// Errors that can occur in the graph crate.
#[derive(Debug, Error)]
pub enum GraphError {
    /// An edge references an entity the graph does not know (yet).
    #[error("Dangling reference: {edge} references unknown entity '{missing}'")]
    DanglingReference { edge: String, missing: String },

    /// A low-order edge whose two endpoints normalize to the same entity.
    #[error("Self-loop rejected for entity '{0}'")]
    SelfLoop(String),

    /// A high-order edge with fewer than two distinct participants.
    #[error("High-order edge needs at least two distinct participants, got {0}")]
    TooFewParticipants(usize),

    /// Empty entity name after normalization.
    #[error("Empty entity name")]
    EmptyName,

    /// Snapshot file I/O failed.
    #[error("Snapshot I/O error at '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Snapshot written by an incompatible version.
    #[error("Unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// Requested database does not exist.
    #[error("Database not found: {0}")]
    DatabaseNotFound(String),

    /// Database name cannot be used as a directory name.
    #[error("Invalid database name: {0}")]
    InvalidDatabaseName(String),
}

impl GraphError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Result type alias for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;
