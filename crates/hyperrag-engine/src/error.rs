//! Error types for the ingestion and query pipeline.

use thiserror::Error;

/// Result type alias using the engine error type.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that abort an ingestion run or a query.
///
/// Per-record and per-call failures (malformed lines, dangling edges, failed
/// summaries, single failed chunks) are recovered locally and only counted in
/// the [`IngestReport`](crate::IngestReport).
#[derive(Debug, Error)]
pub enum EngineError {
    /// Every chunk of a non-empty run failed to get a completion.
    #[error("Completion service unavailable: all {chunks} chunks failed (last error: {last_error})")]
    CompletionServiceUnavailable { chunks: usize, last_error: String },

    /// Two chunks of one run share an id. Votes and provenance are keyed by
    /// chunk id, so the run is refused before any completion call.
    #[error("Duplicate chunk id '{0}' in ingestion run")]
    DuplicateChunkId(String),

    /// Invalid configuration or profile.
    #[error("Configuration error: {0}")]
    Config(#[from] hyperrag_config::ConfigError),

    /// Snapshot or store failure.
    #[error("Graph error: {0}")]
    Graph(#[from] hyperrag_graph::GraphError),

    /// Completion call failed where no fallback exists.
    #[error("Completion error: {0}")]
    Llm(#[from] hyperrag_llm::LlmError),

    /// The merge worker stopped before the run finished.
    #[error("Merge worker failed: {0}")]
    Worker(String),
}
