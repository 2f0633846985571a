//! Ingestion and query pipeline for hyperrag.
//!
//! ```text
//! chunks ──▶ Extractor (N concurrent) ──▶ records ──▶ GraphAssembler ──▶ FrozenGraph
//!                                                      │    ▲              │
//!                                                      ▼    │              ▼
//!                                                      Summarizer       SnapshotCell
//!                                                                          │
//! query ──▶ KeywordExtractor ──▶ retrieve ──▶ response prompt ◀────────────┘
//! ```
//!
//! Every completion goes through the [`Completer`] seam, so tests drive the
//! whole pipeline with scripted replies.

pub mod completer;
pub mod error;
pub mod indexing;
pub mod retrieval;

pub use completer::{BackendCompleter, Completer};
pub use error::{EngineError, Result};
pub use indexing::{
    AssemblerConfig, Chunk, ChunkProgress, IngestOptions, IngestReport, Ingestor,
};
pub use retrieval::{Answer, AnswerOptions, Answerer, KeywordExtractor};
