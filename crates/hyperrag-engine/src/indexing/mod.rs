//! Ingestion pipeline: extraction, merging, summarization, and publishing.

pub mod assembler;
pub mod extraction;
pub mod pipeline;
pub mod prompt;
pub mod records;
mod report;
pub mod summarization;

pub use assembler::{AssemblerConfig, AssemblyOutcome, AssemblyStats, GraphAssembler};
pub use extraction::{Chunk, ChunkExtraction, ExtractionState, Extractor};
pub use pipeline::{ChunkProgress, IngestOptions, Ingestor};
pub use prompt::{ExtractionPrompt, QueryPrompt, SummaryPrompt};
pub use records::{ParsedRecords, Record, build_batch, parse_records, parse_strength};
pub use report::IngestReport;
pub use summarization::{Summarizer, clean_summary};
