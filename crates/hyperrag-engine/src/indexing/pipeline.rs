//! Ingestion runs.
//!
//! 1. Extract every chunk on a bounded set of concurrent workers
//! 2. Feed each chunk's batch to the merge worker as it completes
//! 3. Wait for pending retries and in-flight summaries
//! 4. Freeze the graph and publish it as the new snapshot
//!
//! Queries keep reading the previous snapshot until step 4.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use hyperrag_config::{DomainProfile, HyperragConfig, StrengthMerge};
use hyperrag_graph::{FrozenGraph, SnapshotCell, StrengthPolicy};

use super::assembler::{AssemblerConfig, GraphAssembler};
use super::extraction::{Chunk, Extractor};
use super::records::build_batch;
use super::report::IngestReport;
use super::summarization::Summarizer;
use crate::completer::Completer;
use crate::error::{EngineError, Result};

/// Knobs for an ingestion run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub max_concurrent_chunks: usize,
    pub extraction_max_tokens: u32,
    pub summary_max_tokens: u32,
    pub assembly: AssemblerConfig,
    pub strength_policy: StrengthPolicy,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            max_concurrent_chunks: 4,
            extraction_max_tokens: 4096,
            summary_max_tokens: 500,
            assembly: AssemblerConfig::default(),
            strength_policy: StrengthPolicy::Max,
        }
    }
}

impl IngestOptions {
    pub fn from_config(config: &HyperragConfig) -> Self {
        let extraction = config.extraction();
        let summary = config.summary();
        Self {
            max_concurrent_chunks: extraction.max_concurrent_chunks.max(1),
            extraction_max_tokens: config.llm().max_tokens,
            summary_max_tokens: summary.max_tokens,
            assembly: AssemblerConfig {
                summary_threshold: summary.threshold,
                max_concurrent_summaries: summary.max_concurrent,
            },
            strength_policy: match extraction.strength_policy {
                StrengthMerge::Max => StrengthPolicy::Max,
                StrengthMerge::Mean => StrengthPolicy::Mean,
            },
        }
    }
}

/// Progress notification, sent once per finished chunk.
#[derive(Debug, Clone)]
pub struct ChunkProgress {
    pub chunk_id: String,
    pub completed: usize,
    pub total: usize,
    pub failed: bool,
}

/// Turns chunks into a published hypergraph snapshot.
pub struct Ingestor {
    completer: Arc<dyn Completer>,
    profile: Arc<DomainProfile>,
    options: IngestOptions,
    snapshot: Arc<SnapshotCell>,
}

impl Ingestor {
    pub fn new(completer: Arc<dyn Completer>, profile: DomainProfile, options: IngestOptions) -> Self {
        Self {
            completer,
            profile: Arc::new(profile),
            options,
            snapshot: Arc::new(SnapshotCell::default()),
        }
    }

    /// Extend and publish into an existing snapshot cell.
    pub fn with_snapshot(mut self, snapshot: Arc<SnapshotCell>) -> Self {
        self.snapshot = snapshot;
        self
    }

    pub fn snapshot(&self) -> Arc<SnapshotCell> {
        self.snapshot.clone()
    }

    pub fn profile(&self) -> &DomainProfile {
        &self.profile
    }

    pub async fn ingest(&self, chunks: Vec<Chunk>) -> Result<IngestReport> {
        self.ingest_with_progress(chunks, |_| {}).await
    }

    /// Run ingestion, calling `on_chunk` as each chunk finishes extraction.
    ///
    /// The current snapshot is extended; the result is published only when
    /// the whole run succeeds. Fails with
    /// [`EngineError::DuplicateChunkId`] before any work when two chunks share
    /// an id, and with [`EngineError::CompletionServiceUnavailable`] when every
    /// chunk failed.
    pub async fn ingest_with_progress<F>(
        &self,
        chunks: Vec<Chunk>,
        mut on_chunk: F,
    ) -> Result<IngestReport>
    where
        F: FnMut(&ChunkProgress) + Send,
    {
        let mut report = IngestReport::default();
        if chunks.is_empty() {
            return Ok(report);
        }
        let total = chunks.len();

        let mut ids = HashSet::with_capacity(total);
        if let Some(dup) = chunks.iter().find(|c| !ids.insert(c.id.as_str())) {
            return Err(EngineError::DuplicateChunkId(dup.id.clone()));
        }

        let mut base = self.snapshot.current().thaw();
        base.set_strength_policy(self.options.strength_policy);

        let summarizer = Arc::new(Summarizer::new(
            self.completer.clone(),
            self.profile.clone(),
            self.options.summary_max_tokens,
        ));
        let assembler = GraphAssembler::spawn(base, Some(summarizer), self.options.assembly.clone());
        let extractor = Extractor::new(
            self.completer.clone(),
            self.profile.clone(),
            self.options.extraction_max_tokens,
        );

        info!(
            chunks = total,
            profile = %self.profile.name,
            concurrency = self.options.max_concurrent_chunks,
            "Starting ingestion"
        );

        let mut last_error = String::new();
        let mut completed = 0;
        let mut results = stream::iter(&chunks)
            .map(|chunk| {
                let extractor = &extractor;
                async move { (chunk.id.as_str(), extractor.extract(chunk).await) }
            })
            .buffer_unordered(self.options.max_concurrent_chunks.max(1));

        while let Some((chunk_id, result)) = results.next().await {
            completed += 1;
            let failed = result.is_err();
            match result {
                Ok(extraction) => {
                    report.chunks_processed += 1;
                    report.records_parsed += extraction.records.parsed;
                    report.lines_skipped += extraction.records.skipped;
                    report.continuation_rounds += extraction.rounds;
                    report.completion_calls += extraction.completion_calls;
                    report.completion_failures += extraction.completion_failures;

                    let batch = build_batch(chunk_id, &extraction.records.records, &self.profile);
                    assembler.submit(batch)?;
                    info!(
                        chunk = chunk_id,
                        records = extraction.records.parsed,
                        skipped = extraction.records.skipped,
                        "Chunk processed"
                    );
                }
                Err(e) => {
                    report.chunks_failed += 1;
                    report.completion_calls += 1;
                    report.completion_failures += 1;
                    warn!(chunk = chunk_id, error = %e, "Chunk extraction failed");
                    last_error = e.to_string();
                }
            }
            on_chunk(&ChunkProgress {
                chunk_id: chunk_id.to_string(),
                completed,
                total,
                failed,
            });
        }
        drop(results);

        let outcome = assembler.finish().await?;

        if report.chunks_processed == 0 {
            return Err(EngineError::CompletionServiceUnavailable {
                chunks: total,
                last_error,
            });
        }

        report.absorb_assembly(&outcome.stats);
        let summary_calls = outcome.stats.summaries_applied
            + outcome.stats.summaries_failed
            + outcome.stats.summaries_stale;
        report.completion_calls += summary_calls;
        report.completion_failures += outcome.stats.summaries_failed;
        report.type_conflicts = outcome.graph.stats().type_conflicts;

        let frozen = FrozenGraph::freeze(outcome.graph);
        info!(stats = %frozen.stats(), "Publishing snapshot");
        self.snapshot.publish(Arc::new(frozen));

        info!(%report, "Ingestion complete");
        Ok(report)
    }
}
