//! Per-run ingestion counters.

use serde::Serialize;

use super::assembler::AssemblyStats;

/// Report summarizing one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Chunks whose extraction produced output.
    pub chunks_processed: usize,
    /// Chunks whose initial extraction call failed.
    pub chunks_failed: usize,
    /// Records parsed from completion output.
    pub records_parsed: usize,
    /// Lines dropped as unknown or malformed.
    pub lines_skipped: usize,
    /// Continuation rounds across all chunks.
    pub continuation_rounds: u32,
    pub entities_created: usize,
    pub entities_merged: usize,
    pub edges_created: usize,
    pub edges_merged: usize,
    pub hyperedges_created: usize,
    pub hyperedges_merged: usize,
    /// Self-loops, empty names, and undersized participant sets.
    pub records_rejected: usize,
    /// Edges still missing an endpoint at the end of the run.
    pub dangling_dropped: usize,
    /// Entity type observations disagreeing with the majority, graph-wide.
    pub type_conflicts: usize,
    pub summaries_applied: usize,
    pub summaries_failed: usize,
    pub completion_calls: usize,
    pub completion_failures: usize,
}

impl IngestReport {
    /// Fold the merge worker's counters in.
    pub fn absorb_assembly(&mut self, stats: &AssemblyStats) {
        let m = &stats.merge;
        self.entities_created += m.entities_created;
        self.entities_merged += m.entities_merged;
        self.edges_created += m.edges_created;
        self.edges_merged += m.edges_merged;
        self.hyperedges_created += m.hyperedges_created;
        self.hyperedges_merged += m.hyperedges_merged;
        self.records_rejected += m.rejected;
        self.dangling_dropped += stats.dangling_dropped;
        self.summaries_applied += stats.summaries_applied;
        self.summaries_failed += stats.summaries_failed;
    }

    pub fn chunks_total(&self) -> usize {
        self.chunks_processed + self.chunks_failed
    }

    /// Whether anything was lost along the way.
    pub fn has_losses(&self) -> bool {
        self.chunks_failed > 0
            || self.dangling_dropped > 0
            || self.summaries_failed > 0
            || self.completion_failures > 0
    }
}

impl std::fmt::Display for IngestReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "IngestReport {{ chunks: {}/{} (failed: {}), records: {} (skipped: {}), entities: +{} ~{}, edges: +{} ~{}, hyperedges: +{} ~{}, dropped: {}, type conflicts: {}, summaries: {} (failed: {}), completions: {} (failed: {}) }}",
            self.chunks_processed,
            self.chunks_total(),
            self.chunks_failed,
            self.records_parsed,
            self.lines_skipped,
            self.entities_created,
            self.entities_merged,
            self.edges_created,
            self.edges_merged,
            self.hyperedges_created,
            self.hyperedges_merged,
            self.dangling_dropped,
            self.type_conflicts,
            self.summaries_applied,
            self.summaries_failed,
            self.completion_calls,
            self.completion_failures,
        )
    }
}
