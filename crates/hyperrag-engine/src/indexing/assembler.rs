//! Single-writer graph assembly.
//!
//! One worker task owns the [`Hypergraph`] and consumes a queue of per-chunk
//! batches in arrival order. When a merge pushes a fragment list to the
//! summary threshold, a summarization task is spawned; its result comes back
//! through the same queue, so the graph is never touched from two places.
//!
//! Edges whose endpoints are not known yet are held back and retried once,
//! when the run is finished; what still dangles then is dropped.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use hyperrag_graph::{Batch, FragmentTarget, Hypergraph, MergeStats, PendingRecord};

use super::summarization::Summarizer;
use crate::error::{EngineError, Result};

/// Assembly settings.
#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    /// Fragment count at which a list is summarized.
    pub summary_threshold: usize,
    /// Summaries allowed in flight at once.
    pub max_concurrent_summaries: usize,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            summary_threshold: 3,
            max_concurrent_summaries: 4,
        }
    }
}

/// Counters for one assembly run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyStats {
    pub batches: usize,
    pub merge: MergeStats,
    pub dangling_dropped: usize,
    pub summaries_applied: usize,
    pub summaries_failed: usize,
    /// Results whose fragments were all gone by the time they arrived.
    pub summaries_stale: usize,
}

/// The finished graph and what happened to it.
#[derive(Debug)]
pub struct AssemblyOutcome {
    pub graph: Hypergraph,
    pub stats: AssemblyStats,
    pub dropped: Vec<PendingRecord>,
}

enum Job {
    Batch(Batch),
    Summary(SummaryDone),
    Finish,
}

struct SummaryDone {
    target: FragmentTarget,
    replaced: Vec<String>,
    summary: Option<String>,
}

/// Reports a summary task's result to the worker when dropped, so a task
/// that panics or is cancelled still clears its list from `in_flight` and
/// counts as a failed summary.
struct SummaryReply {
    tx: mpsc::UnboundedSender<Job>,
    done: Option<SummaryDone>,
}

impl SummaryReply {
    fn new(tx: mpsc::UnboundedSender<Job>, target: FragmentTarget, replaced: Vec<String>) -> Self {
        Self {
            tx,
            done: Some(SummaryDone {
                target,
                replaced,
                summary: None,
            }),
        }
    }

    fn complete(mut self, summary: Option<String>) {
        if let Some(done) = self.done.as_mut() {
            done.summary = summary;
        }
    }
}

impl Drop for SummaryReply {
    fn drop(&mut self) {
        if let Some(done) = self.done.take() {
            let _ = self.tx.send(Job::Summary(done));
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handle
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to a running merge worker.
pub struct GraphAssembler {
    tx: mpsc::UnboundedSender<Job>,
    worker: JoinHandle<AssemblyOutcome>,
}

impl GraphAssembler {
    /// Start a worker that extends `graph`.
    ///
    /// Without a summarizer, fragment lists grow without bound.
    pub fn spawn(
        graph: Hypergraph,
        summarizer: Option<Arc<Summarizer>>,
        config: AssemblerConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Worker {
            graph,
            summarizer,
            threshold: config.summary_threshold.max(2),
            permits: Arc::new(Semaphore::new(config.max_concurrent_summaries.max(1))),
            in_flight: BTreeSet::new(),
            pending: Vec::new(),
            dropped: Vec::new(),
            stats: AssemblyStats::default(),
            tx: tx.downgrade(),
        };
        Self {
            tx,
            worker: tokio::spawn(worker.run(rx)),
        }
    }

    /// Queue a chunk's batch for merging.
    pub fn submit(&self, batch: Batch) -> Result<()> {
        self.tx
            .send(Job::Batch(batch))
            .map_err(|_| EngineError::Worker("merge worker has stopped".to_string()))
    }

    /// Retry pending records, wait for in-flight summaries, and return the graph.
    pub async fn finish(self) -> Result<AssemblyOutcome> {
        let Self { tx, worker } = self;
        tx.send(Job::Finish)
            .map_err(|_| EngineError::Worker("merge worker has stopped".to_string()))?;
        // `tx` stays alive until the worker is done so summary tasks can report back.
        let outcome = worker
            .await
            .map_err(|e| EngineError::Worker(e.to_string()))?;
        drop(tx);
        Ok(outcome)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Worker
// ─────────────────────────────────────────────────────────────────────────────

struct Worker {
    graph: Hypergraph,
    summarizer: Option<Arc<Summarizer>>,
    threshold: usize,
    permits: Arc<Semaphore>,
    in_flight: BTreeSet<FragmentTarget>,
    pending: Vec<PendingRecord>,
    dropped: Vec<PendingRecord>,
    stats: AssemblyStats,
    tx: mpsc::WeakUnboundedSender<Job>,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Job>) -> AssemblyOutcome {
        let mut closing = false;

        while let Some(job) = rx.recv().await {
            match job {
                Job::Batch(batch) => self.merge(&batch),
                Job::Summary(done) => self.apply(done),
                Job::Finish => {
                    self.flush_pending();
                    closing = true;
                }
            }
            if closing && self.in_flight.is_empty() {
                break;
            }
        }

        info!(
            batches = self.stats.batches,
            entities = self.graph.stats().entities,
            edges = self.graph.stats().edges,
            hyperedges = self.graph.stats().hyperedges,
            summaries = self.stats.summaries_applied,
            dropped = self.stats.dangling_dropped,
            "Assembly complete"
        );
        AssemblyOutcome {
            graph: self.graph,
            stats: self.stats,
            dropped: self.dropped,
        }
    }

    fn merge(&mut self, batch: &Batch) {
        let outcome = self.graph.merge_batch(batch);
        self.stats.batches += 1;
        self.stats.merge.absorb(&outcome.stats);
        if !outcome.pending.is_empty() {
            debug!(chunk = %batch.chunk_id, pending = outcome.pending.len(), "Holding dangling records");
        }
        self.pending.extend(outcome.pending);
        self.schedule(&outcome.touched);
    }

    fn flush_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.pending);
        let outcome = self.graph.retry_pending(pending);
        self.stats.merge.absorb(&outcome.stats);
        self.stats.dangling_dropped += outcome.dropped.len();
        self.dropped.extend(outcome.dropped);
        self.schedule(&outcome.touched);
    }

    fn apply(&mut self, done: SummaryDone) {
        self.in_flight.remove(&done.target);
        match done.summary {
            Some(summary) => {
                if self.graph.apply_summary(&done.target, &done.replaced, &summary) {
                    self.stats.summaries_applied += 1;
                } else {
                    self.stats.summaries_stale += 1;
                    debug!(list = %done.target, "Discarding stale summary");
                }
                // Fragments that arrived while the summary was in flight.
                self.schedule([&done.target]);
            }
            None => self.stats.summaries_failed += 1,
        }
    }

    fn schedule<'a, I>(&mut self, touched: I)
    where
        I: IntoIterator<Item = &'a FragmentTarget>,
    {
        let Some(summarizer) = self.summarizer.clone() else {
            return;
        };

        for target in self.graph.summary_candidates(touched, self.threshold) {
            if self.in_flight.contains(&target) {
                continue;
            }
            let Some(log) = self.graph.fragment_log(&target) else {
                continue;
            };
            let Some(tx) = self.tx.upgrade() else {
                warn!(list = %target, "Merge queue closed, skipping summary");
                return;
            };

            let label = self.label(&target);
            let permits = self.permits.clone();
            let summarizer = summarizer.clone();
            self.in_flight.insert(target.clone());
            let reply = SummaryReply::new(tx, target.clone(), log.texts());

            tokio::spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let summary = match &reply.done {
                    Some(job) => summarizer.summarize(&job.target, &label, &job.replaced).await,
                    None => None,
                };
                reply.complete(summary);
            });
        }
    }

    /// Human-readable name of a fragment list's owner.
    fn label(&self, target: &FragmentTarget) -> String {
        let display = |name: &str| {
            self.graph
                .entity(name)
                .map_or_else(|| name.to_string(), |e| e.display_name().to_string())
        };
        match target {
            FragmentTarget::EntityDescription(name) | FragmentTarget::EntityProperties(name) => {
                display(name)
            }
            FragmentTarget::EdgeDescription(key) => {
                format!("{} - {}", display(key.first()), display(key.second()))
            }
            FragmentTarget::HyperedgeDescription(set) => set
                .names()
                .iter()
                .map(|n| display(n))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}
