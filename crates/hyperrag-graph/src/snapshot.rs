//! Frozen, read-only hypergraph snapshots.
//!
//! Ingestion publishes a [`FrozenGraph`] once all merges and summaries of a
//! run have finished; queries only ever see a published snapshot. Snapshots
//! persist as versioned JSON.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{GraphError, Result};
use crate::hypergraph::{GraphStats, Hypergraph};
use crate::index::DualLevelIndex;

/// Snapshot file format version.
pub const SNAPSHOT_VERSION: u32 = 1;

// ─────────────────────────────────────────────────────────────────────────────
// Frozen Graph
// ─────────────────────────────────────────────────────────────────────────────

/// An immutable hypergraph with its degree table and keyword index.
#[derive(Debug)]
pub struct FrozenGraph {
    graph: Hypergraph,
    frozen_at: DateTime<Utc>,
    degrees: BTreeMap<String, usize>,
    index: DualLevelIndex,
}

impl FrozenGraph {
    /// Freeze a graph now, building its index.
    pub fn freeze(graph: Hypergraph) -> Self {
        Self::freeze_at(graph, Utc::now())
    }

    fn freeze_at(graph: Hypergraph, frozen_at: DateTime<Utc>) -> Self {
        let degrees = graph.degrees();
        let index = DualLevelIndex::build(&graph, &degrees);
        Self {
            graph,
            frozen_at,
            degrees,
            index,
        }
    }

    pub fn empty() -> Self {
        Self::freeze(Hypergraph::new())
    }

    pub fn graph(&self) -> &Hypergraph {
        &self.graph
    }

    pub fn frozen_at(&self) -> DateTime<Utc> {
        self.frozen_at
    }

    pub fn index(&self) -> &DualLevelIndex {
        &self.index
    }

    /// Incident edge count of an entity (normalized name).
    pub fn degree(&self, name: &str) -> usize {
        self.degrees.get(name).copied().unwrap_or(0)
    }

    pub fn stats(&self) -> GraphStats {
        self.graph.stats()
    }

    /// A mutable copy to extend in a later run.
    pub fn thaw(&self) -> Hypergraph {
        self.graph.clone()
    }

    // ── Persistence ──────────────────────────────────────────────────────────

    pub fn to_json(&self) -> Result<String> {
        let file = SnapshotFileRef {
            version: SNAPSHOT_VERSION,
            frozen_at: self.frozen_at,
            graph: &self.graph,
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let header: SnapshotHeader = serde_json::from_str(json)?;
        if header.version != SNAPSHOT_VERSION {
            return Err(GraphError::UnsupportedVersion {
                found: header.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        let file: SnapshotFile = serde_json::from_str(json)?;
        Ok(Self::freeze_at(file.graph, file.frozen_at))
    }

    /// Write atomically (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| GraphError::io(parent, e))?;
        }
        let json = self.to_json()?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| GraphError::io(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| GraphError::io(path, e))?;

        info!(path = %path.display(), stats = %self.stats(), "Saved snapshot");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| GraphError::io(path, e))?;
        let frozen = Self::from_json(&json)?;
        debug!(path = %path.display(), stats = %frozen.stats(), "Loaded snapshot");
        Ok(frozen)
    }
}

#[derive(Serialize)]
struct SnapshotFileRef<'a> {
    version: u32,
    frozen_at: DateTime<Utc>,
    graph: &'a Hypergraph,
}

#[derive(Deserialize)]
struct SnapshotHeader {
    version: u32,
}

#[derive(Deserialize)]
struct SnapshotFile {
    frozen_at: DateTime<Utc>,
    graph: Hypergraph,
}

// ─────────────────────────────────────────────────────────────────────────────
// Publication
// ─────────────────────────────────────────────────────────────────────────────

/// The last published snapshot, swapped atomically by ingestion.
#[derive(Debug)]
pub struct SnapshotCell {
    current: RwLock<Arc<FrozenGraph>>,
}

impl SnapshotCell {
    pub fn new(initial: FrozenGraph) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// The snapshot readers should use right now.
    pub fn current(&self) -> Arc<FrozenGraph> {
        self.current.read().clone()
    }

    /// Replace the published snapshot, returning the previous one.
    pub fn publish(&self, next: Arc<FrozenGraph>) -> Arc<FrozenGraph> {
        std::mem::replace(&mut *self.current.write(), next)
    }
}

impl Default for SnapshotCell {
    fn default() -> Self {
        Self::new(FrozenGraph::empty())
    }
}
