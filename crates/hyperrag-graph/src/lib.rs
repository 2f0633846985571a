//! Hypergraph knowledge model for hyperrag.
//!
//! Entities are joined by two kinds of hyperedge: pairwise (low-order) edges
//! keyed by an unordered pair, and high-order edges keyed by a participant set.
//! Every element carries provenance-ordered description fragments so merges are
//! independent of the order in which chunks arrive.
//!
//! ```text
//!   Batch ──merge_batch──▶ Hypergraph ──freeze──▶ FrozenGraph ──retrieve──▶ ContextPackage
//!                              ▲                    │  + DualLevelIndex
//!                              └──────── thaw ──────┘
//! ```

pub mod error;
pub mod hypergraph;
pub mod index;
pub mod model;
pub mod query;
pub mod snapshot;
pub mod store;

pub use error::{GraphError, Result};
pub use hypergraph::{
    BatchOutcome, GraphStats, Hypergraph, MergeOutcome, MergeStats, PendingOutcome, PendingRecord,
};
pub use index::{DualLevelIndex, Hit, IndexedItem, TermIndex, normalize_term, tokenize};
pub use model::{
    Batch, EdgeObservation, Entity, EntityObservation, Fragment, FragmentLog, FragmentTarget,
    GRAPH_FIELD_SEP, HighOrderEdge, HyperedgeObservation, LowOrderEdge, MAX_STRENGTH,
    MIN_STRENGTH, NEUTRAL_STRENGTH, Origin, PairKey, ParticipantSet, StrengthPolicy,
    StrengthVotes, UNKNOWN_TYPE, clean_name, normalize_name,
};
pub use query::{
    ContextPackage, EdgeContext, EntityContext, FAIL_RESPONSE, HyperedgeContext, QueryBudget,
    QueryKeywords, Retrieval, retrieve,
};
pub use snapshot::{FrozenGraph, SNAPSHOT_VERSION, SnapshotCell};
pub use store::{DatabaseInfo, DatabaseStore, GRAPH_FILE};
