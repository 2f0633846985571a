//! The mutable hypergraph and its merge rules.
//!
//! Owned by exactly one writer during ingestion. Merging a [`Batch`] adds
//! entities first, then low-order and high-order edges; edges naming an
//! entity the graph does not know yet come back as [`PendingRecord`]s for the
//! caller to retry once later.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{GraphError, Result};
use crate::model::{
    Batch, EdgeObservation, Entity, EntityObservation, Fragment, FragmentLog, FragmentTarget,
    HighOrderEdge, HyperedgeObservation, LowOrderEdge, PairKey, ParticipantSet, StrengthPolicy,
    clean_name, normalize_name,
};

// ─────────────────────────────────────────────────────────────────────────────
// Merge bookkeeping
// ─────────────────────────────────────────────────────────────────────────────

/// What a single merge did to the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Created,
    Updated,
    Unchanged,
}

impl MergeOutcome {
    fn from_flags(created: bool, changed: bool) -> Self {
        if created {
            MergeOutcome::Created
        } else if changed {
            MergeOutcome::Updated
        } else {
            MergeOutcome::Unchanged
        }
    }
}

/// Merge counters, accumulated per batch and per run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    pub entities_created: usize,
    pub entities_merged: usize,
    pub edges_created: usize,
    pub edges_merged: usize,
    pub hyperedges_created: usize,
    pub hyperedges_merged: usize,
    /// Observations that changed nothing (already merged).
    pub unchanged: usize,
    /// Self-loops, empty names, and too-small participant sets.
    pub rejected: usize,
}

impl MergeStats {
    fn count(&mut self, kind: ElementKind, outcome: MergeOutcome) {
        let (created, merged) = match kind {
            ElementKind::Entity => (&mut self.entities_created, &mut self.entities_merged),
            ElementKind::Edge => (&mut self.edges_created, &mut self.edges_merged),
            ElementKind::Hyperedge => (&mut self.hyperedges_created, &mut self.hyperedges_merged),
        };
        match outcome {
            MergeOutcome::Created => *created += 1,
            MergeOutcome::Updated => *merged += 1,
            MergeOutcome::Unchanged => self.unchanged += 1,
        }
    }

    /// Add another set of counters onto this one.
    pub fn absorb(&mut self, other: &MergeStats) {
        self.entities_created += other.entities_created;
        self.entities_merged += other.entities_merged;
        self.edges_created += other.edges_created;
        self.edges_merged += other.edges_merged;
        self.hyperedges_created += other.hyperedges_created;
        self.hyperedges_merged += other.hyperedges_merged;
        self.unchanged += other.unchanged;
        self.rejected += other.rejected;
    }
}

#[derive(Clone, Copy)]
enum ElementKind {
    Entity,
    Edge,
    Hyperedge,
}

/// An edge whose endpoints were not all known when it was merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingRecord {
    Edge(EdgeObservation),
    Hyperedge {
        observation: HyperedgeObservation,
        thematic_keywords: Vec<String>,
    },
}

impl fmt::Display for PendingRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingRecord::Edge(e) => write!(f, "edge ({}, {}) from {}", e.source, e.target, e.origin),
            PendingRecord::Hyperedge { observation, .. } => write!(
                f,
                "hyperedge {{{}}} from {}",
                observation.participants.join(", "),
                observation.origin
            ),
        }
    }
}

/// Result of merging one batch.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub stats: MergeStats,
    /// Edges with unknown endpoints, to be retried once.
    pub pending: Vec<PendingRecord>,
    /// Fragment lists created or changed by this batch.
    pub touched: BTreeSet<FragmentTarget>,
}

/// Result of retrying pending records.
#[derive(Debug, Clone, Default)]
pub struct PendingOutcome {
    pub stats: MergeStats,
    /// Records still unresolved; these are dropped.
    pub dropped: Vec<PendingRecord>,
    pub touched: BTreeSet<FragmentTarget>,
}

/// Size and quality counters of a graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub entities: usize,
    pub edges: usize,
    pub hyperedges: usize,
    /// Type observations disagreeing with their entity's majority type.
    pub type_conflicts: usize,
    /// Fragment lists currently carrying the summary marker.
    pub summarized_lists: usize,
    /// Distinct chunks behind any entity, edge, hyperedge, or thematic keyword.
    pub chunks: usize,
}

impl fmt::Display for GraphStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entities, {} edges, {} hyperedges from {} chunks ({} type conflicts, {} summarized)",
            self.entities,
            self.edges,
            self.hyperedges,
            self.chunks,
            self.type_conflicts,
            self.summarized_lists
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Hypergraph
// ─────────────────────────────────────────────────────────────────────────────

/// Entities, pairwise edges, and n-ary edges keyed by their identities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "GraphRecords", into = "GraphRecords")]
pub struct Hypergraph {
    entities: BTreeMap<String, Entity>,
    edges: BTreeMap<PairKey, LowOrderEdge>,
    hyperedges: BTreeMap<ParticipantSet, HighOrderEdge>,
    chunk_keywords: BTreeMap<String, BTreeSet<String>>,
    strength_policy: StrengthPolicy,
}

impl Hypergraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strength_policy(policy: StrengthPolicy) -> Self {
        Self {
            strength_policy: policy,
            ..Self::default()
        }
    }

    pub fn strength_policy(&self) -> StrengthPolicy {
        self.strength_policy
    }

    /// Switch policy and recompute every edge strength.
    pub fn set_strength_policy(&mut self, policy: StrengthPolicy) {
        self.strength_policy = policy;
        for edge in self.edges.values_mut() {
            edge.strength.recompute(policy);
        }
        for edge in self.hyperedges.values_mut() {
            edge.strength.recompute(policy);
        }
    }

    // ── Merging ──────────────────────────────────────────────────────────────

    /// Merge everything extracted from one chunk.
    pub fn merge_batch(&mut self, batch: &Batch) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        let thematic: Vec<String> = batch
            .thematic_keywords
            .iter()
            .filter_map(|k| clean_keyword(k))
            .collect();
        if !thematic.is_empty() {
            self.chunk_keywords
                .entry(batch.chunk_id.clone())
                .or_default()
                .extend(thematic.iter().cloned());
        }

        for obs in &batch.entities {
            match self.merge_entity(obs) {
                Ok(result) => {
                    outcome.stats.count(ElementKind::Entity, result);
                    if result != MergeOutcome::Unchanged {
                        let name = normalize_name(&obs.name);
                        outcome
                            .touched
                            .insert(FragmentTarget::EntityDescription(name.clone()));
                        outcome.touched.insert(FragmentTarget::EntityProperties(name));
                    }
                }
                Err(e) => {
                    outcome.stats.rejected += 1;
                    debug!(chunk = %batch.chunk_id, error = %e, "Rejected entity");
                }
            }
        }

        for obs in &batch.edges {
            self.merge_pending_or_collect(PendingRecord::Edge(obs.clone()), &mut outcome);
        }

        for obs in &batch.hyperedges {
            self.merge_pending_or_collect(
                PendingRecord::Hyperedge {
                    observation: obs.clone(),
                    thematic_keywords: thematic.clone(),
                },
                &mut outcome,
            );
        }

        outcome
    }

    fn merge_pending_or_collect(&mut self, record: PendingRecord, outcome: &mut BatchOutcome) {
        match self.merge_record(&record) {
            Ok((kind, result, target)) => {
                outcome.stats.count(kind, result);
                if result != MergeOutcome::Unchanged {
                    outcome.touched.insert(target);
                }
            }
            Err(GraphError::DanglingReference { .. }) => outcome.pending.push(record),
            Err(e) => {
                outcome.stats.rejected += 1;
                debug!(record = %record, error = %e, "Rejected edge");
            }
        }
    }

    /// Retry records that were pending; whatever still dangles is dropped.
    pub fn retry_pending(&mut self, pending: Vec<PendingRecord>) -> PendingOutcome {
        let mut outcome = PendingOutcome::default();

        for record in pending {
            match self.merge_record(&record) {
                Ok((kind, result, target)) => {
                    outcome.stats.count(kind, result);
                    if result != MergeOutcome::Unchanged {
                        outcome.touched.insert(target);
                    }
                }
                Err(e) => {
                    warn!(record = %record, error = %e, "Dropping unresolved record");
                    outcome.dropped.push(record);
                }
            }
        }

        outcome
    }

    fn merge_record(
        &mut self,
        record: &PendingRecord,
    ) -> Result<(ElementKind, MergeOutcome, FragmentTarget)> {
        match record {
            PendingRecord::Edge(obs) => {
                let (key, result) = self.merge_edge(obs)?;
                Ok((ElementKind::Edge, result, FragmentTarget::EdgeDescription(key)))
            }
            PendingRecord::Hyperedge {
                observation,
                thematic_keywords,
            } => {
                let (set, result) = self.merge_hyperedge(observation, thematic_keywords)?;
                Ok((
                    ElementKind::Hyperedge,
                    result,
                    FragmentTarget::HyperedgeDescription(set),
                ))
            }
        }
    }

    /// Merge one entity observation.
    pub fn merge_entity(&mut self, obs: &EntityObservation) -> Result<MergeOutcome> {
        let name = normalize_name(&obs.name);
        if name.is_empty() {
            return Err(GraphError::EmptyName);
        }
        let display = clean_name(&obs.name);

        let created = !self.entities.contains_key(&name);
        let entity = self
            .entities
            .entry(name.clone())
            .or_insert_with(|| Entity::new(name, &display, &obs.origin));

        let mut changed = false;
        if obs.origin < entity.display.origin {
            entity.display = Fragment {
                text: display,
                origin: obs.origin.clone(),
            };
            changed = true;
        }
        changed |= entity.vote_type(&obs.entity_type, &obs.origin);
        changed |= entity.descriptions.insert(&obs.description, &obs.origin);
        changed |= entity.properties.insert(&obs.properties, &obs.origin);
        changed |= entity.source_ids.insert(obs.origin.chunk_id.clone());

        Ok(MergeOutcome::from_flags(created, changed))
    }

    /// Merge one low-order edge observation. Both endpoints must exist.
    pub fn merge_edge(&mut self, obs: &EdgeObservation) -> Result<(PairKey, MergeOutcome)> {
        let source = normalize_name(&obs.source);
        let target = normalize_name(&obs.target);
        if source.is_empty() || target.is_empty() {
            return Err(GraphError::EmptyName);
        }
        let key = PairKey::new(source.clone(), target).ok_or(GraphError::SelfLoop(source))?;

        for name in [key.first(), key.second()] {
            if !self.entities.contains_key(name) {
                return Err(GraphError::DanglingReference {
                    edge: key.to_string(),
                    missing: name.to_string(),
                });
            }
        }

        let policy = self.strength_policy;
        let created = !self.edges.contains_key(&key);
        let edge = self
            .edges
            .entry(key.clone())
            .or_insert_with(|| LowOrderEdge::new(key.clone()));

        let mut changed = false;
        changed |= edge.descriptions.insert(&obs.description, &obs.origin);
        for keyword in obs.keywords.iter().filter_map(|k| clean_keyword(k)) {
            changed |= edge.keywords.insert(keyword);
        }
        changed |= edge.strength.record(&obs.origin, obs.strength, policy);
        changed |= edge.source_ids.insert(obs.origin.chunk_id.clone());

        Ok((key, MergeOutcome::from_flags(created, changed)))
    }

    /// Merge one high-order edge observation. Every participant must exist.
    pub fn merge_hyperedge(
        &mut self,
        obs: &HyperedgeObservation,
        thematic_keywords: &[String],
    ) -> Result<(ParticipantSet, MergeOutcome)> {
        let names: Vec<String> = obs
            .participants
            .iter()
            .map(|p| normalize_name(p))
            .filter(|n| !n.is_empty())
            .collect();
        let distinct = names.iter().collect::<BTreeSet<_>>().len();
        let set = ParticipantSet::new(names).ok_or(GraphError::TooFewParticipants(distinct))?;

        if let Some(missing) = set.names().iter().find(|n| !self.entities.contains_key(*n)) {
            return Err(GraphError::DanglingReference {
                edge: set.to_string(),
                missing: missing.clone(),
            });
        }

        let policy = self.strength_policy;
        let created = !self.hyperedges.contains_key(&set);
        let edge = self
            .hyperedges
            .entry(set.clone())
            .or_insert_with(|| HighOrderEdge::new(set.clone()));

        let mut changed = false;
        changed |= edge.descriptions.insert(&obs.description, &obs.origin);

        let generalization = obs.generalization.trim();
        if !generalization.is_empty()
            && edge
                .generalization
                .as_ref()
                .is_none_or(|g| obs.origin > g.origin)
        {
            edge.generalization = Some(Fragment {
                text: generalization.to_string(),
                origin: obs.origin.clone(),
            });
            changed = true;
        }

        for keyword in obs.keywords.iter().filter_map(|k| clean_keyword(k)) {
            changed |= edge.keywords.insert(keyword);
        }
        for keyword in thematic_keywords {
            changed |= edge.thematic_keywords.insert(keyword.clone());
        }
        changed |= edge.strength.record(&obs.origin, obs.strength, policy);
        changed |= edge.source_ids.insert(obs.origin.chunk_id.clone());

        Ok((set, MergeOutcome::from_flags(created, changed)))
    }

    // ── Summaries ────────────────────────────────────────────────────────────

    pub fn fragment_log(&self, target: &FragmentTarget) -> Option<&FragmentLog> {
        match target {
            FragmentTarget::EntityDescription(n) => self.entities.get(n).map(|e| &e.descriptions),
            FragmentTarget::EntityProperties(n) => self.entities.get(n).map(|e| &e.properties),
            FragmentTarget::EdgeDescription(k) => self.edges.get(k).map(|e| &e.descriptions),
            FragmentTarget::HyperedgeDescription(s) => {
                self.hyperedges.get(s).map(|e| &e.descriptions)
            }
        }
    }

    fn fragment_log_mut(&mut self, target: &FragmentTarget) -> Option<&mut FragmentLog> {
        match target {
            FragmentTarget::EntityDescription(n) => {
                self.entities.get_mut(n).map(|e| &mut e.descriptions)
            }
            FragmentTarget::EntityProperties(n) => {
                self.entities.get_mut(n).map(|e| &mut e.properties)
            }
            FragmentTarget::EdgeDescription(k) => self.edges.get_mut(k).map(|e| &mut e.descriptions),
            FragmentTarget::HyperedgeDescription(s) => {
                self.hyperedges.get_mut(s).map(|e| &mut e.descriptions)
            }
        }
    }

    /// Targets among `touched` whose fragment list reached `threshold`.
    pub fn summary_candidates<'a, I>(&self, touched: I, threshold: usize) -> Vec<FragmentTarget>
    where
        I: IntoIterator<Item = &'a FragmentTarget>,
    {
        touched
            .into_iter()
            .filter(|t| {
                self.fragment_log(t)
                    .is_some_and(|log| log.needs_summary(threshold))
            })
            .cloned()
            .collect()
    }

    /// Replace the summarized fragments of `target` with `summary`.
    ///
    /// Returns false when the target or its fragments no longer exist.
    pub fn apply_summary(&mut self, target: &FragmentTarget, replaced: &[String], summary: &str) -> bool {
        self.fragment_log_mut(target)
            .is_some_and(|log| log.apply_summary(replaced, summary))
    }

    // ── Reading ──────────────────────────────────────────────────────────────

    /// Look up by normalized key.
    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    /// Look up by any surface form.
    pub fn find_entity(&self, raw: &str) -> Option<&Entity> {
        self.entities.get(&normalize_name(raw))
    }

    pub fn edge(&self, key: &PairKey) -> Option<&LowOrderEdge> {
        self.edges.get(key)
    }

    pub fn hyperedge(&self, set: &ParticipantSet) -> Option<&HighOrderEdge> {
        self.hyperedges.get(set)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &LowOrderEdge> {
        self.edges.values()
    }

    pub fn hyperedges(&self) -> impl Iterator<Item = &HighOrderEdge> {
        self.hyperedges.values()
    }

    /// High-level keywords per chunk id.
    pub fn chunk_keywords(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.chunk_keywords
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Incident low- and high-order edge count per entity.
    pub fn degrees(&self) -> BTreeMap<String, usize> {
        let mut degrees: BTreeMap<String, usize> =
            self.entities.keys().map(|k| (k.clone(), 0)).collect();
        let endpoints = self
            .edges
            .keys()
            .flat_map(|k| [k.first(), k.second()])
            .chain(self.hyperedges.keys().flat_map(|s| s.names().iter().map(String::as_str)));
        for name in endpoints {
            if let Some(d) = degrees.get_mut(name) {
                *d += 1;
            }
        }
        degrees
    }

    pub fn stats(&self) -> GraphStats {
        let summarized_lists = self
            .entities
            .values()
            .flat_map(|e| [&e.descriptions, &e.properties])
            .chain(self.edges.values().map(|e| &e.descriptions))
            .chain(self.hyperedges.values().map(|e| &e.descriptions))
            .filter(|log| log.is_summarized())
            .count();

        let chunks = self
            .entities
            .values()
            .flat_map(|e| e.source_ids.iter())
            .chain(self.edges.values().flat_map(|e| e.source_ids.iter()))
            .chain(self.hyperedges.values().flat_map(|e| e.source_ids.iter()))
            .chain(self.chunk_keywords.keys())
            .collect::<BTreeSet<_>>()
            .len();

        GraphStats {
            entities: self.entities.len(),
            edges: self.edges.len(),
            hyperedges: self.hyperedges.len(),
            type_conflicts: self.entities.values().map(Entity::type_conflicts).sum(),
            summarized_lists,
            chunks,
        }
    }
}

/// Trim a keyword, strip quote artifacts, collapse whitespace.
fn clean_keyword(raw: &str) -> Option<String> {
    let cleaned = clean_name(raw);
    (!cleaned.is_empty()).then_some(cleaned)
}

// ─────────────────────────────────────────────────────────────────────────────
// Serialized form
// ─────────────────────────────────────────────────────────────────────────────

/// Flat lists; map keys are recomputed from each element on load.
#[derive(Serialize, Deserialize)]
struct GraphRecords {
    #[serde(default)]
    strength_policy: StrengthPolicy,
    entities: Vec<Entity>,
    edges: Vec<LowOrderEdge>,
    hyperedges: Vec<HighOrderEdge>,
    #[serde(default)]
    chunk_keywords: BTreeMap<String, BTreeSet<String>>,
}

impl From<GraphRecords> for Hypergraph {
    fn from(records: GraphRecords) -> Self {
        Self {
            entities: records
                .entities
                .into_iter()
                .map(|e| (e.name.clone(), e))
                .collect(),
            edges: records
                .edges
                .into_iter()
                .map(|e| (e.key.clone(), e))
                .collect(),
            hyperedges: records
                .hyperedges
                .into_iter()
                .map(|e| (e.participants.clone(), e))
                .collect(),
            chunk_keywords: records.chunk_keywords,
            strength_policy: records.strength_policy,
        }
    }
}

impl From<Hypergraph> for GraphRecords {
    fn from(graph: Hypergraph) -> Self {
        Self {
            strength_policy: graph.strength_policy,
            entities: graph.entities.into_values().collect(),
            edges: graph.edges.into_values().collect(),
            hyperedges: graph.hyperedges.into_values().collect(),
            chunk_keywords: graph.chunk_keywords,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
