//! Hypergraph data model.
//!
//! Everything here is keyed so that merging is order-independent: fragments
//! carry the [`Origin`] they were observed at and lists stay sorted by it,
//! and per-observation data (type votes, strengths) is keyed by origin so a
//! repeated observation is recognised and ignored.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator joining multiple fragments in rendered output.
pub const GRAPH_FIELD_SEP: &str = "<SEP>";

/// Type assigned to entities whose type is outside the profile vocabulary.
pub const UNKNOWN_TYPE: &str = "UNKNOWN";

const QUOTE_ARTIFACTS: &[char] = &[
    '"', '\'', '`', '<', '>', '“', '”', '‘', '’', '「', '」', '『', '』',
];

// ─────────────────────────────────────────────────────────────────────────────
// Names
// ─────────────────────────────────────────────────────────────────────────────

/// Trim, strip enclosing quote artifacts, and collapse inner whitespace.
///
/// Case is preserved; this is the display form.
pub fn clean_name(raw: &str) -> String {
    let stripped = raw.trim().trim_matches(QUOTE_ARTIFACTS).trim();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Identity key of an entity: [`clean_name`] upper-cased.
pub fn normalize_name(raw: &str) -> String {
    clean_name(raw).to_uppercase()
}

// ─────────────────────────────────────────────────────────────────────────────
// Provenance
// ─────────────────────────────────────────────────────────────────────────────

/// Where an observation came from: chunk id plus position in that chunk's
/// record stream. Defines discovery order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Origin {
    pub chunk_id: String,
    pub seq: u32,
}

impl Origin {
    pub fn new(chunk_id: impl Into<String>, seq: u32) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            seq,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.chunk_id, self.seq)
    }
}

/// One piece of evidence text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub text: String,
    pub origin: Origin,
}

// ─────────────────────────────────────────────────────────────────────────────
// Fragment Log
// ─────────────────────────────────────────────────────────────────────────────

/// Ordered, duplicate-free list of evidence fragments with a summary marker.
///
/// `absorbed` remembers every text already folded into a summary, so
/// re-merging old evidence after summarization changes nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentLog {
    fragments: Vec<Fragment>,
    summarized: bool,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    absorbed: BTreeSet<String>,
}

impl FragmentLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fragment in origin order. Returns true if the log changed.
    ///
    /// A new distinct fragment clears the summary marker. A duplicate text
    /// keeps the earliest origin it was seen at.
    pub fn insert(&mut self, text: &str, origin: &Origin) -> bool {
        let text = text.trim();
        if text.is_empty() || self.absorbed.contains(text) {
            return false;
        }

        if let Some(pos) = self.fragments.iter().position(|f| f.text == text) {
            if *origin < self.fragments[pos].origin {
                let mut existing = self.fragments.remove(pos);
                existing.origin = origin.clone();
                self.insert_sorted(existing);
                return true;
            }
            return false;
        }

        self.insert_sorted(Fragment {
            text: text.to_string(),
            origin: origin.clone(),
        });
        self.summarized = false;
        true
    }

    fn insert_sorted(&mut self, fragment: Fragment) {
        let pos = self
            .fragments
            .partition_point(|f| (&f.origin, &f.text) < (&fragment.origin, &fragment.text));
        self.fragments.insert(pos, fragment);
    }

    /// Replace `replaced` texts with `summary`.
    ///
    /// The summary takes the earliest origin among the replaced fragments.
    /// Returns false when none of `replaced` is present any more (a stale
    /// result), leaving the log untouched.
    pub fn apply_summary(&mut self, replaced: &[String], summary: &str) -> bool {
        let summary = summary.trim();
        if summary.is_empty() {
            return false;
        }

        let mut first_origin: Option<Origin> = None;
        let mut removed = Vec::new();
        self.fragments.retain(|f| {
            if replaced.iter().any(|r| r == &f.text) {
                if first_origin.as_ref().is_none_or(|o| f.origin < *o) {
                    first_origin = Some(f.origin.clone());
                }
                removed.push(f.text.clone());
                false
            } else {
                true
            }
        });

        let Some(origin) = first_origin else {
            return false;
        };

        self.absorbed.extend(removed);
        self.absorbed.remove(summary);
        if !self.fragments.iter().any(|f| f.text == summary) {
            self.insert_sorted(Fragment {
                text: summary.to_string(),
                origin,
            });
        }
        self.summarized = self.fragments.len() == 1;
        true
    }

    /// Whether this log should be summarized at `threshold`.
    pub fn needs_summary(&self, threshold: usize) -> bool {
        !self.summarized && self.fragments.len() >= threshold
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn texts(&self) -> Vec<String> {
        self.fragments.iter().map(|f| f.text.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn is_summarized(&self) -> bool {
        self.summarized
    }

    /// Texts folded into a summary so far.
    pub fn absorbed(&self) -> &BTreeSet<String> {
        &self.absorbed
    }

    /// All fragments joined with [`GRAPH_FIELD_SEP`].
    pub fn joined(&self) -> String {
        self.fragments
            .iter()
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join(GRAPH_FIELD_SEP)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Keys
// ─────────────────────────────────────────────────────────────────────────────

/// Unordered pair of normalized entity names, stored smaller-first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairKey {
    a: String,
    b: String,
}

impl PairKey {
    /// `None` for a self-loop.
    pub fn new(x: impl Into<String>, y: impl Into<String>) -> Option<Self> {
        let (x, y) = (x.into(), y.into());
        match x.cmp(&y) {
            std::cmp::Ordering::Less => Some(Self { a: x, b: y }),
            std::cmp::Ordering::Greater => Some(Self { a: y, b: x }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn first(&self) -> &str {
        &self.a
    }

    pub fn second(&self) -> &str {
        &self.b
    }

    pub fn contains(&self, name: &str) -> bool {
        self.a == name || self.b == name
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.a, self.b)
    }
}

/// Sorted, duplicate-free set of at least two normalized entity names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ParticipantSet(Vec<String>);

impl ParticipantSet {
    /// `None` when fewer than two distinct names remain.
    pub fn new<I, S>(names: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        (set.len() >= 2).then(|| Self(set.into_iter().collect()))
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.binary_search_by(|n| n.as_str().cmp(name)).is_ok()
    }
}

impl TryFrom<Vec<String>> for ParticipantSet {
    type Error = String;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        let count = names.len();
        Self::new(names).ok_or_else(|| format!("participant set needs 2 names, got {count}"))
    }
}

impl From<ParticipantSet> for Vec<String> {
    fn from(set: ParticipantSet) -> Self {
        set.0
    }
}

impl fmt::Display for ParticipantSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.0.join(", "))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Strength
// ─────────────────────────────────────────────────────────────────────────────

/// Lowest and highest edge strength.
pub const MIN_STRENGTH: u8 = 1;
pub const MAX_STRENGTH: u8 = 10;
/// Strength used when the model gives none or an unreadable one.
pub const NEUTRAL_STRENGTH: u8 = 5;

/// How repeated observations of one edge combine their strengths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrengthPolicy {
    #[default]
    Max,
    /// Rounded arithmetic mean.
    Mean,
}

impl StrengthPolicy {
    fn combine(&self, votes: &BTreeSet<(Origin, u8)>) -> u8 {
        let values = votes.iter().map(|(_, s)| u32::from(*s));
        let combined = match self {
            StrengthPolicy::Max => values.max().unwrap_or(u32::from(NEUTRAL_STRENGTH)),
            StrengthPolicy::Mean => {
                let (sum, n) = values.fold((0u32, 0u32), |(s, n), v| (s + v, n + 1));
                if n == 0 {
                    u32::from(NEUTRAL_STRENGTH)
                } else {
                    (sum + n / 2) / n
                }
            }
        };
        combined.clamp(u32::from(MIN_STRENGTH), u32::from(MAX_STRENGTH)) as u8
    }
}

/// Strength observations of one edge, keyed by origin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrengthVotes {
    votes: BTreeSet<(Origin, u8)>,
    value: u8,
}

impl StrengthVotes {
    /// Record one observation; returns true if the combined value or the
    /// vote set changed.
    pub fn record(&mut self, origin: &Origin, strength: u8, policy: StrengthPolicy) -> bool {
        let strength = strength.clamp(MIN_STRENGTH, MAX_STRENGTH);
        if self.votes.iter().any(|(o, _)| o == origin) {
            return false;
        }
        self.votes.insert((origin.clone(), strength));
        self.value = policy.combine(&self.votes);
        true
    }

    pub fn recompute(&mut self, policy: StrengthPolicy) {
        self.value = policy.combine(&self.votes);
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    pub fn observations(&self) -> usize {
        self.votes.len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Entities and Edges
// ─────────────────────────────────────────────────────────────────────────────

/// A named thing in the hypergraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Normalized identity key.
    pub name: String,
    /// Surface form at the earliest origin.
    pub display: Fragment,
    /// Majority type.
    pub entity_type: String,
    /// Origins at which each type was observed.
    pub type_votes: BTreeMap<String, BTreeSet<Origin>>,
    pub descriptions: FragmentLog,
    pub properties: FragmentLog,
    pub source_ids: BTreeSet<String>,
}

impl Entity {
    pub(crate) fn new(name: String, display: &str, origin: &Origin) -> Self {
        Self {
            name,
            display: Fragment {
                text: display.to_string(),
                origin: origin.clone(),
            },
            entity_type: UNKNOWN_TYPE.to_string(),
            type_votes: BTreeMap::new(),
            descriptions: FragmentLog::new(),
            properties: FragmentLog::new(),
            source_ids: BTreeSet::new(),
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display.text
    }

    /// Observations disagreeing with the majority type.
    pub fn type_conflicts(&self) -> usize {
        let total: usize = self.type_votes.values().map(BTreeSet::len).sum();
        let winner = self
            .type_votes
            .get(&self.entity_type)
            .map_or(0, BTreeSet::len);
        total - winner
    }

    /// Record a type observation and recompute the majority.
    ///
    /// Ties go to the lexicographically smallest type.
    pub(crate) fn vote_type(&mut self, entity_type: &str, origin: &Origin) -> bool {
        let entity_type = entity_type.trim();
        let entity_type = if entity_type.is_empty() {
            UNKNOWN_TYPE
        } else {
            entity_type
        };

        let changed = self
            .type_votes
            .entry(entity_type.to_string())
            .or_default()
            .insert(origin.clone());

        if changed {
            let mut best: Option<(&String, usize)> = None;
            for (ty, origins) in &self.type_votes {
                if best.is_none_or(|(_, n)| origins.len() > n) {
                    best = Some((ty, origins.len()));
                }
            }
            if let Some((ty, _)) = best {
                self.entity_type = ty.clone();
            }
        }
        changed
    }
}

/// Pairwise relationship between two entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowOrderEdge {
    pub key: PairKey,
    pub descriptions: FragmentLog,
    pub keywords: BTreeSet<String>,
    pub strength: StrengthVotes,
    pub source_ids: BTreeSet<String>,
}

impl LowOrderEdge {
    pub(crate) fn new(key: PairKey) -> Self {
        Self {
            key,
            descriptions: FragmentLog::new(),
            keywords: BTreeSet::new(),
            strength: StrengthVotes::default(),
            source_ids: BTreeSet::new(),
        }
    }
}

/// Relationship among two or more entities taking part in one scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighOrderEdge {
    pub participants: ParticipantSet,
    pub descriptions: FragmentLog,
    /// Latest non-empty one-line summary.
    pub generalization: Option<Fragment>,
    pub keywords: BTreeSet<String>,
    /// High-level keywords of the batches this edge was extracted from.
    pub thematic_keywords: BTreeSet<String>,
    pub strength: StrengthVotes,
    pub source_ids: BTreeSet<String>,
}

impl HighOrderEdge {
    pub(crate) fn new(participants: ParticipantSet) -> Self {
        Self {
            participants,
            descriptions: FragmentLog::new(),
            generalization: None,
            keywords: BTreeSet::new(),
            thematic_keywords: BTreeSet::new(),
            strength: StrengthVotes::default(),
            source_ids: BTreeSet::new(),
        }
    }

    pub fn generalization_text(&self) -> &str {
        self.generalization.as_ref().map_or("", |g| g.text.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Observations (merge input)
// ─────────────────────────────────────────────────────────────────────────────

/// An entity as read from completion output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityObservation {
    pub name: String,
    pub entity_type: String,
    pub description: String,
    pub properties: String,
    pub origin: Origin,
}

/// A pairwise relationship as read from completion output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeObservation {
    pub source: String,
    pub target: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub strength: u8,
    pub origin: Origin,
}

/// An n-ary relationship as read from completion output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HyperedgeObservation {
    pub participants: Vec<String>,
    pub description: String,
    pub generalization: String,
    pub keywords: Vec<String>,
    pub strength: u8,
    pub origin: Origin,
}

/// Everything extracted from one chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    pub chunk_id: String,
    pub entities: Vec<EntityObservation>,
    pub edges: Vec<EdgeObservation>,
    pub hyperedges: Vec<HyperedgeObservation>,
    /// High-level keywords, attached to this batch's high-order edges.
    pub thematic_keywords: Vec<String>,
}

impl Batch {
    pub fn new(chunk_id: impl Into<String>) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
            && self.edges.is_empty()
            && self.hyperedges.is_empty()
            && self.thematic_keywords.is_empty()
    }
}

/// Which fragment list of which graph element.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FragmentTarget {
    EntityDescription(String),
    EntityProperties(String),
    EdgeDescription(PairKey),
    HyperedgeDescription(ParticipantSet),
}

impl fmt::Display for FragmentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FragmentTarget::EntityDescription(name) => write!(f, "entity {name} description"),
            FragmentTarget::EntityProperties(name) => write!(f, "entity {name} properties"),
            FragmentTarget::EdgeDescription(key) => write!(f, "edge {key} description"),
            FragmentTarget::HyperedgeDescription(set) => write!(f, "hyperedge {set} description"),
        }
    }
}
