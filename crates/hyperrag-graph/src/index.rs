//! Dual-level keyword index over a frozen hypergraph.
//!
//! - **specific** level: entity names and low-order edge keywords
//! - **thematic** level: high-order edge keywords and the thematic keywords
//!   attached to them
//!
//! Every indexed item carries a set of case-normalized phrases and the word
//! tokens of those phrases. A query keyword matches an item when its phrase
//! equals one of the item's phrases, or when every one of its tokens is among
//! the item's tokens.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::hypergraph::Hypergraph;
use crate::model::{PairKey, ParticipantSet};

/// Lower-case and collapse whitespace.
pub fn normalize_term(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Word tokens of a phrase: maximal alphanumeric runs, lower-cased.
pub fn tokenize(raw: &str) -> BTreeSet<String> {
    raw.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// A graph element an index entry points at.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexedItem {
    Entity(String),
    Edge(PairKey),
    Hyperedge(ParticipantSet),
}

/// One match with its ranking inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub item: IndexedItem,
    /// Number of query keywords matching the item.
    pub overlap: usize,
    /// Entity degree or edge strength.
    pub strength: u32,
}

impl Hit {
    /// Overlap desc, strength desc, key asc.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .overlap
            .cmp(&self.overlap)
            .then_with(|| other.strength.cmp(&self.strength))
            .then_with(|| self.item.cmp(&other.item))
    }
}

#[derive(Debug, Clone)]
struct Entry {
    item: IndexedItem,
    tokens: BTreeSet<String>,
    strength: u32,
}

/// Inverted index for one level.
#[derive(Debug, Clone, Default)]
pub struct TermIndex {
    entries: Vec<Entry>,
    by_phrase: HashMap<String, Vec<usize>>,
    by_token: HashMap<String, Vec<usize>>,
}

impl TermIndex {
    fn add<'a, I>(&mut self, item: IndexedItem, terms: I, strength: u32)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let phrases: BTreeSet<String> = terms
            .into_iter()
            .map(normalize_term)
            .filter(|p| !p.is_empty())
            .collect();
        if phrases.is_empty() {
            return;
        }
        let tokens: BTreeSet<String> = phrases.iter().flat_map(|p| tokenize(p)).collect();

        let idx = self.entries.len();
        for phrase in &phrases {
            self.by_phrase.entry(phrase.clone()).or_default().push(idx);
        }
        for token in &tokens {
            self.by_token.entry(token.clone()).or_default().push(idx);
        }
        self.entries.push(Entry {
            item,
            tokens,
            strength,
        });
    }

    /// Entries matched by one keyword.
    fn matches(&self, keyword: &str) -> BTreeSet<usize> {
        let phrase = normalize_term(keyword);
        let mut found: BTreeSet<usize> = self
            .by_phrase
            .get(&phrase)
            .into_iter()
            .flatten()
            .copied()
            .collect();

        let tokens = tokenize(&phrase);
        let mut token_iter = tokens.iter();
        if let Some(first) = token_iter.next()
            && let Some(candidates) = self.by_token.get(first)
        {
            found.extend(
                candidates
                    .iter()
                    .copied()
                    .filter(|&i| tokens.is_subset(&self.entries[i].tokens)),
            );
        }

        found
    }

    /// Ranked hits for a keyword list.
    pub fn lookup<S: AsRef<str>>(&self, keywords: &[S]) -> Vec<Hit> {
        let mut overlap: BTreeMap<usize, usize> = BTreeMap::new();
        let distinct: BTreeSet<String> = keywords
            .iter()
            .map(|k| normalize_term(k.as_ref()))
            .filter(|k| !k.is_empty())
            .collect();

        for keyword in &distinct {
            for idx in self.matches(keyword) {
                *overlap.entry(idx).or_default() += 1;
            }
        }

        let mut hits: Vec<Hit> = overlap
            .into_iter()
            .map(|(idx, overlap)| Hit {
                item: self.entries[idx].item.clone(),
                overlap,
                strength: self.entries[idx].strength,
            })
            .collect();
        hits.sort_by(Hit::rank_cmp);
        hits
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The two indices, rebuilt for every snapshot.
#[derive(Debug, Clone, Default)]
pub struct DualLevelIndex {
    pub specific: TermIndex,
    pub thematic: TermIndex,
}

impl DualLevelIndex {
    pub fn build(graph: &Hypergraph, degrees: &BTreeMap<String, usize>) -> Self {
        let mut specific = TermIndex::default();
        let mut thematic = TermIndex::default();

        for entity in graph.entities() {
            let degree = degrees.get(&entity.name).copied().unwrap_or(0);
            specific.add(
                IndexedItem::Entity(entity.name.clone()),
                [entity.name.as_str(), entity.display_name()],
                u32::try_from(degree).unwrap_or(u32::MAX),
            );
        }

        for edge in graph.edges() {
            specific.add(
                IndexedItem::Edge(edge.key.clone()),
                edge.keywords.iter().map(String::as_str),
                u32::from(edge.strength.value()),
            );
        }

        for edge in graph.hyperedges() {
            thematic.add(
                IndexedItem::Hyperedge(edge.participants.clone()),
                edge.keywords
                    .iter()
                    .chain(edge.thematic_keywords.iter())
                    .map(String::as_str),
                u32::from(edge.strength.value()),
            );
        }

        tracing::debug!(
            specific = specific.len(),
            thematic = thematic.len(),
            "Built dual-level index"
        );
        Self { specific, thematic }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Batch, EdgeObservation, EntityObservation, HyperedgeObservation, Origin};

    fn graph() -> Hypergraph {
        let mut batch = Batch::new("c1");
        for (i, name) in ["Web.config", "TouchPoint", "AD FS signing certificate"]
            .iter()
            .enumerate()
        {
            batch.entities.push(EntityObservation {
                name: name.to_string(),
                entity_type: "Artifact".into(),
                description: format!("about {name}"),
                properties: String::new(),
                origin: Origin::new("c1", i as u32),
            });
        }
        batch.edges.push(EdgeObservation {
            source: "Web.config".into(),
            target: "TouchPoint".into(),
            description: "configures".into(),
            keywords: vec!["CONFIGURES".into(), "xml settings".into()],
            strength: 10,
            origin: Origin::new("c1", 3),
        });
        batch.hyperedges.push(HyperedgeObservation {
            participants: vec![
                "TouchPoint".into(),
                "Web.config".into(),
                "AD FS signing certificate".into(),
            ],
            description: "trust setup".into(),
            generalization: "Certificate trust setup".into(),
            keywords: vec!["Configuration".into(), "Security".into()],
            strength: 9,
            origin: Origin::new("c1", 4),
        });
        batch.thematic_keywords = vec!["Certificate Trust".into()];

        let mut graph = Hypergraph::new();
        graph.merge_batch(&batch);
        graph
    }

    fn index() -> DualLevelIndex {
        let g = graph();
        DualLevelIndex::build(&g, &g.degrees())
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("AD FS signing-certificate"),
            ["ad", "certificate", "fs", "signing"]
                .into_iter()
                .map(String::from)
                .collect::<BTreeSet<String>>()
        );
        assert_eq!(normalize_term("  Web.Config  "), "web.config");
    }

    #[test]
    fn test_exact_phrase_match() {
        let hits = index().specific.lookup(&["web.config"]);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].item, IndexedItem::Entity("WEB.CONFIG".into()));
        assert_eq!(hits[0].strength, 2);
    }

    #[test]
    fn test_token_subset_match() {
        let hits = index().specific.lookup(&["signing certificate"]);
        assert_eq!(
            hits[0].item,
            IndexedItem::Entity("AD FS SIGNING CERTIFICATE".into())
        );

        let hits = index().specific.lookup(&["xml"]);
        assert!(matches!(hits[0].item, IndexedItem::Edge(_)));

        assert!(index().specific.lookup(&["certificate authority"]).is_empty());
    }

    #[test]
    fn test_thematic_level_uses_attached_keywords() {
        let hits = index().thematic.lookup(&["certificate trust", "security"]);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].overlap, 2);
        assert!(index().thematic.lookup(&["web.config"]).is_empty());
    }

    #[test]
    fn test_ranking_overlap_then_strength_then_key() {
        let idx = index();
        let hits = idx.specific.lookup(&["touchpoint", "web.config", "configures"]);
        // Edge matches one keyword with strength 10; entities match one with degree 2.
        assert_eq!(hits.len(), 3);
        assert!(matches!(hits[0].item, IndexedItem::Edge(_)));
        assert_eq!(hits[1].item, IndexedItem::Entity("TOUCHPOINT".into()));
        assert_eq!(hits[2].item, IndexedItem::Entity("WEB.CONFIG".into()));
    }

    #[test]
    fn test_duplicate_keywords_count_once() {
        let hits = index().specific.lookup(&["TouchPoint", "touchpoint "]);
        assert_eq!(hits[0].overlap, 1);
    }
}
