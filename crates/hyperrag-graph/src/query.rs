//! Keyword retrieval over a frozen snapshot.
//!
//! Low-level keywords go to the specific-term index, high-level keywords to the
//! thematic index. Hits are expanded into a [`ContextPackage`]: edge endpoints
//! and hyperedge participants join the entity list, everything is ranked and
//! then cut to a [`QueryBudget`].

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::index::{Hit, IndexedItem};
use crate::snapshot::FrozenGraph;

/// Answer returned when retrieval finds nothing.
pub const FAIL_RESPONSE: &str = "Sorry, I'm not able to provide an answer to that question.";

// ─────────────────────────────────────────────────────────────────────────────
// Inputs
// ─────────────────────────────────────────────────────────────────────────────

/// Keywords extracted from a user query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryKeywords {
    /// Broad themes, matched against the thematic index.
    #[serde(default)]
    pub high_level_keywords: Vec<String>,
    /// Concrete names and terms, matched against the specific-term index.
    #[serde(default)]
    pub low_level_keywords: Vec<String>,
}

impl QueryKeywords {
    pub fn is_empty(&self) -> bool {
        self.high_level_keywords.iter().all(|k| k.trim().is_empty())
            && self.low_level_keywords.iter().all(|k| k.trim().is_empty())
    }
}

/// Limits on the size of a context package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryBudget {
    pub max_entities: usize,
    pub max_edges: usize,
    pub max_hyperedges: usize,
    /// Cap on the rendered context, in characters.
    pub max_context_chars: Option<usize>,
}

impl Default for QueryBudget {
    fn default() -> Self {
        Self {
            max_entities: 40,
            max_edges: 40,
            max_hyperedges: 20,
            max_context_chars: Some(12_000),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Context package
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityContext {
    pub name: String,
    pub display_name: String,
    pub entity_type: String,
    pub description: String,
    pub properties: String,
    pub degree: usize,
    pub overlap: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeContext {
    pub source: String,
    pub target: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub strength: u8,
    pub overlap: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HyperedgeContext {
    pub participants: Vec<String>,
    pub description: String,
    pub generalization: String,
    pub keywords: Vec<String>,
    pub strength: u8,
    pub overlap: usize,
}

/// Ranked graph elements relevant to a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextPackage {
    pub entities: Vec<EntityContext>,
    pub edges: Vec<EdgeContext>,
    pub hyperedges: Vec<HyperedgeContext>,
}

impl ContextPackage {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.edges.is_empty() && self.hyperedges.is_empty()
    }

    /// Render as CSV tables for the response prompt.
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str("-----Entities-----\n```csv\n");
        push_row(&mut out, ["id", "entity", "type", "description", "properties", "rank"]);
        for (i, e) in self.entities.iter().enumerate() {
            push_row(
                &mut out,
                [
                    &i.to_string(),
                    &e.display_name,
                    &e.entity_type,
                    &e.description,
                    &e.properties,
                    &e.degree.to_string(),
                ],
            );
        }
        out.push_str("```\n");

        out.push_str("-----Relationships-----\n```csv\n");
        push_row(&mut out, ["id", "source", "target", "description", "keywords", "weight"]);
        for (i, e) in self.edges.iter().enumerate() {
            push_row(
                &mut out,
                [
                    &i.to_string(),
                    &e.source,
                    &e.target,
                    &e.description,
                    &e.keywords.join(", "),
                    &e.strength.to_string(),
                ],
            );
        }
        out.push_str("```\n");

        out.push_str("-----Hyperedges-----\n```csv\n");
        push_row(
            &mut out,
            ["id", "entities", "description", "generalization", "keywords", "weight"],
        );
        for (i, h) in self.hyperedges.iter().enumerate() {
            push_row(
                &mut out,
                [
                    &i.to_string(),
                    &h.participants.join(", "),
                    &h.description,
                    &h.generalization,
                    &h.keywords.join(", "),
                    &h.strength.to_string(),
                ],
            );
        }
        out.push_str("```\n");

        out
    }

    fn rendered_chars(&self) -> usize {
        self.render().chars().count()
    }

    /// Drop the lowest-ranked item of the longest list.
    ///
    /// Ties prefer hyperedges, then edges, then entities. Returns false when
    /// nothing is left to drop.
    fn drop_one(&mut self) -> bool {
        let lens = [self.hyperedges.len(), self.edges.len(), self.entities.len()];
        let longest = lens.iter().copied().max().unwrap_or(0);
        if longest == 0 {
            return false;
        }
        if self.hyperedges.len() == longest {
            self.hyperedges.pop();
        } else if self.edges.len() == longest {
            self.edges.pop();
        } else {
            self.entities.pop();
        }
        true
    }
}

fn push_row<I, S>(out: &mut String, fields: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let row: Vec<String> = fields
        .into_iter()
        .map(|f| format!("\"{}\"", f.as_ref().replace('"', "\"\"")))
        .collect();
    let _ = writeln!(out, "{}", row.join(","));
}

/// Outcome of a retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retrieval {
    Context(ContextPackage),
    /// Neither index matched; callers answer with [`FAIL_RESPONSE`].
    NoRelevantData,
}

impl Retrieval {
    pub fn context(&self) -> Option<&ContextPackage> {
        match self {
            Self::Context(ctx) => Some(ctx),
            Self::NoRelevantData => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Retrieval
// ─────────────────────────────────────────────────────────────────────────────

/// Look up keywords in a snapshot and assemble a budgeted context package.
pub fn retrieve(graph: &FrozenGraph, keywords: &QueryKeywords, budget: &QueryBudget) -> Retrieval {
    let specific = graph.index().specific.lookup(&keywords.low_level_keywords);
    let thematic = graph.index().thematic.lookup(&keywords.high_level_keywords);

    debug!(
        specific = specific.len(),
        thematic = thematic.len(),
        "Keyword lookup"
    );

    if specific.is_empty() && thematic.is_empty() {
        return Retrieval::NoRelevantData;
    }

    let mut package = assemble(graph, &specific, &thematic);

    package.entities.truncate(budget.max_entities);
    package.edges.truncate(budget.max_edges);
    package.hyperedges.truncate(budget.max_hyperedges);

    if let Some(cap) = budget.max_context_chars {
        while package.rendered_chars() > cap {
            if !package.drop_one() {
                break;
            }
        }
    }

    if package.is_empty() {
        debug!("Context budget left nothing to return");
        return Retrieval::NoRelevantData;
    }

    debug!(
        entities = package.entities.len(),
        edges = package.edges.len(),
        hyperedges = package.hyperedges.len(),
        "Assembled context"
    );
    Retrieval::Context(package)
}

fn assemble(graph: &FrozenGraph, specific: &[Hit], thematic: &[Hit]) -> ContextPackage {
    let hg = graph.graph();
    let display = |name: &str| {
        hg.entity(name)
            .map_or_else(|| name.to_string(), |e| e.display_name().to_string())
    };

    // Best overlap seen per entity, from direct hits or via an edge.
    let mut entity_overlap: BTreeMap<String, usize> = BTreeMap::new();
    let mut note = |name: &str, overlap: usize| {
        let slot = entity_overlap.entry(name.to_string()).or_default();
        *slot = (*slot).max(overlap);
    };

    let mut edges = Vec::new();
    let mut hyperedges = Vec::new();

    for hit in specific {
        match &hit.item {
            IndexedItem::Entity(name) => note(name, hit.overlap),
            IndexedItem::Edge(key) => {
                let Some(edge) = hg.edge(key) else { continue };
                note(key.first(), hit.overlap);
                note(key.second(), hit.overlap);
                edges.push(EdgeContext {
                    source: display(key.first()),
                    target: display(key.second()),
                    description: edge.descriptions.joined(),
                    keywords: edge.keywords.iter().cloned().collect(),
                    strength: edge.strength.value(),
                    overlap: hit.overlap,
                });
            }
            IndexedItem::Hyperedge(_) => {}
        }
    }

    for hit in thematic {
        let IndexedItem::Hyperedge(set) = &hit.item else {
            continue;
        };
        let Some(edge) = hg.hyperedge(set) else {
            continue;
        };
        for name in set.names() {
            note(name, hit.overlap);
        }
        hyperedges.push(HyperedgeContext {
            participants: set.names().iter().map(|n| display(n)).collect(),
            description: edge.descriptions.joined(),
            generalization: edge.generalization_text().to_string(),
            keywords: edge.keywords.iter().cloned().collect(),
            strength: edge.strength.value(),
            overlap: hit.overlap,
        });
    }

    let mut entities: Vec<EntityContext> = entity_overlap
        .into_iter()
        .filter_map(|(name, overlap)| {
            let entity = hg.entity(&name)?;
            Some(EntityContext {
                display_name: entity.display_name().to_string(),
                entity_type: entity.entity_type.clone(),
                description: entity.descriptions.joined(),
                properties: entity.properties.joined(),
                degree: graph.degree(&name),
                overlap,
                name,
            })
        })
        .collect();
    entities.sort_by(entity_rank);

    ContextPackage {
        entities,
        edges,
        hyperedges,
    }
}

fn entity_rank(a: &EntityContext, b: &EntityContext) -> Ordering {
    b.overlap
        .cmp(&a.overlap)
        .then_with(|| b.degree.cmp(&a.degree))
        .then_with(|| a.name.cmp(&b.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypergraph::Hypergraph;
    use crate::model::{Batch, EdgeObservation, EntityObservation, HyperedgeObservation, Origin};

    fn entity(name: &str, desc: &str, seq: u32) -> EntityObservation {
        EntityObservation {
            name: name.into(),
            entity_type: "Component".into(),
            description: desc.into(),
            properties: String::new(),
            origin: Origin::new("c1", seq),
        }
    }

    fn snapshot() -> FrozenGraph {
        let mut batch = Batch::new("c1");
        batch.entities.push(entity("TouchPoint", "web front end", 0));
        batch.entities.push(entity("Web.config", "settings file", 1));
        batch.entities.push(entity("AD FS", "identity \"provider\"", 2));
        batch.entities.push(entity("Orphan", "unrelated", 3));
        batch.edges.push(EdgeObservation {
            source: "Web.config".into(),
            target: "TouchPoint".into(),
            description: "configures".into(),
            keywords: vec!["configuration".into()],
            strength: 8,
            origin: Origin::new("c1", 4),
        });
        batch.hyperedges.push(HyperedgeObservation {
            participants: vec!["TouchPoint".into(), "Web.config".into(), "AD FS".into()],
            description: "single sign-on setup".into(),
            generalization: "SSO setup".into(),
            keywords: vec!["Authentication".into()],
            strength: 9,
            origin: Origin::new("c1", 5),
        });
        batch.thematic_keywords = vec!["Identity federation".into()];

        let mut graph = Hypergraph::new();
        graph.merge_batch(&batch);
        FrozenGraph::freeze(graph)
    }

    fn keywords(high: &[&str], low: &[&str]) -> QueryKeywords {
        QueryKeywords {
            high_level_keywords: high.iter().map(|s| s.to_string()).collect(),
            low_level_keywords: low.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_no_match_is_no_relevant_data() {
        let graph = snapshot();
        let result = retrieve(&graph, &keywords(&["gardening"], &["tomato"]), &QueryBudget::default());
        assert_eq!(result, Retrieval::NoRelevantData);

        let result = retrieve(&graph, &QueryKeywords::default(), &QueryBudget::default());
        assert_eq!(result, Retrieval::NoRelevantData);
    }

    #[test]
    fn test_empty_graph_is_no_relevant_data() {
        let result = retrieve(
            &FrozenGraph::empty(),
            &keywords(&["anything"], &["at all"]),
            &QueryBudget::default(),
        );
        assert_eq!(result, Retrieval::NoRelevantData);
    }

    #[test]
    fn test_edge_hit_pulls_in_endpoints() {
        let graph = snapshot();
        let result = retrieve(&graph, &keywords(&[], &["configuration"]), &QueryBudget::default());
        let ctx = result.context().unwrap();
        assert_eq!(ctx.edges.len(), 1);
        assert_eq!(ctx.edges[0].strength, 8);
        let names: Vec<_> = ctx.entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["TOUCHPOINT", "WEB.CONFIG"]);
        assert!(ctx.hyperedges.is_empty());
    }

    #[test]
    fn test_thematic_hit_pulls_in_participants() {
        let graph = snapshot();
        let result = retrieve(
            &graph,
            &keywords(&["identity federation"], &[]),
            &QueryBudget::default(),
        );
        let ctx = result.context().unwrap();
        assert_eq!(ctx.hyperedges.len(), 1);
        assert_eq!(ctx.hyperedges[0].generalization, "SSO setup");
        // Degree 2 entities rank before AD FS (degree 1).
        let names: Vec<_> = ctx.entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["TOUCHPOINT", "WEB.CONFIG", "AD FS"]);
    }

    #[test]
    fn test_direct_hits_outrank_expanded_entities() {
        let graph = snapshot();
        let result = retrieve(
            &graph,
            &keywords(&[], &["ad fs", "fs", "configuration"]),
            &QueryBudget::default(),
        );
        let ctx = result.context().unwrap();
        assert_eq!(ctx.entities[0].name, "AD FS");
    }

    #[test]
    fn test_count_budget_truncates() {
        let graph = snapshot();
        let budget = QueryBudget {
            max_entities: 1,
            max_edges: 0,
            max_hyperedges: 1,
            max_context_chars: None,
        };
        let result = retrieve(
            &graph,
            &keywords(&["authentication"], &["configuration"]),
            &budget,
        );
        let ctx = result.context().unwrap();
        assert_eq!(ctx.entities.len(), 1);
        assert!(ctx.edges.is_empty());
        assert_eq!(ctx.hyperedges.len(), 1);
    }

    #[test]
    fn test_char_budget_drops_items() {
        let graph = snapshot();
        let kw = keywords(&["authentication"], &["configuration"]);
        let full = retrieve(&graph, &kw, &QueryBudget::default());
        let full_len = full.context().unwrap().render().chars().count();

        let budget = QueryBudget {
            max_context_chars: Some(full_len - 1),
            ..QueryBudget::default()
        };
        let cut = retrieve(&graph, &kw, &budget);
        let ctx = cut.context().unwrap();
        assert!(ctx.render().chars().count() < full_len);
        // Entities are the longest list, so they shrink first.
        assert_eq!(ctx.entities.len(), 2);

        let tiny = QueryBudget {
            max_context_chars: Some(10),
            ..QueryBudget::default()
        };
        assert_eq!(retrieve(&graph, &kw, &tiny), Retrieval::NoRelevantData);
    }

    #[test]
    fn test_render_quotes_fields() {
        let graph = snapshot();
        let result = retrieve(&graph, &keywords(&[], &["ad fs"]), &QueryBudget::default());
        let text = result.context().unwrap().render();
        assert!(text.starts_with("-----Entities-----\n```csv\n"));
        assert!(text.contains("\"0\",\"AD FS\",\"Component\",\"identity \"\"provider\"\"\""));
        assert!(text.contains("-----Relationships-----"));
        assert!(text.contains("-----Hyperedges-----"));
    }

    #[test]
    fn test_keywords_json_defaults() {
        let kw: QueryKeywords = serde_json::from_str(r#"{"low_level_keywords": ["x"]}"#).unwrap();
        assert!(kw.high_level_keywords.is_empty());
        assert!(!kw.is_empty());
    }
}
