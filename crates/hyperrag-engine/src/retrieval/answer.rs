//! Answer synthesis over the published snapshot.

use std::sync::Arc;

use tracing::info;

use hyperrag_config::{DomainProfile, HyperragConfig};
use hyperrag_graph::{
    ContextPackage, FAIL_RESPONSE, QueryBudget, QueryKeywords, Retrieval, SnapshotCell, retrieve,
};
use hyperrag_llm::Message;

use super::keywords::KeywordExtractor;
use crate::completer::Completer;
use crate::error::Result;
use crate::indexing::QueryPrompt;

#[derive(Debug, Clone)]
pub struct AnswerOptions {
    pub budget: QueryBudget,
    pub response_type: String,
    pub keyword_max_tokens: u32,
    pub answer_max_tokens: u32,
}

impl Default for AnswerOptions {
    fn default() -> Self {
        Self {
            budget: QueryBudget::default(),
            response_type: "Multiple Paragraphs".to_string(),
            keyword_max_tokens: 256,
            answer_max_tokens: 2048,
        }
    }
}

impl AnswerOptions {
    pub fn from_config(config: &HyperragConfig) -> Self {
        let query = config.query();
        Self {
            budget: QueryBudget {
                max_entities: query.max_entities,
                max_edges: query.max_edges,
                max_hyperedges: query.max_hyperedges,
                max_context_chars: query.max_context_chars,
            },
            response_type: query.response_type,
            answer_max_tokens: config.llm().max_tokens,
            ..Self::default()
        }
    }
}

/// A synthesized answer and what it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub keywords: QueryKeywords,
    /// `None` when nothing matched and the fail response was returned.
    pub context: Option<ContextPackage>,
}

impl Answer {
    pub fn is_fail_response(&self) -> bool {
        self.context.is_none()
    }
}

/// Keyword extraction, retrieval, then response generation.
pub struct Answerer {
    completer: Arc<dyn Completer>,
    profile: Arc<DomainProfile>,
    keywords: KeywordExtractor,
    snapshot: Arc<SnapshotCell>,
    options: AnswerOptions,
}

impl Answerer {
    pub fn new(
        completer: Arc<dyn Completer>,
        profile: Arc<DomainProfile>,
        snapshot: Arc<SnapshotCell>,
        options: AnswerOptions,
    ) -> Self {
        let keywords = KeywordExtractor::new(
            completer.clone(),
            profile.clone(),
            options.keyword_max_tokens,
        );
        Self {
            completer,
            profile,
            keywords,
            snapshot,
            options,
        }
    }

    /// Keywords and context package without generating a response.
    pub async fn retrieve(&self, query: &str) -> (QueryKeywords, Retrieval) {
        let keywords = self.keywords.extract(query).await;
        let snapshot = self.snapshot.current();
        let retrieval = retrieve(&snapshot, &keywords, &self.options.budget);
        (keywords, retrieval)
    }

    pub async fn answer(&self, query: &str) -> Result<Answer> {
        let (keywords, retrieval) = self.retrieve(query).await;
        let Retrieval::Context(context) = retrieval else {
            info!("No relevant data for query");
            return Ok(Answer {
                text: FAIL_RESPONSE.to_string(),
                keywords,
                context: None,
            });
        };

        info!(
            entities = context.entities.len(),
            edges = context.edges.len(),
            hyperedges = context.hyperedges.len(),
            "Answering from context"
        );
        let prompt = QueryPrompt::response(
            &self.profile,
            &context.render(),
            &self.options.response_type,
        );
        let text = self
            .completer
            .complete(&[Message::user(prompt)], self.options.answer_max_tokens)
            .await?;

        Ok(Answer {
            text: text.trim().to_string(),
            keywords,
            context: Some(context),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completer::testing::{FnCompleter, last_prompt};
    use crate::indexing::{build_batch, parse_records};
    use hyperrag_graph::{FrozenGraph, Hypergraph};

    const EXTRACTED: &str = r#"("Entity" | "Web.config" | "Artifact" | "XML settings file" | "")
("Entity" | "TouchPoint" | "Component" | "Customer portal" | "")
("Low-order Hyperedge" | "Web.config" | "TouchPoint" | "Web.config configures TouchPoint" | "configuration" | 8)"#;

    fn snapshot() -> Arc<SnapshotCell> {
        let profile = DomainProfile::technical();
        let parsed = parse_records(EXTRACTED, &profile.delimiters);
        let mut graph = Hypergraph::new();
        graph.merge_batch(&build_batch("doc#0", &parsed.records, &profile));
        Arc::new(SnapshotCell::new(FrozenGraph::freeze(graph)))
    }

    fn answerer(completer: FnCompleter) -> Answerer {
        Answerer::new(
            Arc::new(completer),
            Arc::new(DomainProfile::technical()),
            snapshot(),
            AnswerOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_answer_uses_rendered_context() {
        let completer = FnCompleter::new(|h| {
            let prompt = last_prompt(h);
            if prompt.contains("---Real query---") {
                Ok(r#"{"high_level_keywords": [], "low_level_keywords": ["TouchPoint"]}"#.to_string())
            } else {
                assert!(prompt.contains("-----Entities-----"));
                assert!(prompt.contains("Customer portal"));
                assert!(prompt.contains("Multiple Paragraphs"));
                Ok("  TouchPoint is the customer portal.\n".to_string())
            }
        });
        let answer = answerer(completer).answer("What is TouchPoint?").await.unwrap();

        assert_eq!(answer.text, "TouchPoint is the customer portal.");
        assert!(!answer.is_fail_response());
        assert_eq!(answer.keywords.low_level_keywords, vec!["TouchPoint"]);
        let context = answer.context.unwrap();
        assert!(context.entities.iter().any(|e| e.display_name == "TouchPoint"));
    }

    #[tokio::test]
    async fn test_no_match_returns_fail_response() {
        let completer = FnCompleter::new(|_| {
            Ok(r#"{"high_level_keywords": ["Gardening"], "low_level_keywords": ["tomato"]}"#.to_string())
        });
        let completer = Arc::new(completer);
        let answerer = Answerer::new(
            completer.clone(),
            Arc::new(DomainProfile::technical()),
            snapshot(),
            AnswerOptions::default(),
        );
        let answer = answerer.answer("How do I grow tomatoes?").await.unwrap();

        assert_eq!(answer.text, FAIL_RESPONSE);
        assert!(answer.is_fail_response());
        // Only the keyword call; no response generation.
        assert_eq!(completer.calls(), 1);
    }

    #[tokio::test]
    async fn test_unusable_keywords_fall_back_to_fail_response() {
        let answer = answerer(FnCompleter::new(|_| Ok("no idea".to_string())))
            .answer("What is TouchPoint?")
            .await
            .unwrap();
        assert_eq!(answer.text, FAIL_RESPONSE);
    }

    #[tokio::test]
    async fn test_empty_snapshot_has_no_relevant_data() {
        let answerer = Answerer::new(
            Arc::new(FnCompleter::new(|_| {
                Ok(r#"{"low_level_keywords": ["TouchPoint"]}"#.to_string())
            })),
            Arc::new(DomainProfile::technical()),
            Arc::new(SnapshotCell::default()),
            AnswerOptions::default(),
        );
        let (_, retrieval) = answerer.retrieve("What is TouchPoint?").await;
        assert_eq!(retrieval, Retrieval::NoRelevantData);
    }

    #[tokio::test]
    async fn test_response_failure_is_an_error() {
        let completer = FnCompleter::new(|h| {
            if last_prompt(h).contains("---Real query---") {
                Ok(r#"{"low_level_keywords": ["Web.config"]}"#.to_string())
            } else {
                Err(hyperrag_llm::LlmError::Server("500".into()))
            }
        });
        assert!(answerer(completer).answer("Web.config?").await.is_err());
    }
}
