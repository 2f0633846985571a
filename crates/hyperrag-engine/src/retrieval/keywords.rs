//! Query keyword extraction.

use std::sync::Arc;

use tracing::{debug, warn};

use hyperrag_config::DomainProfile;
use hyperrag_graph::{QueryKeywords, clean_name};
use hyperrag_llm::Message;

use crate::completer::Completer;
use crate::indexing::QueryPrompt;

/// Asks the completion service for the high- and low-level keywords of a query.
pub struct KeywordExtractor {
    completer: Arc<dyn Completer>,
    profile: Arc<DomainProfile>,
    max_tokens: u32,
}

impl KeywordExtractor {
    pub fn new(completer: Arc<dyn Completer>, profile: Arc<DomainProfile>, max_tokens: u32) -> Self {
        Self {
            completer,
            profile,
            max_tokens,
        }
    }

    /// Empty keyword lists when the call fails or the output is unusable.
    pub async fn extract(&self, query: &str) -> QueryKeywords {
        let prompt = QueryPrompt::keywords(&self.profile, query);
        match self
            .completer
            .complete(&[Message::user(prompt)], self.max_tokens)
            .await
        {
            Ok(raw) => {
                let keywords = parse_keywords(&raw);
                debug!(
                    high = ?keywords.high_level_keywords,
                    low = ?keywords.low_level_keywords,
                    "Query keywords"
                );
                keywords
            }
            Err(e) => {
                warn!(error = %e, "Keyword extraction failed");
                QueryKeywords::default()
            }
        }
    }
}

/// Parse the keyword JSON object, tolerating fences and surrounding prose.
pub fn parse_keywords(raw: &str) -> QueryKeywords {
    let cleaned = strip_code_fences(raw);
    let parsed = serde_json::from_str::<QueryKeywords>(cleaned).or_else(|e| {
        extract_json_object(cleaned)
            .ok_or(e)
            .and_then(serde_json::from_str::<QueryKeywords>)
    });

    match parsed {
        Ok(mut keywords) => {
            tidy(&mut keywords.high_level_keywords);
            tidy(&mut keywords.low_level_keywords);
            keywords
        }
        Err(e) => {
            warn!(error = %e, "Unparseable keyword output");
            QueryKeywords::default()
        }
    }
}

fn tidy(keywords: &mut Vec<String>) {
    let mut seen = std::collections::BTreeSet::new();
    keywords.retain_mut(|k| {
        *k = clean_name(k);
        !k.is_empty() && seen.insert(k.to_lowercase())
    });
}

fn strip_code_fences(s: &str) -> &str {
    let s = s.trim();
    for fence in ["```json", "```"] {
        if let Some(inner) = s.strip_prefix(fence).and_then(|r| r.strip_suffix("```")) {
            return inner.trim();
        }
    }
    s
}

/// First `{` through last `}`.
fn extract_json_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    (end > start).then(|| &s[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completer::testing::{FnCompleter, last_prompt};

    #[test]
    fn test_parse_plain_json() {
        let k = parse_keywords(
            r#"{"high_level_keywords": ["SSO"], "low_level_keywords": ["AD FS", "Web.config"]}"#,
        );
        assert_eq!(k.high_level_keywords, vec!["SSO"]);
        assert_eq!(k.low_level_keywords, vec!["AD FS", "Web.config"]);
    }

    #[test]
    fn test_parse_fenced_json() {
        let k = parse_keywords("```json\n{\"high_level_keywords\": [\"Trust\"]}\n```");
        assert_eq!(k.high_level_keywords, vec!["Trust"]);
        assert!(k.low_level_keywords.is_empty());
    }

    #[test]
    fn test_parse_json_inside_prose() {
        let k = parse_keywords(
            "Here you go:\n{\"high_level_keywords\": [], \"low_level_keywords\": [\"thumbprint\"]}\nHope that helps.",
        );
        assert_eq!(k.low_level_keywords, vec!["thumbprint"]);
    }

    #[test]
    fn test_parse_garbage_is_empty() {
        assert!(parse_keywords("I cannot help with that.").is_empty());
        assert!(parse_keywords("{not json}").is_empty());
    }

    #[test]
    fn test_parse_drops_blank_and_duplicate_keywords() {
        let k = parse_keywords(r#"{"low_level_keywords": ["  AD FS ", "", "ad fs", "\"Relay\""]}"#);
        assert_eq!(k.low_level_keywords, vec!["AD FS", "Relay"]);
    }

    #[tokio::test]
    async fn test_extract_sends_query() {
        let completer = Arc::new(FnCompleter::new(|h| {
            assert!(last_prompt(h).contains("How do I rotate the signing certificate?"));
            Ok(r#"{"high_level_keywords": ["Certificate rotation"], "low_level_keywords": ["signing certificate"]}"#.to_string())
        }));
        let extractor =
            KeywordExtractor::new(completer, Arc::new(DomainProfile::technical()), 256);
        let k = extractor
            .extract("How do I rotate the signing certificate?")
            .await;
        assert_eq!(k.high_level_keywords, vec!["Certificate rotation"]);
    }

    #[tokio::test]
    async fn test_extract_failure_is_empty() {
        let extractor = KeywordExtractor::new(
            Arc::new(FnCompleter::failing()),
            Arc::new(DomainProfile::technical()),
            256,
        );
        assert!(extractor.extract("anything").await.is_empty());
    }
}
