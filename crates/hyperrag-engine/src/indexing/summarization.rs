//! Fragment-list summarization and output cleanup.

use std::sync::Arc;

use tracing::{debug, warn};

use hyperrag_config::DomainProfile;
use hyperrag_graph::FragmentTarget;
use hyperrag_llm::Message;

use super::prompt::SummaryPrompt;
use crate::completer::Completer;

/// Labels models like to put in front of a summary.
const LABELS: [&str; 4] = ["Summary", "Description", "Output", "Merged description"];

/// Clean up summary output by stripping common wrapper patterns.
///
/// Handles:
/// - Leading "Summary:"-style labels, optionally as a markdown header
/// - Markdown code fences
/// - Excessive whitespace
pub fn clean_summary(raw: &str) -> String {
    let mut s = raw.trim();

    if let Some(rest) = s.strip_prefix("```")
        && let Some(inner) = rest.strip_suffix("```")
    {
        // Drop a language tag on the opening fence.
        s = match inner.split_once('\n') {
            Some((tag, body)) if !tag.trim().contains(' ') => body,
            _ => inner,
        }
        .trim();
    }

    let unheaded = s.trim_start_matches('#').trim_start();
    for label in LABELS {
        if let Some(rest) = strip_prefix_ignore_case(unheaded, label) {
            let rest = rest.trim_start_matches([' ', '\t']);
            if rest.starts_with(':') || rest.starts_with('\n') {
                s = rest.trim_start_matches(':').trim();
                break;
            }
        }
    }

    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

/// Compresses fragment lists through the completion service.
pub struct Summarizer {
    completer: Arc<dyn Completer>,
    profile: Arc<DomainProfile>,
    max_tokens: u32,
}

impl Summarizer {
    pub fn new(completer: Arc<dyn Completer>, profile: Arc<DomainProfile>, max_tokens: u32) -> Self {
        Self {
            completer,
            profile,
            max_tokens,
        }
    }

    /// One condensed string, or `None` on failure or empty output.
    pub async fn summarize(
        &self,
        target: &FragmentTarget,
        label: &str,
        fragments: &[String],
    ) -> Option<String> {
        let prompt = SummaryPrompt::build(&self.profile, target, label, fragments);
        match self
            .completer
            .complete(&[Message::user(prompt)], self.max_tokens)
            .await
        {
            Ok(raw) => {
                let summary = clean_summary(&raw);
                if summary.is_empty() {
                    warn!(list = %target, "Summary came back empty");
                    None
                } else {
                    debug!(list = %target, fragments = fragments.len(), "Summarized");
                    Some(summary)
                }
            }
            Err(e) => {
                warn!(list = %target, error = %e, "Summarization failed, keeping fragments");
                None
            }
        }
    }
}
