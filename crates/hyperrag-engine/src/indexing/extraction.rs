//! Per-chunk extraction with a bounded continuation loop.
//!
//! ```text
//! INIT ─▶ EXTRACTING ─▶ LOOP_CHECK ─┬─ "yes" ─▶ CONTINUE ─▶ EXTRACTING
//!              │                    └─ other ─▶ DONE
//!              └─ rounds == cap ───────────────▶ DONE
//! ```
//!
//! The model's loop-check answer is advisory: the cap always wins.

use std::sync::Arc;

use tracing::{debug, warn};

use hyperrag_config::DomainProfile;
use hyperrag_llm::{LlmError, Message};

use super::prompt::ExtractionPrompt;
use super::records::{ParsedRecords, parse_records};
use crate::completer::Completer;

/// A piece of source text with a stable id.
///
/// Ids order discovery: fragments from a lexically smaller chunk id come first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: String,
    pub text: String,
}

impl Chunk {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionState {
    Init,
    Extracting,
    LoopCheck,
    Continue,
    Done,
}

/// Everything gathered for one chunk.
#[derive(Debug, Clone, Default)]
pub struct ChunkExtraction {
    pub chunk_id: String,
    pub records: ParsedRecords,
    /// Continuation rounds performed.
    pub rounds: u32,
    pub completion_calls: usize,
    pub completion_failures: usize,
}

/// Drives the extraction conversation for a chunk.
pub struct Extractor {
    completer: Arc<dyn Completer>,
    profile: Arc<DomainProfile>,
    max_tokens: u32,
}

impl Extractor {
    pub fn new(completer: Arc<dyn Completer>, profile: Arc<DomainProfile>, max_tokens: u32) -> Self {
        Self {
            completer,
            profile,
            max_tokens,
        }
    }

    pub fn profile(&self) -> &DomainProfile {
        &self.profile
    }

    /// Run the state machine for one chunk.
    ///
    /// Fails only when the initial extraction call fails; a failed
    /// continuation or loop check ends the loop with what was gathered.
    pub async fn extract(&self, chunk: &Chunk) -> Result<ChunkExtraction, LlmError> {
        let cap = self.profile.max_gleaning;
        let mut result = ChunkExtraction {
            chunk_id: chunk.id.clone(),
            ..Default::default()
        };
        let mut history: Vec<Message> = Vec::new();
        let mut state = ExtractionState::Init;

        while state != ExtractionState::Done {
            let next = match state {
                ExtractionState::Init => {
                    history.push(Message::user(ExtractionPrompt::build(
                        &self.profile,
                        &chunk.text,
                    )));
                    ExtractionState::Extracting
                }
                ExtractionState::Extracting => {
                    result.completion_calls += 1;
                    match self.completer.complete(&history, self.max_tokens).await {
                        Ok(text) => {
                            result
                                .records
                                .extend(parse_records(&text, &self.profile.delimiters));
                            history.push(Message::assistant(text));
                            if result.rounds >= cap {
                                ExtractionState::Done
                            } else {
                                ExtractionState::LoopCheck
                            }
                        }
                        Err(e) if result.rounds == 0 => return Err(e),
                        Err(e) => {
                            result.completion_failures += 1;
                            warn!(chunk = %chunk.id, round = result.rounds, error = %e, "Continuation failed");
                            ExtractionState::Done
                        }
                    }
                }
                ExtractionState::LoopCheck => {
                    let mut probe = history.clone();
                    probe.push(Message::user(ExtractionPrompt::loop_check(&self.profile)));
                    result.completion_calls += 1;
                    match self.completer.complete(&probe, self.max_tokens).await {
                        Ok(answer) if says_yes(&answer) => ExtractionState::Continue,
                        Ok(_) => ExtractionState::Done,
                        Err(e) => {
                            result.completion_failures += 1;
                            warn!(chunk = %chunk.id, error = %e, "Loop check failed");
                            ExtractionState::Done
                        }
                    }
                }
                ExtractionState::Continue => {
                    result.rounds += 1;
                    history.push(Message::user(ExtractionPrompt::continuation(&self.profile)));
                    ExtractionState::Extracting
                }
                ExtractionState::Done => ExtractionState::Done,
            };
            debug!(chunk = %chunk.id, from = ?state, to = ?next, "Extraction transition");
            state = next;
        }

        debug!(
            chunk = %chunk.id,
            records = result.records.parsed,
            skipped = result.records.skipped,
            rounds = result.rounds,
            "Chunk extracted"
        );
        Ok(result)
    }
}

/// Case-insensitive "yes" prefix after trimming quotes and whitespace.
fn says_yes(answer: &str) -> bool {
    answer
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c.is_whitespace())
        .to_lowercase()
        .starts_with("yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completer::testing::{FnCompleter, last_prompt};
    use crate::indexing::records::Record;

    const FIRST: &str = "(\"Entity\" | A | Component | first)\n<|COMPLETE|>";
    const MORE: &str = "(\"Entity\" | B | Component | more)\n<|COMPLETE|>";

    fn profile(max_gleaning: u32) -> Arc<DomainProfile> {
        let mut p = DomainProfile::technical();
        p.max_gleaning = max_gleaning;
        Arc::new(p)
    }

    fn is_loop_check(history: &[Message]) -> bool {
        last_prompt(history).contains("Answer YES | NO")
    }

    #[tokio::test]
    async fn test_no_gleaning_makes_one_call() {
        let completer = Arc::new(FnCompleter::new(|_| Ok(FIRST.to_string())));
        let extractor = Extractor::new(completer.clone(), profile(0), 1024);

        let out = extractor.extract(&Chunk::new("c1", "text")).await.unwrap();
        assert_eq!(out.records.parsed, 1);
        assert_eq!(out.rounds, 0);
        assert_eq!(completer.calls(), 1);
    }

    #[tokio::test]
    async fn test_stops_at_cap_when_model_always_says_yes() {
        let completer = Arc::new(FnCompleter::new(|history| {
            if is_loop_check(history) {
                Ok("YES".to_string())
            } else {
                Ok(MORE.to_string())
            }
        }));
        let extractor = Extractor::new(completer.clone(), profile(3), 1024);

        let out = extractor.extract(&Chunk::new("c1", "text")).await.unwrap();
        assert_eq!(out.rounds, 3);
        assert_eq!(out.records.parsed, 4);
        // 4 extraction calls plus 3 loop checks; no check once the cap is hit.
        assert_eq!(completer.calls(), 7);
        assert_eq!(out.completion_calls, 7);
    }

    #[tokio::test]
    async fn test_no_answer_ends_loop() {
        let completer = Arc::new(FnCompleter::new(|history| {
            if is_loop_check(history) {
                Ok("  \"No\"  ".to_string())
            } else {
                Ok(FIRST.to_string())
            }
        }));
        let extractor = Extractor::new(completer.clone(), profile(5), 1024);

        let out = extractor.extract(&Chunk::new("c1", "text")).await.unwrap();
        assert_eq!(out.rounds, 0);
        assert_eq!(completer.calls(), 2);
    }

    #[tokio::test]
    async fn test_continuation_shares_the_conversation() {
        let completer = Arc::new(FnCompleter::new(|history| {
            if is_loop_check(history) {
                Ok(if history.len() > 3 { "no" } else { "yes" }.to_string())
            } else if history.len() == 1 {
                Ok(FIRST.to_string())
            } else {
                Ok(MORE.to_string())
            }
        }));
        let extractor = Extractor::new(completer.clone(), profile(2), 1024);

        let out = extractor.extract(&Chunk::new("c1", "text")).await.unwrap();
        let names: Vec<_> = out
            .records
            .records
            .iter()
            .filter_map(|r| match r {
                Record::Entity(e) => Some(e.name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["A", "B"]);

        let conversations = completer.conversations();
        // user, assistant, user(continue)
        assert_eq!(conversations[2].len(), 3);
        assert_eq!(conversations[2][1].content, FIRST);
    }

    #[tokio::test]
    async fn test_initial_failure_is_an_error() {
        let extractor = Extractor::new(Arc::new(FnCompleter::failing()), profile(1), 1024);
        assert!(extractor.extract(&Chunk::new("c1", "text")).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_continuation_keeps_gathered_records() {
        let completer = Arc::new(FnCompleter::new(|history| {
            if is_loop_check(history) {
                Ok("yes".to_string())
            } else if history.len() == 1 {
                Ok(FIRST.to_string())
            } else {
                Err(LlmError::Server("503".into()))
            }
        }));
        let extractor = Extractor::new(completer, profile(2), 1024);

        let out = extractor.extract(&Chunk::new("c1", "text")).await.unwrap();
        assert_eq!(out.records.parsed, 1);
        assert_eq!(out.completion_failures, 1);
    }

    #[test]
    fn test_says_yes() {
        assert!(says_yes("YES"));
        assert!(says_yes(" \"yes, a few\" "));
        assert!(!says_yes("No"));
        assert!(!says_yes("I think yes"));
    }
}
