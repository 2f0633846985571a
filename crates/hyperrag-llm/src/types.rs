//! What goes to a completion service and what comes back.
//!
//! Extraction and answering only exchange plain text turns, so a message is
//! a role plus a string. Continuation prompts replay the whole history.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Role name as chat-completion APIs spell it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A single completion call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    /// Sent ahead of `messages` as a system turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens,
            system: None,
            temperature: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// How generation ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Finish {
    /// The model stopped on its own or on a stop sequence.
    #[default]
    Complete,
    /// Cut off by `max_tokens`. Extraction output may end mid-record.
    Truncated,
}

/// Token accounting reported by the service, when it reports any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt: u32,
    pub completion: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt.saturating_add(self.completion)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub model: String,
    pub content: String,
    #[serde(default)]
    pub finish: Finish,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl CompletionResponse {
    /// A complete reply with no usage figures.
    pub fn text_only(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            content: content.into(),
            finish: Finish::Complete,
            usage: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.content
    }

    pub fn into_text(self) -> String {
        self.content
    }

    pub fn is_truncated(&self) -> bool {
        self.finish == Finish::Truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let req = CompletionRequest::new("m", vec![Message::user("hi")], 64)
            .with_system("be terse")
            .with_temperature(0.2);
        assert_eq!(req.system.as_deref(), Some("be terse"));
        assert_eq!(req.temperature, Some(0.2));
        assert_eq!(req.messages[0].role, Role::User);
    }

    #[test]
    fn test_request_serialization_omits_unset_options() {
        let req = CompletionRequest::new("m", vec![Message::assistant("(\"Entity\")")], 64);
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("system").is_none());
        assert!(json.get("temperature").is_none());
        assert_eq!(json["messages"][0]["role"], "assistant");
    }

    #[test]
    fn test_usage_total_saturates() {
        let usage = TokenUsage {
            prompt: u32::MAX,
            completion: 3,
        };
        assert_eq!(usage.total(), u32::MAX);
    }

    #[test]
    fn test_text_only_response() {
        let resp = CompletionResponse::text_only("m", "done");
        assert!(!resp.is_truncated());
        assert!(resp.usage.is_none());
        assert_eq!(resp.into_text(), "done");
    }
}
