//! The completion seam used by extraction, summarization, and answering.

use async_trait::async_trait;

use hyperrag_config::LlmConfig;
use hyperrag_llm::{CompletionRequest, Message, Result, SharedBackend};

/// Send a conversation, get text back.
///
/// Retries on transient failures belong to the backend; an error here means
/// the call's contribution is lost.
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, history: &[Message], max_tokens: u32) -> Result<String>;
}

/// Production completer over an [`LlmBackend`](hyperrag_llm::LlmBackend).
pub struct BackendCompleter {
    backend: SharedBackend,
    model: String,
    temperature: Option<f32>,
}

impl BackendCompleter {
    pub fn new(backend: SharedBackend, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            temperature: None,
        }
    }

    /// Build from the `[llm]` config section.
    pub fn from_config(backend: SharedBackend, config: &LlmConfig) -> Self {
        Self {
            backend,
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[async_trait]
impl Completer for BackendCompleter {
    async fn complete(&self, history: &[Message], max_tokens: u32) -> Result<String> {
        let mut request = CompletionRequest::new(&self.model, history.to_vec(), max_tokens);
        request.temperature = self.temperature;

        tracing::debug!(
            backend = self.backend.name(),
            model = %self.model,
            messages = history.len(),
            "Dispatching completion"
        );
        let response = self.backend.complete(request).await?;
        Ok(response.into_text())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use hyperrag_llm::MockBackend;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_backend_completer_forwards_history() {
        let backend = Arc::new(MockBackend::with_text("ok"));
        let completer = BackendCompleter::new(backend.clone(), "gpt-4o-mini").with_temperature(0.0);

        let history = vec![Message::user("extract"), Message::assistant("..."), Message::user("more")];
        let text = completer.complete(&history, 256).await.unwrap();
        assert_eq!(text, "ok");

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "gpt-4o-mini");
        assert_eq!(requests[0].messages, history);
        assert_eq!(requests[0].max_tokens, 256);
        assert_eq!(requests[0].temperature, Some(0.0));
    }

    #[tokio::test]
    async fn test_backend_completer_propagates_errors() {
        let backend = Arc::new(MockBackend::new(vec![]));
        let completer = BackendCompleter::new(backend, "m");
        assert!(completer.complete(&[Message::user("x")], 10).await.is_err());
    }
}
