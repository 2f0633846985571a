//! Chat-completions client for OpenAI and the services that copy its API
//! (Ollama, vLLM, Groq, LiteLLM gateways).

use async_trait::async_trait;
use reqwest::{Client, header};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{LlmBackend, RetryPolicy, SharedBackend, with_retry};
use crate::error::{LlmError, Result};
use crate::types::{CompletionRequest, CompletionResponse, Message};

/// Connection settings for one chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Bearer token. Local servers usually run without one.
    pub api_key: Option<String>,
    /// Everything before `/chat/completions`, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Forces this model regardless of what the request names.
    pub model: Option<String>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    /// Label used in logs.
    pub name: String,
}

impl OpenAiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            api_key: None,
            base_url: base_url.into(),
            model: None,
            timeout: Duration::from_secs(300),
            retry: RetryPolicy::default(),
            name: "openai".to_string(),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

pub struct OpenAiBackend {
    http: Client,
    endpoint: String,
    config: OpenAiConfig,
}

impl OpenAiBackend {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("HTTP client setup failed: {e}")))?;
        Ok(Self {
            http,
            endpoint: config.endpoint(),
            config,
        })
    }

    fn model_for<'a>(&'a self, request: &'a CompletionRequest) -> &'a str {
        self.config.model.as_deref().unwrap_or(&request.model)
    }

    /// One HTTP round trip, no retries.
    async fn post_once(&self, body: &wire::ChatRequest<'_>) -> Result<CompletionResponse> {
        let mut call = self.http.post(&self.endpoint).json(body);
        if let Some(key) = &self.config.api_key {
            call = call.bearer_auth(key);
        }
        let response = call.send().await?;

        let status = response.status();
        if status.is_success() {
            let reply: wire::ChatReply = response.json().await?;
            return Ok(reply.into_response());
        }

        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let raw = response.text().await.unwrap_or_default();
        let message = wire::error_message(&raw);
        Err(LlmError::from_status(status.as_u16(), message, retry_after.as_deref()))
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let body = wire::ChatRequest::build(&request, self.model_for(&request));
        tracing::debug!(
            backend = %self.config.name,
            model = body.model,
            turns = body.messages.len(),
            max_tokens = body.max_tokens,
            "POST chat completion"
        );
        with_retry(&self.config.retry, &self.config.name, || self.post_once(&body)).await
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    async fn health_check(&self) -> Result<()> {
        let probe = CompletionRequest::new(
            self.config.model.as_deref().unwrap_or("gpt-4o-mini"),
            vec![Message::user("ping")],
            1,
        );
        match self.complete(probe).await {
            // A throttled endpoint is still a reachable one.
            Ok(_) | Err(LlmError::RateLimit { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

pub fn create_shared_backend(config: OpenAiConfig) -> Result<SharedBackend> {
    Ok(Arc::new(OpenAiBackend::new(config)?))
}

/// JSON bodies of the chat-completions endpoint.
mod wire {
    use serde::{Deserialize, Serialize};

    use crate::types::{CompletionRequest, CompletionResponse, Finish, TokenUsage};

    #[derive(Debug, Serialize)]
    pub struct ChatRequest<'a> {
        pub model: &'a str,
        pub messages: Vec<Turn<'a>>,
        pub max_tokens: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub temperature: Option<f32>,
    }

    #[derive(Debug, Serialize)]
    pub struct Turn<'a> {
        pub role: &'a str,
        pub content: &'a str,
    }

    impl<'a> ChatRequest<'a> {
        pub fn build(request: &'a CompletionRequest, model: &'a str) -> Self {
            let system = request.system.as_deref().map(|content| Turn {
                role: "system",
                content,
            });
            let messages = system
                .into_iter()
                .chain(request.messages.iter().map(|m| Turn {
                    role: m.role.as_str(),
                    content: &m.content,
                }))
                .collect();
            Self {
                model,
                messages,
                max_tokens: request.max_tokens,
                temperature: request.temperature,
            }
        }
    }

    #[derive(Debug, Deserialize)]
    pub struct ChatReply {
        #[serde(default)]
        model: String,
        #[serde(default)]
        choices: Vec<Choice>,
        usage: Option<Usage>,
    }

    #[derive(Debug, Deserialize)]
    struct Choice {
        message: ReplyMessage,
        finish_reason: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    struct ReplyMessage {
        content: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    struct Usage {
        prompt_tokens: u32,
        completion_tokens: u32,
    }

    impl ChatReply {
        /// Only the first choice is used; an empty choice list is an empty reply.
        pub fn into_response(self) -> CompletionResponse {
            let (content, finish) = self
                .choices
                .into_iter()
                .next()
                .map(|c| {
                    let finish = match c.finish_reason.as_deref() {
                        Some("length") => Finish::Truncated,
                        _ => Finish::Complete,
                    };
                    (c.message.content.unwrap_or_default(), finish)
                })
                .unwrap_or_default();
            CompletionResponse {
                model: self.model,
                content,
                finish,
                usage: self.usage.map(|u| TokenUsage {
                    prompt: u.prompt_tokens,
                    completion: u.completion_tokens,
                }),
            }
        }
    }

    #[derive(Debug, Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }

    #[derive(Debug, Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    /// `{"error": {"message": ...}}` when the service follows the convention,
    /// otherwise the raw body.
    pub fn error_message(raw: &str) -> String {
        serde_json::from_str::<ErrorBody>(raw)
            .map(|b| b.error.message)
            .unwrap_or_else(|_| raw.trim().to_string())
    }
}
