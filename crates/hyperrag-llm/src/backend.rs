//! The backend seam, bounded retry, and a scripted backend for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{LlmError, Result};
use crate::types::{CompletionRequest, CompletionResponse};

/// Anything that can turn a [`CompletionRequest`] into text.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Label for logs.
    fn name(&self) -> &str;

    /// Cheap reachability probe.
    async fn health_check(&self) -> Result<()>;
}

pub type SharedBackend = Arc<dyn LlmBackend>;

/// How many times, and how patiently, to re-send a failed call.
///
/// Delays double from `initial_backoff` up to `max_backoff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based), ignoring server hints.
    fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Run `call` until it succeeds, fails permanently, or the retry budget is
/// spent. A server `Retry-After` longer than the computed delay wins, still
/// capped at `max_backoff`.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, backend: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retry = 0;
    loop {
        let err = match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && retry < policy.max_retries => err,
            Err(err) => return Err(err),
        };
        retry += 1;

        let computed = policy.backoff(retry);
        let delay = err
            .retry_after()
            .filter(|hint| *hint > computed)
            .unwrap_or(computed)
            .min(policy.max_backoff);

        tracing::warn!(
            backend,
            retry,
            of = policy.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Completion call failed, backing off"
        );
        tokio::time::sleep(delay).await;
    }
}

/// What a [`MockBackend`] does for one call.
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    /// Retryable failure.
    NetworkError(String),
    /// Permanent failure.
    BackendError(String),
}

/// Plays back a fixed script of replies, one per call, and records every
/// request it sees. Calls past the end of the script fail permanently.
#[derive(Debug, Default)]
pub struct MockBackend {
    script: Mutex<VecDeque<MockReply>>,
    seen: Mutex<Vec<CompletionRequest>>,
}

impl MockBackend {
    pub fn new(script: Vec<MockReply>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self::new(vec![MockReply::Text(text.into())])
    }

    pub fn with_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(|t| MockReply::Text(t.into())).collect())
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.seen.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.seen.lock().len()
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let model = request.model.clone();
        self.seen.lock().push(request);

        match self.script.lock().pop_front() {
            Some(MockReply::Text(text)) => Ok(CompletionResponse::text_only(model, text)),
            Some(MockReply::NetworkError(msg)) => Err(LlmError::Network(msg)),
            Some(MockReply::BackendError(msg)) => Err(LlmError::Backend(msg)),
            None => Err(LlmError::Backend("mock script exhausted".to_string())),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn ask(text: &str) -> CompletionRequest {
        CompletionRequest::new("test-model", vec![Message::user(text)], 100)
    }

    #[tokio::test]
    async fn test_mock_plays_script_in_order() {
        let backend = MockBackend::with_texts(["first", "second"]);

        assert_eq!(backend.complete(ask("1")).await.unwrap().text(), "first");
        assert_eq!(backend.complete(ask("2")).await.unwrap().text(), "second");
        assert_eq!(backend.request_count(), 2);
        assert_eq!(backend.requests()[1].messages[0].content, "2");
    }

    #[tokio::test]
    async fn test_mock_exhausted_script_is_permanent_failure() {
        let backend = MockBackend::new(vec![]);
        let err = backend.complete(ask("hi")).await.unwrap_err();
        assert!(!err.is_retryable());
        assert!(backend.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_scripted_network_error_is_retryable() {
        let backend = MockBackend::new(vec![MockReply::NetworkError("reset".into())]);
        assert!(backend.complete(ask("hi")).await.unwrap_err().is_retryable());
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(4), Duration::from_millis(500));
        assert_eq!(policy.backoff(40), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_transient_errors() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&RetryPolicy::default(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(LlmError::Server("502".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_stops_at_budget() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 2,
            ..RetryPolicy::default()
        };
        let result: Result<()> = with_retry(&policy, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(LlmError::rate_limit("busy")) }
        })
        .await;

        assert!(matches!(result, Err(LlmError::RateLimit { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_honors_longer_server_wait() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();
        let result = with_retry(&RetryPolicy::default(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(LlmError::from_status(429, "slow".into(), Some("4")))
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert!(started.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_retry_passes_permanent_errors_through() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&RetryPolicy::default(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(LlmError::Auth("bad key".into())) }
        })
        .await;

        assert!(matches!(result, Err(LlmError::Auth(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
