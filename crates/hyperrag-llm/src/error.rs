//! Failures a completion call can end in.
//!
//! Callers only ever need to know one thing about a failure: whether asking
//! again might help. [`LlmError::is_retryable`] answers that; everything else
//! is carried for the log line.

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

#[derive(Debug, Error)]
pub enum LlmError {
    /// The service answered but refused the request (4xx other than auth/limit).
    #[error("Completion service rejected the request: {0}")]
    Backend(String),

    /// Could not reach the service, or the connection dropped mid-call.
    #[error("Network error: {0}")]
    Network(String),

    /// The client is misconfigured; retrying will not help.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The reply body was not the JSON shape we expect.
    #[error("Malformed reply: {0}")]
    Serialization(String),

    #[error("Rate limited: {message}{}", format_wait(.retry_after))]
    RateLimit {
        message: String,
        /// Server-provided wait, taken from `Retry-After`.
        retry_after: Option<Duration>,
    },

    /// 5xx from the service.
    #[error("Server error: {0}")]
    Server(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_wait(wait: &Option<Duration>) -> String {
    match wait {
        Some(d) => format!(" (retry after {:.2}s)", d.as_secs_f64()),
        None => String::new(),
    }
}

impl LlmError {
    /// A rate-limit error without a server-provided wait.
    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::RateLimit {
            message: message.into(),
            retry_after: None,
        }
    }

    /// Classify a non-success HTTP reply.
    ///
    /// `retry_after` is the raw `Retry-After` header; only the delta-seconds
    /// form is understood, an HTTP date is ignored.
    pub fn from_status(status: u16, message: String, retry_after: Option<&str>) -> Self {
        match status {
            401 | 403 => Self::Auth(message),
            408 => Self::Network(format!("request timeout: {message}")),
            429 => Self::RateLimit {
                message,
                retry_after: retry_after
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(Duration::from_secs),
            },
            500..=599 => Self::Server(message),
            _ => Self::Backend(format!("HTTP {status}: {message}")),
        }
    }

    /// Minimum wait the server asked for, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Transient failures: the network, rate limiting, and 5xx replies.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::RateLimit { .. } | Self::Server(_)
        )
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        let what = if err.is_timeout() {
            "timed out"
        } else if err.is_connect() {
            "connect failed"
        } else if err.is_decode() {
            return LlmError::Serialization(err.to_string());
        } else {
            "request failed"
        };
        LlmError::Network(format!("{what}: {err}"))
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::Serialization(err.to_string())
    }
}

/// Free-function form of [`LlmError::is_retryable`], handy as a predicate.
pub fn is_retryable(error: &LlmError) -> bool {
    error.is_retryable()
}
