//! Completion service client abstraction for hyperrag.
//!
//! The extraction engine only ever needs one capability from a language model:
//! send a short conversation, get text back. This crate defines that seam.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  LlmBackend trait                       │
//! │  - complete() -> CompletionResponse     │
//! │  - health_check()                       │
//! └─────────────────────────────────────────┘
//!                    │
//!          ┌─────────┴─────────┐
//!          ▼                   ▼
//!   ┌─────────────┐     ┌─────────────┐
//!   │OpenAI-compat│     │ MockBackend │
//!   └─────────────┘     └─────────────┘
//! ```

pub mod backend;
pub mod error;
pub mod openai;
pub mod types;

pub use backend::{LlmBackend, MockBackend, MockReply, RetryPolicy, SharedBackend, with_retry};
pub use error::{LlmError, Result, is_retryable};
pub use openai::{OpenAiBackend, OpenAiConfig, create_shared_backend};
pub use types::{CompletionRequest, CompletionResponse, Finish, Message, Role, TokenUsage};
