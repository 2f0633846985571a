//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [llm]                    # completion service connection
//! [extraction]             # profile selection, gleaning, concurrency
//! [summary]                # fragment summarization threshold
//! [query]                  # retrieval budget
//! [storage]                # data directory and active database
//! [logging]                # file logging
//! [profile.<name>]         # domain profile overrides
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HyperragConfig {
    /// Completion service connection.
    pub llm: Option<LlmConfig>,

    /// Extraction run settings.
    pub extraction: Option<ExtractionConfig>,

    /// Fragment summarization settings.
    pub summary: Option<SummaryConfig>,

    /// Query budget and answer settings.
    pub query: Option<QueryConfig>,

    /// Knowledge-base storage.
    pub storage: Option<StorageConfig>,

    /// File logging.
    pub logging: Option<LoggingConfig>,

    /// Named domain profile overrides (`[profile.technical]`, `[profile.legal]`, ...).
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub profile: BTreeMap<String, ProfileOverride>,
}

impl HyperragConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: HyperragConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: HyperragConfig) {
        if other.llm.is_some() {
            self.llm = other.llm;
        }

        if other.extraction.is_some() {
            self.extraction = other.extraction;
        }

        if other.summary.is_some() {
            self.summary = other.summary;
        }

        if other.query.is_some() {
            self.query = other.query;
        }

        if other.storage.is_some() {
            self.storage = other.storage;
        }

        if other.logging.is_some() {
            self.logging = other.logging;
        }

        for (name, profile) in other.profile {
            self.profile.insert(name, profile);
        }
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if let Some(ref extraction) = self.extraction
            && extraction.max_concurrent_chunks == 0
        {
            return Err(ConfigError::InvalidValue {
                field: "extraction.max_concurrent_chunks".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if let Some(ref summary) = self.summary
            && summary.threshold < 2
        {
            return Err(ConfigError::InvalidValue {
                field: "summary.threshold".to_string(),
                reason: "must be at least 2".to_string(),
            });
        }

        if let Some(ref storage) = self.storage
            && !is_valid_database_name(&storage.database)
        {
            return Err(ConfigError::InvalidValue {
                field: "storage.database".to_string(),
                reason: format!("'{}' is not a valid database name", storage.database),
            });
        }

        Ok(())
    }

    /// Effective LLM settings (defaults when the section is absent).
    pub fn llm(&self) -> LlmConfig {
        self.llm.clone().unwrap_or_default()
    }

    /// Effective extraction settings.
    pub fn extraction(&self) -> ExtractionConfig {
        self.extraction.clone().unwrap_or_default()
    }

    /// Effective summary settings.
    pub fn summary(&self) -> SummaryConfig {
        self.summary.clone().unwrap_or_default()
    }

    /// Effective query settings.
    pub fn query(&self) -> QueryConfig {
        self.query.clone().unwrap_or_default()
    }

    /// Effective storage settings.
    pub fn storage(&self) -> StorageConfig {
        self.storage.clone().unwrap_or_default()
    }

    /// Effective logging settings.
    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }
}

/// Database names become directory names, so only a safe subset is allowed.
pub fn is_valid_database_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Completion service connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Backend provider.
    pub backend: Backend,
    /// Model identifier.
    pub model: String,
    /// Custom API base URL (for proxies, gateways, local servers).
    pub base_url: Option<String>,
    /// API key (prefer the environment variable; warns if set here).
    pub api_key: Option<String>,
    /// Maximum retry attempts for transient failures.
    pub retry_max: u32,
    /// Initial backoff between retries in milliseconds (doubles per attempt).
    pub retry_backoff_ms: u64,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Maximum tokens generated per extraction call.
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Openai,
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            api_key: None,
            retry_max: 3,
            retry_backoff_ms: 500,
            timeout_secs: 300,
            temperature: Some(0.0),
            max_tokens: 4096,
        }
    }
}

impl LlmConfig {
    /// Returns true if an API key is stored directly in the config file.
    pub fn has_plaintext_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Resolve the API key: config file first, then the backend's env var.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(self.backend.env_var()).ok())
            .filter(|k| !k.is_empty())
    }
}

/// Supported completion service providers.
///
/// All of them speak the OpenAI chat completions dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Openai,
    Groq,
    Ollama,
    Custom,
}

impl Backend {
    /// Environment variable name for this backend's API key.
    pub fn env_var(&self) -> &'static str {
        match self {
            Backend::Openai => "OPENAI_API_KEY",
            Backend::Groq => "GROQ_API_KEY",
            Backend::Ollama => "OLLAMA_API_KEY",
            Backend::Custom => "LLM_API_KEY",
        }
    }

    /// Base URL used when the config does not set one.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Backend::Openai | Backend::Custom => "https://api.openai.com/v1",
            Backend::Groq => "https://api.groq.com/openai/v1",
            Backend::Ollama => "http://localhost:11434/v1",
        }
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Backend::Openai => "OpenAI",
            Backend::Groq => "Groq",
            Backend::Ollama => "Ollama",
            Backend::Custom => "Custom",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Extraction Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Extraction run settings.
///
/// ```toml
/// [extraction]
/// profile = "technical"
/// max_gleaning = 1
/// max_concurrent_chunks = 4
/// strength_policy = "max"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Domain profile used for extraction prompts.
    pub profile: String,
    /// Overrides the profile's continuation cap when set.
    pub max_gleaning: Option<u32>,
    /// Chunks extracted concurrently.
    pub max_concurrent_chunks: usize,
    /// How repeated observations of an edge combine their strengths.
    pub strength_policy: StrengthMerge,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            profile: "technical".to_string(),
            max_gleaning: None,
            max_concurrent_chunks: 4,
            strength_policy: StrengthMerge::Max,
        }
    }
}

/// Edge strength combination rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrengthMerge {
    #[default]
    Max,
    Mean,
}

// ─────────────────────────────────────────────────────────────────────────────
// Summary Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Fragment summarization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// A fragment list this long is compressed into one summary.
    pub threshold: usize,
    /// Token cap for a summary completion.
    pub max_tokens: u32,
    /// Summaries in flight at once.
    pub max_concurrent: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            max_tokens: 500,
            max_concurrent: 4,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Query Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Retrieval budget and answer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub max_entities: usize,
    pub max_edges: usize,
    pub max_hyperedges: usize,
    /// Character cap on the rendered context.
    pub max_context_chars: Option<usize>,
    /// Response-format hint passed to answer generation.
    pub response_type: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_entities: 40,
            max_edges: 40,
            max_hyperedges: 20,
            max_context_chars: Some(12_000),
            response_type: "Multiple Paragraphs".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Storage Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Knowledge-base storage.
///
/// Each named database is a subdirectory of `data_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root data directory (defaults to the platform data dir).
    pub data_dir: Option<PathBuf>,
    /// Database used when none is named on the command line.
    pub database: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            database: "default".to_string(),
        }
    }
}

impl StorageConfig {
    /// Resolve the data directory: explicit setting, then `<data_dir>/hyperrag`.
    pub fn effective_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(crate::APP_NAME)
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// File logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Write JSON logs to a daily rolling file.
    pub file: bool,
    /// Log directory (defaults to `<data_dir>/logs`).
    pub dir: Option<PathBuf>,
    /// Default filter directive for the console.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: true,
            dir: None,
            level: "info".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Profile Overrides
// ─────────────────────────────────────────────────────────────────────────────

/// Overrides for a domain profile.
///
/// A name matching a built-in profile patches it; any other name defines a
/// new profile on top of `base` (default `technical`).
///
/// ```toml
/// [profile.legal]
/// base = "technical"
/// entity_types = ["Statute", "Party", "Obligation"]
/// language = "English"
///
/// [profile.legal.templates]
/// rag_response = "..."
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileOverride {
    pub base: Option<String>,
    pub entity_types: Option<Vec<String>>,
    pub language: Option<String>,
    pub examples: Option<Vec<String>>,
    pub tuple_delimiter: Option<String>,
    pub record_delimiter: Option<String>,
    pub completion_delimiter: Option<String>,
    pub max_gleaning: Option<u32>,
    /// Prompt template replacements keyed by template name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub templates: BTreeMap<String, String>,
}
