//! CLI command handlers.

pub mod db;
pub mod ingest;
pub mod profiles;
pub mod query;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};

use hyperrag_config::{DomainProfile, HyperragConfig, PROJECT_CONFIG_FILE};
use hyperrag_engine::{BackendCompleter, Completer};
use hyperrag_graph::{DatabaseStore, FrozenGraph};
use hyperrag_llm::{OpenAiConfig, RetryPolicy};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Effective configuration after layering.
    pub config: HyperragConfig,
    /// Directory of the project-local config file.
    pub project_dir: Option<PathBuf>,
    /// Knowledge base the command operates on.
    pub database: String,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    pub fn store(&self) -> DatabaseStore {
        DatabaseStore::new(self.config.storage().effective_data_dir())
    }

    /// The named profile, or the one configured under `[extraction]`.
    pub fn profile(&self, name: Option<&str>) -> Result<DomainProfile> {
        let extraction = self.config.extraction();
        let name = name.unwrap_or(&extraction.profile);
        Ok(hyperrag_config::resolve_profile(&self.config, name)?)
    }

    /// Load the selected knowledge base, failing if it does not exist.
    pub fn load_database(&self) -> Result<FrozenGraph> {
        self.store().load(&self.database)?.with_context(|| {
            format!(
                "Database '{}' not found. Run `hyperrag ingest` first.",
                self.database
            )
        })
    }

    /// Completion client for the `[llm]` section.
    pub fn completer(&self) -> Result<Arc<dyn Completer>> {
        let llm = self.config.llm();
        let backend_config = OpenAiConfig {
            api_key: llm.resolve_api_key(),
            base_url: llm
                .base_url
                .clone()
                .unwrap_or_else(|| llm.backend.default_base_url().to_string()),
            model: Some(llm.model.clone()),
            timeout: Duration::from_secs(llm.timeout_secs),
            retry: RetryPolicy {
                max_retries: llm.retry_max,
                initial_backoff: Duration::from_millis(llm.retry_backoff_ms),
                ..RetryPolicy::default()
            },
            name: llm.backend.display_name().to_lowercase(),
        };
        let backend = hyperrag_llm::create_shared_backend(backend_config)
            .context("Failed to create completion backend")?;
        Ok(Arc::new(BackendCompleter::from_config(backend, &llm)))
    }

    /// Where `db select` records the active database.
    pub fn project_config_path(&self) -> PathBuf {
        self.project_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(PROJECT_CONFIG_FILE)
    }
}
