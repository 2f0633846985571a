//! Configuration system for hyperrag.
//!
//! Provides TOML-based configuration with:
//! - Sections for the completion service, extraction, summarization, query
//!   budget, storage and logging
//! - Config file layering (user config + project-local overrides)
//! - Domain profiles (`technical`, `social`, or custom `[profile.<name>]`)
//!   with validated, immutable prompt templates

pub mod discovery;
pub mod error;
pub mod profile;
pub mod types;

/// Application name for directory resolution.
pub const APP_NAME: &str = "hyperrag";

pub use discovery::{
    Layer, LayerStatus, LoadedConfig, PROJECT_CONFIG_FILE, load_config, load_config_file,
    load_config_with_options, save_config, user_config_dir, user_config_path,
};
pub use error::{ConfigError, Result};
pub use profile::{
    BUILTIN_PROFILES, Delimiters, DomainProfile, PromptSet, TemplateKind, available_profiles,
    render_template, resolve_profile,
};
pub use types::*;
