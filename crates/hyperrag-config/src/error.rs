//! Configuration error types.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot encode config as TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// No built-in or configured profile carries this name.
    #[error("unknown domain profile '{0}'")]
    UnknownProfile(String),

    /// A profile override names a prompt template that does not exist.
    #[error("profile '{profile}' overrides unknown prompt template '{template}'")]
    UnknownTemplate { profile: String, template: String },

    /// A prompt template lacks a placeholder the engine fills in.
    #[error("prompt template '{template}' is missing required placeholder '{{{placeholder}}}'")]
    MissingPlaceholder {
        template: String,
        placeholder: String,
    },

    /// A profile failed validation.
    #[error("invalid profile '{profile}': {reason}")]
    InvalidProfile { profile: String, reason: String },

    /// A config value is out of range.
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}
