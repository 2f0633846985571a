//! Finding, layering, and saving `hyperrag.toml` files.
//!
//! Two layers are read, the later one winning field by field:
//!
//! 1. user: `$HYPERRAG_CONFIG_DIR/config.toml`, else `<platform config dir>/hyperrag/config.toml`
//! 2. project: `<project>/hyperrag.toml`
//!
//! Command-line flags are applied on top by the binary.

use std::path::{Path, PathBuf};

use crate::{APP_NAME, ConfigError, HyperragConfig, Result};

/// Name of the per-project config file. `db select` writes here too.
pub const PROJECT_CONFIG_FILE: &str = "hyperrag.toml";

const USER_CONFIG_FILE: &str = "config.toml";
const CONFIG_DIR_ENV: &str = "HYPERRAG_CONFIG_DIR";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    User,
    Project,
}

/// What happened to one layer during discovery.
#[derive(Debug, Clone)]
pub struct LayerStatus {
    pub layer: Layer,
    pub path: PathBuf,
    /// False when the file is absent or did not parse.
    pub applied: bool,
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: HyperragConfig,
    /// User layer first when one was looked for.
    pub layers: Vec<LayerStatus>,
    /// Non-fatal problems to surface once logging is up.
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.layers
            .iter()
            .filter_map(|l| l.applied.then_some(l.path.as_path()))
            .collect()
    }
}

pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Like [`load_config`], but `config_dir` replaces the user config directory
/// lookup entirely. Tests use this to stay away from the real home directory.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let user = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => user_config_path(),
    };
    let project = project_dir
        .unwrap_or_else(|| Path::new("."))
        .join(PROJECT_CONFIG_FILE);

    let candidates = user
        .map(|p| (Layer::User, p))
        .into_iter()
        .chain(std::iter::once((Layer::Project, project)));

    let mut loaded = LoadedConfig {
        config: HyperragConfig::new(),
        layers: Vec::new(),
        warnings: Vec::new(),
    };
    for (layer, path) in candidates {
        let applied = apply_layer(&mut loaded, &path);
        loaded.layers.push(LayerStatus {
            layer,
            path,
            applied,
        });
    }

    if let Some(llm) = &loaded.config.llm
        && llm.has_plaintext_api_key()
    {
        loaded.warnings.push(format!(
            "[llm] api_key is stored in plaintext; prefer the {} environment variable",
            llm.backend.env_var()
        ));
    }
    Ok(loaded)
}

/// Merge the file at `path` into `loaded`. Absent files are not an error;
/// unparsable ones are reported as warnings so one bad layer does not block
/// the other.
fn apply_layer(loaded: &mut LoadedConfig, path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    match load_config_file(path) {
        Ok(layer) => {
            tracing::debug!(path = %path.display(), "Applied config layer");
            loaded.config.merge(layer);
            true
        }
        Err(e) => {
            loaded
                .warnings
                .push(format!("Ignoring {}: {e}", path.display()));
            false
        }
    }
}

/// Read one file, no layering.
pub fn load_config_file(path: &Path) -> Result<HyperragConfig> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        action: "read",
        path: path.to_path_buf(),
        source,
    })?;
    HyperragConfig::from_toml(&text)
}

pub fn save_config(config: &HyperragConfig, path: &Path) -> Result<()> {
    let write_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| ConfigError::Io {
            action: "write",
            path,
            source,
        }
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(write_err(dir))?;
    }
    std::fs::write(path, config.to_toml()?).map_err(write_err(path))
}

pub fn user_config_path() -> Option<PathBuf> {
    Some(user_config_dir()?.join(USER_CONFIG_FILE))
}

/// `HYPERRAG_CONFIG_DIR` when set and non-empty, else `<platform config>/hyperrag`.
pub fn user_config_dir() -> Option<PathBuf> {
    match std::env::var_os(CONFIG_DIR_ENV) {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::config_dir().map(|d| d.join(APP_NAME)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    use crate::Backend;

    /// A project dir and an isolated user config dir.
    struct Dirs {
        user: TempDir,
        project: TempDir,
    }

    impl Dirs {
        fn new() -> Self {
            Self {
                user: TempDir::new().unwrap(),
                project: TempDir::new().unwrap(),
            }
        }

        fn write_user(&self, toml: &str) {
            fs::write(self.user.path().join(USER_CONFIG_FILE), toml).unwrap();
        }

        fn write_project(&self, toml: &str) {
            fs::write(self.project.path().join(PROJECT_CONFIG_FILE), toml).unwrap();
        }

        fn load(&self) -> LoadedConfig {
            load_config_with_options(Some(self.project.path()), Some(self.user.path())).unwrap()
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config_file(Path::new("/nonexistent/hyperrag.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { action: "read", .. }));
    }

    #[test]
    fn test_no_layers_present() {
        let loaded = Dirs::new().load();
        assert!(loaded.config.llm.is_none());
        assert!(loaded.loaded_from().is_empty());
        assert!(loaded.warnings.is_empty());
        assert_eq!(loaded.layers.len(), 2);
        assert_eq!(loaded.layers[0].layer, Layer::User);
    }

    #[test]
    fn test_project_layer_overrides_user_layer() {
        let dirs = Dirs::new();
        dirs.write_user(
            "[llm]\nbackend = \"groq\"\nmodel = \"base-model\"\n\n[summary]\nthreshold = 6\n",
        );
        dirs.write_project("[llm]\nbackend = \"ollama\"\nmodel = \"qwen2.5\"\n");

        let loaded = dirs.load();
        let llm = loaded.config.llm();
        assert_eq!(llm.backend, Backend::Ollama);
        assert_eq!(llm.model, "qwen2.5");
        assert_eq!(loaded.config.summary().threshold, 6);
        assert_eq!(loaded.loaded_from().len(), 2);
    }

    #[test]
    fn test_plaintext_key_produces_warning() {
        let dirs = Dirs::new();
        dirs.write_project("[llm]\nbackend = \"groq\"\napi_key = \"gsk_secret\"\n");

        let loaded = dirs.load();
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("plaintext"));
        assert!(loaded.warnings[0].contains("GROQ_API_KEY"));
    }

    #[test]
    fn test_broken_project_layer_keeps_user_layer() {
        let dirs = Dirs::new();
        dirs.write_user("[summary]\nthreshold = 9\n");
        dirs.write_project("not valid toml {{{{");

        let loaded = dirs.load();
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].starts_with("Ignoring"));
        assert_eq!(loaded.config.summary().threshold, 9);
        assert!(!loaded.layers[1].applied);
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(PROJECT_CONFIG_FILE);
        let mut config = HyperragConfig::new();
        config.summary = Some(crate::SummaryConfig {
            threshold: 7,
            ..Default::default()
        });

        save_config(&config, &path).unwrap();
        assert_eq!(load_config_file(&path).unwrap().summary().threshold, 7);
    }
}
