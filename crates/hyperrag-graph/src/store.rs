//! Named knowledge bases on disk.
//!
//! Layout: `<root>/<database>/graph.json`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::{GraphError, Result};
use crate::snapshot::FrozenGraph;

/// Snapshot filename inside a database directory.
pub const GRAPH_FILE: &str = "graph.json";

/// Summary of one stored database.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseInfo {
    pub name: String,
    pub path: PathBuf,
    pub modified: Option<DateTime<Utc>>,
    pub size_bytes: u64,
}

/// Directory of named databases.
#[derive(Debug, Clone)]
pub struct DatabaseStore {
    root: PathBuf,
}

impl DatabaseStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn database_dir(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(GraphError::InvalidDatabaseName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    /// Path of a database's snapshot file.
    pub fn graph_path(&self, name: &str) -> Result<PathBuf> {
        Ok(self.database_dir(name)?.join(GRAPH_FILE))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.graph_path(name).is_ok_and(|p| p.is_file())
    }

    /// Databases holding a snapshot, sorted by name.
    pub fn list(&self) -> Result<Vec<DatabaseInfo>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(GraphError::io(&self.root, e)),
        };

        let mut databases = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| GraphError::io(&self.root, e))?;
            let path = entry.path().join(GRAPH_FILE);
            let Ok(meta) = std::fs::metadata(&path) else {
                continue;
            };
            databases.push(DatabaseInfo {
                name: entry.file_name().to_string_lossy().into_owned(),
                path,
                modified: meta.modified().ok().map(DateTime::<Utc>::from),
                size_bytes: meta.len(),
            });
        }

        databases.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(databases)
    }

    /// Load a database; `None` if it has no snapshot yet.
    pub fn load(&self, name: &str) -> Result<Option<FrozenGraph>> {
        let path = self.graph_path(name)?;
        if !path.is_file() {
            return Ok(None);
        }
        FrozenGraph::load(&path).map(Some)
    }

    pub fn save(&self, name: &str, graph: &FrozenGraph) -> Result<PathBuf> {
        let path = self.graph_path(name)?;
        graph.save(&path)?;
        Ok(path)
    }

    /// Remove a database directory and everything in it.
    pub fn delete(&self, name: &str) -> Result<()> {
        let dir = self.database_dir(name)?;
        if !dir.is_dir() {
            return Err(GraphError::DatabaseNotFound(name.to_string()));
        }
        std::fs::remove_dir_all(&dir).map_err(|e| GraphError::io(&dir, e))?;
        info!(database = name, "Deleted database");
        Ok(())
    }
}
