//! CLI integration tests for the hyperrag command-line interface.
//!
//! These tests verify:
//! - Help text is displayed correctly
//! - Argument parsing works as expected
//! - Knowledge base management against a temporary data directory
//! - Failure paths when the completion service cannot be reached
//!
//! The completion service points at a closed local port, so no test needs
//! network access.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use hyperrag_graph::{DatabaseStore, FrozenGraph};

/// Get a command for the hyperrag binary.
fn hyperrag() -> Command {
    Command::cargo_bin("hyperrag").unwrap()
}

/// A temp project with its own config, data directory, and no file logging.
struct Project {
    dir: TempDir,
}

impl Project {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("data");
        let config = format!(
            "[storage]\ndata_dir = {:?}\n\n[logging]\nfile = false\n\n[llm]\nbackend = \"custom\"\nbase_url = \"http://127.0.0.1:9/v1\"\nretry_max = 0\ntimeout_secs = 5\n",
            data_dir.display().to_string()
        );
        std::fs::write(dir.path().join("test.toml"), config).unwrap();
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn data_dir(&self) -> PathBuf {
        self.path().join("data")
    }

    fn cmd(&self) -> Command {
        let mut cmd = hyperrag();
        cmd.env("HYPERRAG_CONFIG_DIR", self.path())
            .arg("--config")
            .arg(self.path().join("test.toml"))
            .arg("--project-dir")
            .arg(self.path());
        cmd
    }

    fn seed_database(&self, name: &str) {
        DatabaseStore::new(self.data_dir())
            .save(name, &FrozenGraph::empty())
            .unwrap();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_displays() {
    hyperrag()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("hypergraph retrieval-augmented generation"));
}

#[test]
fn test_version_displays() {
    hyperrag()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("hyperrag"));
}

#[test]
fn test_help_lists_subcommands() {
    hyperrag()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ingest"))
        .stdout(predicate::str::contains("query"))
        .stdout(predicate::str::contains("db"))
        .stdout(predicate::str::contains("profiles"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Argument Parsing Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_ingest_requires_inputs() {
    hyperrag()
        .arg("ingest")
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn test_query_requires_question() {
    hyperrag()
        .arg("query")
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn test_unknown_subcommand_rejected() {
    hyperrag().arg("serve").assert().failure();
}

#[test]
fn test_global_flags_accepted() {
    hyperrag()
        .args(["--verbose", "--json", "--database", "kb", "--help"])
        .assert()
        .success();
}

// ─────────────────────────────────────────────────────────────────────────────
// Profiles
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_profiles_list() {
    let project = Project::new();
    project
        .cmd()
        .args(["profiles", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("technical"))
        .stdout(predicate::str::contains("social"));
}

#[test]
fn test_profiles_show_technical() {
    let project = Project::new();
    project
        .cmd()
        .args(["profiles", "show", "technical"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Component"))
        .stdout(predicate::str::contains("Artifact"));
}

#[test]
fn test_profiles_show_template() {
    let project = Project::new();
    project
        .cmd()
        .args(["profiles", "show", "social", "--template", "rag_response"])
        .assert()
        .success()
        .stdout(predicate::str::contains("{context_data}"));
}

#[test]
fn test_profiles_show_unknown_fails() {
    let project = Project::new();
    project
        .cmd()
        .args(["profiles", "show", "astrology"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown domain profile"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Knowledge Bases
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_db_list_empty() {
    let project = Project::new();
    project
        .cmd()
        .args(["db", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No databases"));
}

#[test]
fn test_db_list_json() {
    let project = Project::new();
    project.seed_database("manuals");
    project
        .cmd()
        .args(["--json", "db", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"manuals\""));
}

#[test]
fn test_db_stats() {
    let project = Project::new();
    project.seed_database("manuals");
    project
        .cmd()
        .args(["db", "stats", "manuals"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Entities"));
}

#[test]
fn test_db_select_writes_project_config() {
    let project = Project::new();
    project.seed_database("manuals");
    project
        .cmd()
        .args(["db", "select", "manuals"])
        .assert()
        .success();

    let saved = std::fs::read_to_string(project.path().join("hyperrag.toml")).unwrap();
    assert!(saved.contains("database = \"manuals\""));
}

#[test]
fn test_db_select_missing_fails() {
    let project = Project::new();
    project
        .cmd()
        .args(["db", "select", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_db_delete() {
    let project = Project::new();
    project.seed_database("scratch");
    project
        .cmd()
        .args(["db", "delete", "scratch", "--yes"])
        .assert()
        .success();
    assert!(!DatabaseStore::new(project.data_dir()).exists("scratch"));
}

#[test]
fn test_invalid_database_name_rejected() {
    let project = Project::new();
    project
        .cmd()
        .args(["--database", "../escape", "db", "stats"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid database name"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Ingest and Query
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_query_missing_database_fails() {
    let project = Project::new();
    project
        .cmd()
        .args(["query", "What is TouchPoint?"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_query_unreachable_service_gives_fail_response() {
    let project = Project::new();
    project.seed_database("default");
    project
        .cmd()
        .args(["query", "What is TouchPoint?"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Sorry, I'm not able to provide an answer to that question.",
        ));
}

#[test]
fn test_ingest_missing_file_fails() {
    let project = Project::new();
    project
        .cmd()
        .args(["ingest", "does-not-exist.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read"));
}

#[test]
fn test_ingest_unreachable_service_fails_without_saving() {
    let project = Project::new();
    let input = project.path().join("guide.txt");
    std::fs::write(&input, "Edit Web.config.\n\nRestart the portal.").unwrap();

    project
        .cmd()
        .arg("ingest")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Completion service unavailable"));
    assert!(!DatabaseStore::new(project.data_dir()).exists("default"));
}

#[test]
fn test_ingest_rejects_chunk_id_repeated_across_files() {
    let project = Project::new();
    let first = project.path().join("one.jsonl");
    let second = project.path().join("two.jsonl");
    std::fs::write(&first, "{\"id\": \"guide#00000\", \"text\": \"Edit Web.config.\"}\n").unwrap();
    std::fs::write(&second, "{\"id\": \"guide#00000\", \"text\": \"Restart the portal.\"}\n")
        .unwrap();

    project
        .cmd()
        .arg("ingest")
        .arg(&first)
        .arg(&second)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Duplicate chunk id 'guide#00000'"));
    assert!(!DatabaseStore::new(project.data_dir()).exists("default"));
}
