//! CLI integration tests that spawn the dqa binary.

use std::path::Path;
use std::process::Command;

fn dqa() -> Command {
    Command::new(env!("CARGO_BIN_EXE_dqa"))
}

/// Write a config file and a docs directory into `dir`, returning the
/// config path.
fn setup_test_env(dir: &Path) -> std::path::PathBuf {
    let docs = dir.join("docs");
    std::fs::create_dir_all(&docs).unwrap();
    std::fs::write(docs.join("sky.md"), "The sky is blue.\n").unwrap();
    std::fs::write(docs.join("grass.txt"), "Grass is green.\n").unwrap();
    std::fs::write(docs.join("ignored.rs"), "fn main() {}\n").unwrap();

    let config_path = dir.join("docqa.toml");
    let config = format!(
        r#"
[db]
path = "{db}"

[docs]
root = "{docs}"

[embedding]
url = "http://127.0.0.1:9"
max_retries = 0
timeout_secs = 2
"#,
        db = dir.join("index.sqlite").display(),
        docs = docs.display(),
    );
    std::fs::write(&config_path, config).unwrap();
    config_path
}

#[test]
fn test_init_creates_database() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup_test_env(dir.path());

    let output = dqa()
        .args(["--config", config.to_str().unwrap(), "init"])
        .output()
        .unwrap();

    assert!(output.status.success(), "{:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("initialized"));
    assert!(dir.path().join("index.sqlite").exists());
}

#[test]
fn test_init_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup_test_env(dir.path());

    for _ in 0..2 {
        let output = dqa()
            .args(["--config", config.to_str().unwrap(), "init"])
            .output()
            .unwrap();
        assert!(output.status.success());
    }
}

#[test]
fn test_status_on_empty_index() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup_test_env(dir.path());

    let output = dqa()
        .args(["--config", config.to_str().unwrap(), "status"])
        .output()
        .unwrap();

    assert!(output.status.success(), "{:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Documents:       0"));
    assert!(stdout.contains("Chunks:          0"));
    assert!(stdout.contains("Embedding model: none"));
}

#[test]
fn test_reindex_dry_run_reports_counts_without_embedding() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup_test_env(dir.path());

    // The embedding url is unreachable; dry-run must still succeed
    // because planning never embeds.
    let output = dqa()
        .args([
            "--config",
            config.to_str().unwrap(),
            "reindex",
            "--dry-run",
        ])
        .output()
        .unwrap();

    assert!(output.status.success(), "{:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("new:       2"));
    assert!(stdout.contains("unchanged: 0"));
}

#[test]
fn test_reindex_reports_per_document_failures() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup_test_env(dir.path());

    // Both documents fail to embed; the run itself still completes.
    let output = dqa()
        .args(["--config", config.to_str().unwrap(), "reindex"])
        .output()
        .unwrap();

    assert!(output.status.success(), "{:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("failed:    2"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_missing_config_fails() {
    let output = dqa()
        .args(["--config", "/nonexistent/docqa.toml", "status"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}
