//! CLI wiring integration tests
//!
//! Runs the real binary against temp data directories:
//! - Command dispatch (backup, export, set-password)
//! - data_dir layout
//! - Exit codes

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn familytree(data_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_familytree"))
        .arg("--data-dir")
        .arg(data_dir)
        .args(args)
        .env_remove("FAMILYTREE_HOME")
        .env_remove("FAMILYTREE_DATA_DIR")
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run familytree binary")
}

#[test]
fn test_backup_creates_data_layout() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("data");

    let output = familytree(&data_dir, &["backup", "--description", "first"]);
    assert!(output.status.success(), "{:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("familytree_backup_"));

    assert!(data_dir.join("familytree.db").exists());
    assert!(data_dir.join("uploads").is_dir());
    let backups: Vec<_> = std::fs::read_dir(data_dir.join("backups"))
        .unwrap()
        .collect();
    assert_eq!(backups.len(), 1);
}

#[test]
fn test_export_to_stdout() {
    let temp_dir = TempDir::new().unwrap();

    let output = familytree(temp_dir.path(), &["export", "--format", "gedcom"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("0 HEAD"));
    assert!(stdout.contains("0 TRLR"));

    let output = familytree(temp_dir.path(), &["export", "--format", "json"]);
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["persons"], serde_json::json!([]));
}

#[test]
fn test_set_password_exit_codes() {
    let temp_dir = TempDir::new().unwrap();

    let output = familytree(temp_dir.path(), &["set-password", "hosszu-jelszo"]);
    assert!(output.status.success());

    let output = familytree(temp_dir.path(), &["set-password", "abc"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("at least 4"));
}

#[test]
fn test_missing_config_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nope.toml");
    let output = familytree(
        temp_dir.path(),
        &["--config", missing.to_str().unwrap(), "backup"],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("does not exist"));
}
