//! Integration tests for CLI behavior
//!
//! These run the real binary against a throwaway project root. Each test gets
//! its own TempDir passed via `--root`, so nothing touches the working tree.

use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

/// Run mulch against `root` with the given args.
fn run_mulch(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mulch"))
        .arg("--root")
        .arg(root)
        .args(args)
        .env_remove("MULCH_ROOT")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run mulch")
}

/// Run mulch with `--json` and parse stdout.
fn run_json(root: &Path, args: &[&str]) -> (bool, Value) {
    let mut full = vec!["--json"];
    full.extend_from_slice(args);
    let output = run_mulch(root, &full);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let value = serde_json::from_str(stdout.trim())
        .unwrap_or_else(|e| panic!("stdout is not JSON ({}): {}", e, stdout));
    (output.status.success(), value)
}

/// Initialized project with a `testing` domain.
fn setup_project() -> TempDir {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    assert!(run_mulch(temp_dir.path(), &["init"]).status.success());
    assert!(
        run_mulch(temp_dir.path(), &["add", "testing"])
            .status
            .success()
    );
    temp_dir
}

fn record_convention(root: &Path, content: &str) -> String {
    let (ok, value) = run_json(
        root,
        &[
            "record",
            "testing",
            "--type",
            "convention",
            "--content",
            content,
        ],
    );
    assert!(ok, "record failed: {}", value);
    value["results"][0]["id"]
        .as_str()
        .expect("record id")
        .to_string()
}

#[test]
fn integration_help_flag() {
    let output = Command::new(env!("CARGO_BIN_EXE_mulch"))
        .arg("--help")
        .output()
        .expect("failed to run mulch");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("mulch"));
    assert!(stdout.contains("Usage"));
}

#[test]
fn integration_version_flag() {
    let output = Command::new(env!("CARGO_BIN_EXE_mulch"))
        .arg("--version")
        .output()
        .expect("failed to run mulch");

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("mulch"));
}

#[test]
fn integration_init_creates_layout() {
    let temp_dir = TempDir::new().unwrap();
    let (ok, value) = run_json(temp_dir.path(), &["init"]);
    assert!(ok);
    assert_eq!(value["created"], true);
    assert!(temp_dir.path().join(".mulch/mulch.config.toml").is_file());
    assert!(temp_dir.path().join(".mulch/expertise").is_dir());

    let (_, again) = run_json(temp_dir.path(), &["init"]);
    assert_eq!(again["created"], false);
}

#[test]
fn integration_uninitialized_project_fails() {
    let temp_dir = TempDir::new().unwrap();
    let output = run_mulch(temp_dir.path(), &["status"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("mulch init"));
}

#[test]
fn integration_json_error_object() {
    let temp_dir = TempDir::new().unwrap();
    let (ok, value) = run_json(temp_dir.path(), &["status"]);
    assert!(!ok);
    assert_eq!(value["success"], false);
    assert_eq!(value["error"]["kind"], "not_initialized");
}

#[test]
fn integration_root_from_env() {
    let temp_dir = setup_project();
    let output = Command::new(env!("CARGO_BIN_EXE_mulch"))
        .args(["--json", "status"])
        .env("MULCH_ROOT", temp_dir.path())
        .output()
        .expect("failed to run mulch");
    assert!(output.status.success());
    let value: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["domains"][0]["domain"], "testing");
}

#[test]
fn integration_record_and_query() {
    let temp_dir = setup_project();
    let id = record_convention(temp_dir.path(), "Always use tempfile in tests");
    assert!(id.starts_with("mx-"));

    let line = fs::read_to_string(temp_dir.path().join(".mulch/expertise/testing.jsonl")).unwrap();
    assert_eq!(line.lines().count(), 1);
    assert!(line.contains(&id));

    let output = run_mulch(temp_dir.path(), &["query", "testing"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&id));
    assert!(stdout.contains("Always use tempfile in tests"));
}

#[test]
fn integration_duplicate_convention_skipped() {
    let temp_dir = setup_project();
    record_convention(temp_dir.path(), "Run fmt");
    let (ok, value) = run_json(
        temp_dir.path(),
        &["record", "testing", "--type", "convention", "--content", "Run fmt"],
    );
    assert!(ok);
    assert_eq!(value["results"][0]["action"], "skipped");
}

#[test]
fn integration_record_missing_field() {
    let temp_dir = setup_project();
    let output = run_mulch(
        temp_dir.path(),
        &["record", "testing", "--type", "pattern", "--name", "retry"],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("--description"));
}

#[test]
fn integration_record_from_stdin() {
    let temp_dir = setup_project();
    let mut child = Command::new(env!("CARGO_BIN_EXE_mulch"))
        .arg("--root")
        .arg(temp_dir.path())
        .args(["--json", "record", "testing", "--stdin"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("failed to run mulch");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(
            br#"{"type":"convention","content":"one","classification":"tactical","recorded_at":"2024-01-01T00:00:00Z"}
{"type":"guide","name":"setup","description":"how to set up","classification":"foundational","recorded_at":"2024-01-01T00:00:00Z"}
"#,
        )
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let value: Value = serde_json::from_slice(&output.stdout).unwrap();
    let results = value["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r["action"] == "created"));
}

#[test]
fn integration_outcome_and_search() {
    let temp_dir = setup_project();
    record_convention(temp_dir.path(), "use cargo fmt");
    let confirmed = record_convention(temp_dir.path(), "use cargo clippy");

    let (ok, value) = run_json(
        temp_dir.path(),
        &["outcome", "testing", &confirmed[3..], "--status", "success"],
    );
    assert!(ok);
    assert_eq!(value["outcome_count"], 1);

    let (ok, value) = run_json(temp_dir.path(), &["search", "cargo"]);
    assert!(ok);
    let hits = value["hits"].as_array().unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0]["record"]["id"], confirmed.as_str());
    assert_eq!(hits[0]["matched_fields"][0], "content");
}

#[test]
fn integration_edit_and_delete() {
    let temp_dir = setup_project();
    let id = record_convention(temp_dir.path(), "original");

    let (ok, value) = run_json(
        temp_dir.path(),
        &["edit", "testing", &id, "--tags", "a,b"],
    );
    assert!(ok);
    assert_eq!(value["record"]["tags"][1], "b");

    let output = run_mulch(temp_dir.path(), &["edit", "testing", &id, "--name", "x"]);
    assert_eq!(output.status.code(), Some(1));

    let (ok, _) = run_json(temp_dir.path(), &["delete", "testing", &id]);
    assert!(ok);
    let (ok, value) = run_json(temp_dir.path(), &["delete", "testing", &id]);
    assert!(!ok);
    assert_eq!(value["error"]["kind"], "not_found");
}

#[test]
fn integration_compact() {
    let temp_dir = setup_project();
    let a = record_convention(temp_dir.path(), "one");
    let b = record_convention(temp_dir.path(), "two");

    let (ok, value) = run_json(
        temp_dir.path(),
        &[
            "compact",
            "testing",
            &a,
            &b,
            "--type",
            "convention",
            "--content",
            "one and two",
            "--classification",
            "foundational",
        ],
    );
    assert!(ok, "compact failed: {}", value);
    assert_eq!(value["count"], 1);
    assert_eq!(value["superseded"][0], a.as_str());
    assert_eq!(value["superseded"][1], b.as_str());
}

#[test]
fn integration_validate_reports_bad_lines() {
    let temp_dir = setup_project();
    record_convention(temp_dir.path(), "fine");
    let path = temp_dir.path().join(".mulch/expertise/testing.jsonl");
    let mut content = fs::read_to_string(&path).unwrap();
    content.push_str("{broken\n");
    fs::write(&path, content).unwrap();

    let (ok, value) = run_json(temp_dir.path(), &["validate"]);
    assert!(!ok);
    assert_eq!(value["valid"], false);
    assert_eq!(value["domains"][0]["problems"][0]["line"], 2);
}

#[test]
fn integration_prune_dry_run() {
    let temp_dir = setup_project();
    let path = temp_dir.path().join(".mulch/expertise/testing.jsonl");
    fs::write(
        &path,
        concat!(
            r#"{"type":"convention","content":"old","classification":"tactical","recorded_at":"2020-01-01T00:00:00Z"}"#,
            "\n",
            r#"{"type":"convention","content":"kept","classification":"foundational","recorded_at":"2020-01-01T00:00:00Z"}"#,
            "\n"
        ),
    )
    .unwrap();

    let (ok, value) = run_json(temp_dir.path(), &["prune", "--dry-run"]);
    assert!(ok);
    assert_eq!(value["domains"][0]["remaining"], 1);
    assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 2);

    let (ok, _) = run_json(temp_dir.path(), &["prune"]);
    assert!(ok);
    let left = fs::read_to_string(&path).unwrap();
    assert_eq!(left.lines().count(), 1);
    assert!(left.contains("kept"));
}

#[test]
fn integration_prime_markdown() {
    let temp_dir = setup_project();
    record_convention(temp_dir.path(), "Prefer small commits");
    let output = run_mulch(temp_dir.path(), &["prime"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("## testing (1 records)"));
    assert!(stdout.contains("### Conventions"));
    assert!(stdout.contains("- Prefer small commits"));
}

#[test]
fn integration_quiet_suppresses_confirmation() {
    let temp_dir = setup_project();
    let output = run_mulch(
        temp_dir.path(),
        &["-q", "record", "testing", "--type", "convention", "--content", "x"],
    );
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}
