//! CLI integration tests for techcarectl
//!
//! Runs the built binary against an unreachable daemon and an empty
//! session file; no network access is needed.

use std::process::{Command, Output};
use tempfile::TempDir;

fn techcarectl(session_dir: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_techcarectl"))
        .args(args)
        .env("TECHCARE_SESSION_FILE", session_dir.path().join("session.json"))
        .env_remove("TECHCARE_SERVER")
        .env_remove("TECHCARE_PASSWORD")
        .output()
        .expect("Failed to run techcarectl")
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    let output = techcarectl(&dir, &["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for cmd in ["status", "login", "diagnose", "clean", "repair", "plans", "chat", "guides", "theme", "users"] {
        assert!(stdout.contains(cmd), "help is missing {}", cmd);
    }
}

#[test]
fn test_unreachable_daemon_exits_70() {
    let dir = TempDir::new().unwrap();
    let output = techcarectl(&dir, &["--server", "http://127.0.0.1:9", "status"]);
    assert_eq!(output.status.code(), Some(70));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Cannot reach techcared"));
}

#[test]
fn test_not_logged_in_exits_69() {
    let dir = TempDir::new().unwrap();
    let output = techcarectl(&dir, &["--server", "http://127.0.0.1:9", "history"]);
    assert_eq!(output.status.code(), Some(69));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Not logged in"));
}

#[test]
fn test_logout_without_session() {
    let dir = TempDir::new().unwrap();
    let output = techcarectl(&dir, &["logout"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("No saved session"));
}

#[test]
fn test_unknown_cleaning_kind_is_general_error() {
    let dir = TempDir::new().unwrap();
    let output = techcarectl(&dir, &["--server", "http://127.0.0.1:9", "clean", "run", "--kinds", "cookies"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown cleaning kind"));
}
