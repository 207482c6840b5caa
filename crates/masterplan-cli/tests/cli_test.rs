//! Integration tests for the `masterplan` binary's offline commands.
//!
//! Each test points `XDG_CONFIG_HOME` at its own temporary directory so no
//! real config file is read or written.

use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;

fn masterplan(config_home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_masterplan"))
        .args(args)
        .env("XDG_CONFIG_HOME", config_home)
        .env_remove("MASTERPLAN_API_KEY")
        .env_remove("MASTERPLAN_MODEL")
        .env("RUST_LOG", "error")
        .output()
        .expect("failed to run masterplan binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn init_writes_config_once() {
    let tmp = tempfile::TempDir::new().unwrap();

    let out = masterplan(tmp.path(), &["init", "--api-key", "test-key-123"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let path = tmp.path().join("masterplan").join("config.toml");
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("api_key = \"test-key-123\""), "{contents}");

    let again = masterplan(tmp.path(), &["init"]);
    assert!(!again.status.success());
    assert!(stderr(&again).contains("already exists"));

    let forced = masterplan(tmp.path(), &["init", "--force"]);
    assert!(forced.status.success(), "stderr: {}", stderr(&forced));
}

#[test]
fn extract_prints_constraints_json() {
    let tmp = tempfile::TempDir::new().unwrap();

    let out = masterplan(
        tmp.path(),
        &[
            "extract",
            "plano de fevereiro a agosto de 2026 com R$ 50.000",
            "--today",
            "2026-01-15",
        ],
    );
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let json: Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(json["explicit"], true);
    assert_eq!(json["constraints"]["monthCount"], 7);
    assert_eq!(json["constraints"]["totalBudget"], 50_000.0);
    assert_eq!(json["buckets"].as_array().unwrap().len(), 7);
    assert_eq!(json["buckets"][6]["month"], "2026-Agosto");
}

#[test]
fn extract_honours_planning_config() {
    let tmp = tempfile::TempDir::new().unwrap();
    let dir = tmp.path().join("masterplan");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("config.toml"),
        "[planning]\ndefault_budget = 7500\ndefault_months = 2\n",
    )
    .unwrap();

    let out = masterplan(tmp.path(), &["extract", "algo vago", "--today", "2026-03-01"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let json: Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(json["explicit"], false);
    assert_eq!(json["constraints"]["totalBudget"], 7500.0);
    assert_eq!(json["constraints"]["monthCount"], 2);
}

#[test]
fn reconcile_prints_record() {
    let tmp = tempfile::TempDir::new().unwrap();

    let out = masterplan(
        tmp.path(),
        &["reconcile", "--budget", "5000", "--unit", "cpc", "--cpc", "2.5", "--ctr", "2"],
    );
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let json: Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(json["clicks"], 2000);
    assert_eq!(json["impressions"], 100_000);
}

#[test]
fn formats_check_suggests_default() {
    let tmp = tempfile::TempDir::new().unwrap();

    let out = masterplan(tmp.path(), &["formats", "Meta Ads", "--check", "Search"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out).trim(), "Search: not offered on Meta Ads, would use Feed");
}

#[test]
fn generate_without_api_key_fails_fast() {
    let tmp = tempfile::TempDir::new().unwrap();

    let out = masterplan(tmp.path(), &["generate", "um plano qualquer"]);
    assert!(!out.status.success());
    assert!(
        stderr(&out).contains("API key not found"),
        "stderr: {}",
        stderr(&out)
    );
}
