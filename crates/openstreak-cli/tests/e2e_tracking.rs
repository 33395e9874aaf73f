//! E2E tracking tests: `openstreak init`, `open`, `ingest`, `show`.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

fn os_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("openstreak"));
    cmd.current_dir(dir);
    cmd.env_remove("OPENSTREAK_DB");
    cmd.env_remove("FORMAT");
    cmd.env("XDG_CONFIG_HOME", dir.join(".config"));
    cmd.env("OPENSTREAK_LOG", "error");
    cmd
}

fn init_project() -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    os_cmd(dir.path()).arg("init").assert().success();
    dir
}

fn json_out(dir: &Path, args: &[&str]) -> Value {
    let output = os_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("command should not crash");
    assert!(
        output.status.success(),
        "{args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid JSON")
}

fn open_at(dir: &Path, email: &str, post: &str, at: &str) -> Value {
    json_out(
        dir,
        &["open", "--email", email, "--newsletter", post, "--at", at],
    )
}

#[test]
fn init_creates_project_structure() {
    let dir = init_project();
    assert!(dir.path().join(".openstreak").is_dir());
    assert!(dir.path().join(".openstreak/config.toml").is_file());
    assert!(dir.path().join(".openstreak/openstreak.db").is_file());

    os_cmd(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    os_cmd(dir.path()).args(["init", "--force"]).assert().success();
}

#[test]
fn commands_before_init_point_at_init() {
    let dir = TempDir::new().expect("temp dir");
    let output = os_cmd(dir.path())
        .args(["show", "ana@example.com", "--json"])
        .output()
        .expect("show should not crash");
    assert_eq!(output.status.code(), Some(1));

    let err: Value = serde_json::from_slice(&output.stderr).expect("JSON error");
    assert_eq!(err["error"]["error_code"], "not_initialized");
    assert_eq!(err["error"]["code"], "E1001");
    assert!(
        err["error"]["suggestion"]
            .as_str()
            .is_some_and(|s| s.contains("openstreak init"))
    );
}

#[test]
fn consecutive_opens_build_a_streak() {
    let dir = init_project();

    let first = open_at(dir.path(), "ana@example.com", "post_1", "2025-02-10T08:00:00Z");
    assert_eq!(first["status"], "processed");
    assert_eq!(first["outcome"], "started");
    assert_eq!(first["ledger"]["current_streak"], 1);

    let second = open_at(dir.path(), "ana@example.com", "post_2", "2025-02-11T08:00:00Z");
    assert_eq!(second["outcome"], "continued");
    assert_eq!(second["ledger"]["current_streak"], 2);

    let same_day = open_at(dir.path(), "ana@example.com", "post_3", "2025-02-11T21:00:00Z");
    assert_eq!(same_day["outcome"], "same_day");
    assert_eq!(same_day["ledger"]["current_streak"], 2);

    let ledger = json_out(dir.path(), &["show", "ana@example.com"]);
    assert_eq!(ledger["email"], "ana@example.com");
    assert_eq!(ledger["current_streak"], 2);
    assert_eq!(ledger["longest_streak"], 2);
    assert_eq!(ledger["life"], 1);
    assert_eq!(ledger["last_opened_date"], "2025-02-11");
}

#[test]
fn sunday_then_monday_grants_a_life() {
    let dir = init_project();

    open_at(dir.path(), "ana@example.com", "post_1", "2025-02-09T10:00:00Z");
    let monday = open_at(dir.path(), "ana@example.com", "post_2", "2025-02-10T10:00:00Z");
    assert_eq!(monday["weekend_bonus"], true);
    assert_eq!(monday["ledger"]["current_streak"], 2);
    assert_eq!(monday["ledger"]["life"], 1);
}

#[test]
fn missing_field_is_rejected_with_status_two() {
    let dir = init_project();
    let output = os_cmd(dir.path())
        .args(["open", "--email", "  ", "--newsletter", "post_1", "--json"])
        .output()
        .expect("open should not crash");
    assert_eq!(output.status.code(), Some(2));

    let err: Value = serde_json::from_slice(&output.stderr).expect("JSON error");
    assert_eq!(err["error"]["error_code"], "missing_field");
    assert_eq!(err["error"]["code"], "E2001");
}

#[test]
fn unknown_reader_is_not_found() {
    let dir = init_project();
    let output = os_cmd(dir.path())
        .args(["show", "nobody@example.com", "--json"])
        .output()
        .expect("show should not crash");
    assert_eq!(output.status.code(), Some(1));

    let err: Value = serde_json::from_slice(&output.stderr).expect("JSON error");
    assert_eq!(err["error"]["error_code"], "reader_not_found");
}

#[test]
fn ingest_suppresses_retried_deliveries() {
    let dir = init_project();
    let payload = r#"{"email":"ameixa@email.com","id":"post_12345","utm_source":"tiktok","opened_at":"2025-02-12T08:00:00Z"}"#;
    let stream = format!("{payload}\n{payload}\n{{\"id\":\"post_1\"}}\n");

    let output = os_cmd(dir.path())
        .args(["ingest", "--json"])
        .write_stdin(stream)
        .output()
        .expect("ingest should not crash");
    assert!(
        output.status.success(),
        "ingest failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let summary: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(summary["processed"], 1);
    assert_eq!(summary["duplicates"], 1);
    assert_eq!(summary["rejected"], 1);
    assert_eq!(summary["failed"], 0);

    let openings = json_out(dir.path(), &["openings", "ameixa@email.com"]);
    let openings = openings.as_array().expect("array");
    assert_eq!(openings.len(), 1);
    assert_eq!(openings[0]["resource_id"], "post_12345");
    assert_eq!(openings[0]["utm_source"], "tiktok");
    assert_eq!(openings[0]["utm_medium"], "");
}

#[test]
fn ingest_reads_from_a_file() {
    let dir = init_project();
    let file = dir.path().join("hooks.jsonl");
    std::fs::write(
        &file,
        concat!(
            r#"{"email":"ana@example.com","id":"post_1","opened_at":"2025-02-10T08:00:00Z"}"#,
            "\n",
            r#"{"email":"ana@example.com","id":"post_2","opened_at":"2025-02-11T08:00:00Z"}"#,
            "\n",
        ),
    )
    .expect("write hooks file");

    os_cmd(dir.path())
        .args(["ingest", "--file"])
        .arg(&file)
        .env("FORMAT", "text")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "processed=2 duplicates=0 rejected=0 failed=0",
        ));

    let ledger = json_out(dir.path(), &["show", "ana@example.com"]);
    assert_eq!(ledger["current_streak"], 2);
}

#[test]
fn text_output_is_tab_separated() {
    let dir = init_project();
    open_at(dir.path(), "ana@example.com", "post_1", "2025-02-10T08:00:00Z");

    os_cmd(dir.path())
        .args(["show", "ana@example.com"])
        .env("FORMAT", "text")
        .assert()
        .success()
        .stdout("ana@example.com\t1\t1\t1\t2025-02-10\n");
}

#[test]
fn backdated_open_is_reported_out_of_order() {
    let dir = init_project();
    open_at(dir.path(), "ana@example.com", "post_1", "2025-02-12T09:00:00Z");

    let late = open_at(dir.path(), "ana@example.com", "post_2", "2025-02-05T09:00:00Z");
    assert_eq!(late["status"], "out_of_order");
    assert_eq!(late["last_opened_at"], "2025-02-12T09:00:00");

    let ledger = json_out(dir.path(), &["show", "ana@example.com"]);
    assert_eq!(ledger["current_streak"], 1);
    assert_eq!(ledger["life"], 1);
    assert_eq!(ledger["last_opened_date"], "2025-02-12");
}
