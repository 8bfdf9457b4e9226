//! Integration tests for event logging and the outbox sync path via CLI.
//!
//! These cover the dual-backend flow end to end:
//! - `dl log ...` appends events through the selected backend
//! - the background relay mirrors SQLite appends to events.jsonl
//! - `dl sync` drains anything still pending
//! - the SQLite backend seeds itself from existing flat files

mod common;

use common::TestEnv;
use predicates::prelude::*;
use std::fs;

#[test]
fn test_log_quick_returns_event_id() {
    let env = TestEnv::new();

    env.dl()
        .args(["log", "quick", "water", "--value", "1.5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"logged\""))
        .stdout(predicate::str::contains("\"type\":\"quick_log\""));
}

#[test]
fn test_logged_event_reaches_jsonl_mirror() {
    let env = TestEnv::new();

    env.dl()
        .args(["log", "habit", "h1", "--notes", "morning run"])
        .assert()
        .success();

    // The background relay finishes before the process exits.
    let raw = fs::read_to_string(env.files_dir().join("events.jsonl")).unwrap();
    let lines: Vec<_> = raw.lines().collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("habit_completed"));

    // Nothing left in the outbox afterwards.
    let synced = env.dl_json(&["sync"]);
    assert_eq!(synced["synced"], 0);
}

#[test]
fn test_events_reads_back_with_range_and_type_filter() {
    let env = TestEnv::new();

    env.dl().args(["log", "quick", "water"]).assert().success();
    env.dl().args(["log", "task", "t1"]).assert().success();

    let all = env.dl_json(&["events"]);
    assert_eq!(all["count"], 2);

    let tasks = env.dl_json(&["events", "--type", "task"]);
    assert_eq!(tasks["count"], 1);
    assert_eq!(tasks["events"][0]["payload"]["kind"], "task_completed");

    // A range in the past excludes everything.
    let none = env.dl_json(&[
        "events",
        "--from",
        "2000-01-01",
        "--to",
        "2000-12-31",
    ]);
    assert_eq!(none["count"], 0);
}

#[test]
fn test_stats_counts_by_type() {
    let env = TestEnv::new();

    env.dl().args(["log", "quick", "water"]).assert().success();
    env.dl().args(["log", "quick", "coffee"]).assert().success();
    env.dl()
        .args(["log", "pomodoro", "--focus-secs", "1500"])
        .assert()
        .success();

    let stats = env.dl_json(&["stats"]);
    assert_eq!(stats["counts"]["quick_log"], 2);
    assert_eq!(stats["counts"]["pomodoro_completed"], 1);
}

#[test]
fn test_jsonl_backend_writes_events_directly() {
    let env = TestEnv::new();

    env.dl()
        .args(["-b", "jsonl", "log", "quick", "water"])
        .assert()
        .success();

    assert!(env.files_dir().join("events.jsonl").exists());

    let events = env.dl_json(&["-b", "jsonl", "events"]);
    assert_eq!(events["count"], 1);

    env.dl()
        .args(["-b", "jsonl", "sync", "-H"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to sync"));
}

#[test]
fn test_sqlite_seeds_from_existing_flat_files() {
    let env = TestEnv::new();

    // Data written by the JSONL backend only.
    env.dl()
        .args(["-b", "jsonl", "log", "quick", "water"])
        .assert()
        .success();
    env.dl()
        .args(["-b", "jsonl", "habit", "add", "run"])
        .assert()
        .success();

    // First SQLite read pulls it in.
    let events = env.dl_json(&["events"]);
    assert_eq!(events["count"], 1);

    let habits = env.dl_json(&["habit", "list"]);
    assert_eq!(habits["count"], 1);
    assert_eq!(habits["habits"][0]["name"], "run");
}

#[test]
fn test_invalid_event_type_fails() {
    let env = TestEnv::new();

    env.dl()
        .args(["events", "--type", "nonsense"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid event type"));
}

#[test]
fn test_unknown_backend_fails() {
    let env = TestEnv::new();

    env.dl()
        .args(["-b", "redis", "events"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown storage plugin"));
}
