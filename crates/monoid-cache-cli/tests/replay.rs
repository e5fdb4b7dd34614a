//! Integration tests for `monoid-cache replay`

use assert_cmd::Command;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;

#[allow(deprecated)]
fn monoid_cache(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("monoid-cache").expect("Failed to find monoid-cache binary");
    cmd.env("HOME", home.path())
        .env_remove("MONOID_CACHE_DIR")
        .env_remove("MONOID_CACHE_CONFIG")
        .env_remove("MONOID_CACHE_MAX_SNAPSHOTS")
        .env_remove("MONOID_CACHE_MAX_WINDOW_END")
        .env_remove("MONOID_CACHE_LOG")
        .current_dir(home.path());
    cmd
}

fn write_script(dir: &TempDir, script: &Value) -> std::path::PathBuf {
    let path = dir.path().join("script.json");
    std::fs::write(&path, serde_json::to_string_pretty(script).unwrap()).unwrap();
    path
}

fn job(id: &str) -> Value {
    json!({ "__typename": "Job", "id": id })
}

fn read_lines(stdout: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn test_replay_jobs_paging() {
    let home = TempDir::new().unwrap();
    let script = write_script(
        &home,
        &json!({
            "steps": [
                { "op": "write", "type": "Workspace", "id": "ws1", "field": "jobs",
                  "args": { "offset": 0, "limit": 2, "jobType": "scan" },
                  "response": { "jobs": [job("j1"), job("j2")], "numJobs": 3 } },
                { "op": "write", "type": "Workspace", "id": "ws1", "field": "jobs",
                  "args": { "offset": 2, "limit": 2, "jobType": "scan" },
                  "response": { "jobs": [job("j3")], "numJobs": 3 } },
                { "op": "read", "type": "Workspace", "id": "ws1", "field": "jobs",
                  "args": { "offset": 0, "limit": 4, "jobType": "scan" } },
                { "op": "read", "type": "Workspace", "id": "ws1", "field": "jobs",
                  "args": { "offset": 0, "limit": 4, "jobType": "discover" } }
            ]
        }),
    );

    let output = monoid_cache(&home).arg("replay").arg(&script).output().unwrap();
    assert!(output.status.success());

    let lines = read_lines(&output.stdout);
    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[0],
        json!({
            "step": 2,
            "status": "complete",
            "data": {
                "jobs": [
                    { "__ref": "Job:j1" },
                    { "__ref": "Job:j2" },
                    { "__ref": "Job:j3" }
                ],
                "numJobs": 3
            }
        })
    );
    assert_eq!(lines[1], json!({ "step": 3, "status": "miss", "data": null }));
}

#[test]
fn test_replay_stats() {
    let home = TempDir::new().unwrap();
    let script = write_script(
        &home,
        &json!({
            "steps": [
                { "op": "write", "type": "Workspace", "id": "ws1", "field": "requests",
                  "args": { "offset": 0, "limit": 5 }, "response": null },
                { "op": "read", "type": "Workspace", "id": "ws1", "field": "requests",
                  "args": { "offset": 0, "limit": 5 } }
            ]
        }),
    );

    monoid_cache(&home)
        .arg("replay")
        .arg(&script)
        .arg("--stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\":\"miss\""))
        .stderr(predicate::str::contains("noop merges: 1"))
        .stderr(predicate::str::contains("misses: 1"));
}

#[test]
fn test_replay_snapshot_bound() {
    let home = TempDir::new().unwrap();
    let write = |id: &str| {
        json!({ "op": "write", "type": "Workspace", "id": id, "field": "requests",
                "args": { "offset": 0, "limit": 1 },
                "response": { "requests": [{ "__typename": "Request", "id": "r1" }],
                              "numRequests": 1 } })
    };
    let read = |id: &str| {
        json!({ "op": "read", "type": "Workspace", "id": id, "field": "requests",
                "args": { "offset": 0, "limit": 1 } })
    };
    let script = write_script(
        &home,
        &json!({ "steps": [write("ws1"), write("ws2"), read("ws1"), read("ws2")] }),
    );

    let output = monoid_cache(&home)
        .args(["--max-snapshots", "1", "replay"])
        .arg(&script)
        .output()
        .unwrap();
    assert!(output.status.success());

    let statuses: Vec<Value> = read_lines(&output.stdout)
        .into_iter()
        .map(|line| line["status"].clone())
        .collect();
    assert_eq!(statuses, vec![json!("miss"), json!("complete")]);
}

#[test]
fn test_replay_malformed_response_fails() {
    let home = TempDir::new().unwrap();
    let script = write_script(
        &home,
        &json!({
            "steps": [
                { "op": "write", "type": "Workspace", "id": "ws1", "field": "requests",
                  "args": { "offset": 0, "limit": 1 },
                  "response": { "requests": "not a list" } }
            ]
        }),
    );

    monoid_cache(&home)
        .arg("replay")
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("step 0"))
        .stderr(predicate::str::contains("requests"));
}

#[test]
fn test_replay_window_bound_from_flag() {
    let home = TempDir::new().unwrap();
    let script = write_script(
        &home,
        &json!({
            "steps": [
                { "op": "write", "type": "Workspace", "id": "ws1", "field": "jobs",
                  "args": { "offset": 95, "limit": 10 },
                  "response": { "jobs": [job("j1"), job("j2"), job("j3"), job("j4"),
                                         job("j5"), job("j6")], "numJobs": 200 } }
            ]
        }),
    );

    monoid_cache(&home)
        .args(["--max-window-end", "100", "replay"])
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("beyond the maximum of 100"));
}

#[test]
fn test_replay_missing_script() {
    let home = TempDir::new().unwrap();
    monoid_cache(&home)
        .args(["replay", "does-not-exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read script"));
}
