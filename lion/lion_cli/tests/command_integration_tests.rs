use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn lion_cli() -> Command {
    Command::cargo_bin("lion_cli").unwrap()
}

#[test]
fn test_config_prints_defaults() {
    lion_cli()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[pool]"))
        .stdout(predicate::str::contains("max_size = 10"))
        .stdout(predicate::str::contains("addr = \"127.0.0.1:8003\""));
}

#[test]
fn test_config_reads_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("lion.toml");
    fs::write(&path, "[pool]\ninitial_size = 1\nmax_size = 3\n").unwrap();

    lion_cli()
        .arg("--config")
        .arg(&path)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("initial_size = 1"))
        .stdout(predicate::str::contains("max_size = 3"));
}

#[test]
fn test_config_rejects_bad_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("lion.toml");
    fs::write(&path, "[pool]\nmax_size = \"many\"\n").unwrap();

    lion_cli()
        .arg("--config")
        .arg(&path)
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse config"));
}

#[test]
fn test_exercise_with_spawned_server() {
    let output = lion_cli()
        .args([
            "exercise",
            "--spawn-server",
            "--addr",
            "127.0.0.1:0",
            "--clients",
            "4",
            "--rounds",
            "5",
            "--json",
        ])
        .output()
        .unwrap();

    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["pings_ok"], 20);
    assert_eq!(report["ping_failures"], 0);
    assert_eq!(report["idle_after_destroy"], 0);
    assert!(report["idle_before_destroy"].as_u64().unwrap() <= 10);
    // Every connection was either disposed by the pool or dropped by validation
    let stats = &report["stats"];
    assert_eq!(
        stats["created"].as_u64().unwrap(),
        stats["disposed"].as_u64().unwrap() + stats["discarded"].as_u64().unwrap()
    );
}

#[test]
fn test_exercise_human_report() {
    lion_cli()
        .args([
            "exercise",
            "--spawn-server",
            "--addr",
            "127.0.0.1:0",
            "--clients",
            "2",
            "--rounds",
            "3",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("pings ok: 6, failures: 0"))
        .stdout(predicate::str::contains("idle after destroy: 0"));
}

#[test]
fn test_exercise_rejects_invalid_capacity() {
    lion_cli()
        .args([
            "exercise",
            "--spawn-server",
            "--addr",
            "127.0.0.1:0",
            "--initial",
            "5",
            "--max",
            "2",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid pool capacity"));
}

#[test]
fn test_exercise_fails_without_server() {
    // Bind then drop a listener to get an address nobody is listening on
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    lion_cli()
        .args(["exercise", "--addr", &addr.to_string(), "--initial", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to create connection pool"));
}
