//! End-to-end checks of the stdout wire protocol and JSON output, driving the
//! built binary as a real subprocess against files under a temp directory.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn fabric_cmd() -> Command {
    Command::cargo_bin("fabric-cli").expect("binary should build")
}

fn routes_file(dir: &tempfile::TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("routes.txt");
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    path
}

#[test]
fn single_route_prints_ok_and_summary() {
    let dir = tempfile::tempdir().unwrap();
    let routes = routes_file(&dir, "1.11\n");

    fabric_cmd()
        .arg(&routes)
        .arg("--size")
        .arg("10")
        .assert()
        .success()
        .stdout(predicate::str::contains(">> ROUTE 1.11"))
        .stdout(predicate::str::contains("REPACK OK:"))
        .stdout(predicate::str::contains("=== Fabric Summary ==="));
}

#[test]
fn clear_after_route_reports_zero_active_routes() {
    let dir = tempfile::tempdir().unwrap();
    let routes = routes_file(&dir, "1.11.12\n!1\n");

    fabric_cmd()
        .arg(&routes)
        .arg("--size")
        .arg("10")
        .assert()
        .success()
        .stdout(predicate::str::contains(">> CLEAR 1"))
        .stdout(predicate::str::contains("routes_active=0"));
}

#[test]
fn strict_stability_rejects_a_repack_when_two_demands_contend_for_one_prior_spine() {
    let dir = tempfile::tempdir().unwrap();
    let routes = routes_file(&dir, "1.1\n2.3\n");
    let previous_path = dir.path().join("previous.json");
    std::fs::write(&previous_path, r#"{"s3_port_spine": [-1, 0, -1, 0, -1]}"#).unwrap();

    fabric_cmd()
        .arg(&routes)
        .arg("--size")
        .arg("2")
        .arg("--strict-stability")
        .arg("--previous-state")
        .arg(&previous_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("FAIL:"))
        .stdout(predicate::str::contains("ROLLBACK:"));
}

#[test]
fn locks_file_with_one_malformed_record_still_loads_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let routes = routes_file(&dir, "1.1\n");
    let locks_path = dir.path().join("locks.json");
    std::fs::write(
        &locks_path,
        r#"[{"input":1,"egress":0,"spine":3},{"input":2,"spine":1}]"#,
    )
    .unwrap();
    let json_path = dir.path().join("out.json");

    fabric_cmd()
        .arg(&routes)
        .arg("--size")
        .arg("4")
        .arg("--locks")
        .arg(&locks_path)
        .arg("--json")
        .arg(&json_path)
        .assert()
        .success();

    let body = std::fs::read_to_string(&json_path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    let conflicts = parsed["lock_conflicts"].as_array().unwrap();
    assert!(conflicts.iter().any(|c| c["reason"] == "RANGE"));
}

#[test]
fn malformed_route_token_is_reported_without_aborting_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let routes = routes_file(&dir, "not-a-command\n1.11\n");

    fabric_cmd()
        .arg(&routes)
        .arg("--size")
        .arg("10")
        .assert()
        .success()
        .stdout(predicate::str::contains("FAIL:"))
        .stdout(predicate::str::contains(">> ROUTE 1.11"));
}

#[test]
fn json_output_file_is_written_with_the_final_committed_state() {
    let dir = tempfile::tempdir().unwrap();
    let routes = routes_file(&dir, "1.11\n");
    let json_path = dir.path().join("out.json");

    fabric_cmd()
        .arg(&routes)
        .arg("--size")
        .arg("10")
        .arg("--json")
        .arg(&json_path)
        .assert()
        .success();

    let body = std::fs::read_to_string(&json_path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed["N"], 10);
    assert_eq!(parsed["s3_port_owner"][11], 1);
    assert_ne!(parsed["s3_port_spine"][11], -1);
}

#[test]
fn radix_below_two_is_rejected_before_touching_the_routes_file() {
    let dir = tempfile::tempdir().unwrap();
    let routes = routes_file(&dir, "1.11\n");

    fabric_cmd()
        .arg(&routes)
        .arg("--size")
        .arg("1")
        .assert()
        .failure()
        .code(1);
}

#[test]
fn missing_routes_file_fails_with_exit_code_one() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist.txt");

    fabric_cmd().arg(&missing).assert().failure().code(1);
}
