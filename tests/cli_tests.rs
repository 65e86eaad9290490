#![cfg(feature = "cli_api")]

use assert_cmd::Command;
use predicates::str::contains as str_contains;
use std::io::Write;
use tempfile::NamedTempFile;

#[allow(deprecated)]
fn run_cli(script: &str) -> assert_cmd::assert::Assert {
    let mut cmd = Command::cargo_bin("cli").expect("cli binary");
    cmd.env_remove("CAPACITY_PLANNER_DB")
        .env_remove("CAPACITY_PLANNER_CONFIG")
        .write_stdin(script.to_string())
        .assert()
}

const SEED: &str = "today 2025-06-02\n\
assignee add Alice\n\
assignee add Bob 2.5\n\
holiday add 2025-06-04\n\
project add Apollo Launch\n";

#[test]
fn cli_counts_business_days_with_holidays() {
    let script = format!(
        "{SEED}holiday add-for Alice 2025-06-05\nbdays 2025-06-02 2025-06-06\nbdays 2025-06-02 2025-06-06 Alice\nquit\n"
    );
    let assert = run_cli(&script).success();
    let output = String::from_utf8_lossy(&assert.get_output().stdout);
    assert!(output.contains("Business days 2025-06-02..2025-06-06: 4"), "{output}");
    assert!(output.contains("Business days 2025-06-02..2025-06-06: 3"), "{output}");
}

#[test]
fn cli_reports_allocation() {
    let script = format!(
        "{SEED}task add 1 Design Alice 2 2025-06-06\ntask add 1 Build Bob 4 2025-06-06\ntask add 1 Stray Ghost 1 2025-06-06\nreport 2025-06-02 2025-06-06\nquit\n"
    );
    run_cli(&script)
        .success()
        .stdout(str_contains("Added task 3."))
        .stdout(str_contains("200%"))
        .stdout(str_contains("Overallocated"))
        .stdout(str_contains("Tasks with unknown assignee: 3"));
}

#[test]
fn cli_classifies_task_rag() {
    let script = format!(
        "{SEED}task add 1 Launch Alice 10 2025-06-03\ntask taken 1 4\nrag 1\nrefresh\ntask list\nquit\n"
    );
    run_cli(&script)
        .success()
        .stdout(str_contains("Updated task 1."))
        .stdout(str_contains("Task 1: Red"))
        .stdout(str_contains("Stored RAG Green is out of date."))
        .stdout(str_contains("Evaluated 1 task(s), 1 changed."))
        .stdout(str_contains("task 1: Green -> Red"));
}

#[test]
fn cli_refuses_to_delete_referenced_assignee() {
    let script = format!("{SEED}task add 1 Design Alice 2 2025-06-06\nassignee delete 1\nquit\n");
    run_cli(&script)
        .success()
        .stdout(str_contains("referenced by 1 task(s)"));
}

#[test]
fn cli_imports_csv() {
    let mut file = NamedTempFile::new().expect("create temp file");
    writeln!(file, "Task Name,Assignee,Days Assigned,Due Date,Status").unwrap();
    writeln!(file, "One,Alice,1,2025-06-06,Completed").unwrap();
    writeln!(file, "Two,Alice,1,2025-06-06,In Progress").unwrap();
    let path = file.path().to_string_lossy().to_string();
    let script = format!("{SEED}import csv 1 {path}\nproject list\nquit\n");
    run_cli(&script)
        .success()
        .stdout(str_contains("Imported 2 task(s) into project 1 (progress 50%)."))
        .stdout(str_contains("Apollo Launch"));
}

#[test]
fn cli_save_and_load_json_round_trip() {
    let tmp = NamedTempFile::new().expect("create temp file");
    let path = tmp.path().to_string_lossy().to_string();
    let script = format!(
        "{SEED}task add 1 Persisted Alice 2 2025-06-06\nsave json {path}\ntask add 1 Temporary Bob 1 2025-06-06\nload json {path}\ntask list\nquit\n"
    );
    let assert = run_cli(&script).success();
    let output = String::from_utf8_lossy(&assert.get_output().stdout);
    assert!(output.contains("Data loaded from"), "{output}");
    let after_reload = output.split("Data loaded from").last().unwrap_or_default();
    assert!(after_reload.contains("Persisted"));
    assert!(
        !after_reload.contains("Temporary"),
        "temporary task should not appear after reload:\n{after_reload}"
    );
}

#[test]
fn cli_rejects_bad_input() {
    run_cli("holiday add 2025-06-10 2025-06-01\nassignee add Idle 0\nfrobnicate\nquit\n")
        .success()
        .stdout(str_contains("holiday end date 2025-06-01 is before its start date"))
        .stdout(str_contains("invalid working_days_per_week"))
        .stdout(str_contains("Unknown command 'frobnicate'"));
}
