//! Integration tests for the eventlog binary: record/query/stats, exit codes, config precedence.

use std::fs;
use std::path::Path;
use std::process::Command;

/// Run eventlog in `dir` with the given args and env. Returns (success, stdout, stderr).
fn run_eventlog(dir: &Path, args: &[&str], env_extra: &[(&str, &str)]) -> (bool, String, String) {
    let exe = env!("CARGO_BIN_EXE_eventlog");
    let mut cmd = Command::new(exe);
    cmd.current_dir(dir).args(args);
    for key in ["EVENTLOG_CONFIG", "EVENTLOG_DB", "EVENTLOG_DB_PATH", "EVENTLOG_BATCH_SIZE"] {
        cmd.env_remove(key);
    }
    for (k, v) in env_extra {
        cmd.env(k, v);
    }
    let out = cmd.output().expect("run eventlog");
    let stdout = String::from_utf8_lossy(&out.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&out.stderr).into_owned();
    (out.status.success(), stdout, stderr)
}

const INPUT: &str = "\
2023-08-14T12:00:00Z | 42 | page_view | {\"page\":\"/home\"}
2023-08-14T10:00:00Z | 42 | login | {\"ip\":\"10.0.0.1\"}
garbage line
2023-08-14T11:00:00Z | 7 | login | {\"ip\":\"10.0.0.2\"}
2023-08-14T13:00:00+00:00 | 42 | logout | null
";

fn recorded_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("input.txt"), INPUT).expect("write input");
    let (ok, stdout, stderr) = run_eventlog(
        dir.path(),
        &["--no-config", "--db", "events.db", "record", "input.txt"],
        &[],
    );
    assert!(ok, "record failed: {}", stderr);
    assert!(
        stdout.contains("Successfully recorded 4 events"),
        "stdout: {}",
        stdout
    );
    assert!(stdout.contains("Skipped 1 invalid lines"), "stdout: {}", stdout);
    dir
}

#[test]
fn record_then_query_prints_canonical_lines_in_order() {
    let dir = recorded_dir();
    let (ok, stdout, stderr) = run_eventlog(
        dir.path(),
        &["--no-config", "--db", "events.db", "query", "42"],
        &[],
    );
    assert!(ok, "stderr: {}", stderr);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines,
        vec![
            "2023-08-14T10:00:00Z | 42 | login | {\"ip\":\"10.0.0.1\"}",
            "2023-08-14T12:00:00Z | 42 | page_view | {\"page\":\"/home\"}",
            "2023-08-14T13:00:00Z | 42 | logout | null",
        ]
    );
    assert!(
        stderr.contains("Query completed: 3 events"),
        "stderr: {}",
        stderr
    );
}

#[test]
fn query_with_type_filter() {
    let dir = recorded_dir();
    let (ok, stdout, _) = run_eventlog(
        dir.path(),
        &["--no-config", "--db", "events.db", "query", "42", "--type", "login"],
        &[],
    );
    assert!(ok);
    assert_eq!(
        stdout.trim_end(),
        "2023-08-14T10:00:00Z | 42 | login | {\"ip\":\"10.0.0.1\"}"
    );
}

#[test]
fn query_with_time_range() {
    let dir = recorded_dir();
    let (ok, stdout, _) = run_eventlog(
        dir.path(),
        &[
            "--no-config",
            "--db",
            "events.db",
            "query",
            "42",
            "--from",
            "2023-08-14T11:00:00Z",
            "--to",
            "2023-08-14T12:00:00Z",
        ],
        &[],
    );
    assert!(ok);
    assert_eq!(stdout.lines().count(), 1, "stdout: {}", stdout);
    assert!(stdout.contains("page_view"));
}

#[test]
fn query_unknown_user_prints_nothing() {
    let dir = recorded_dir();
    let (ok, stdout, stderr) = run_eventlog(
        dir.path(),
        &["--no-config", "--db", "events.db", "query", "1000"],
        &[],
    );
    assert!(ok);
    assert!(stdout.is_empty(), "stdout: {}", stdout);
    assert!(stderr.contains("Query completed: 0 events"), "stderr: {}", stderr);
}

#[test]
fn query_inverted_range_fails_without_creating_db() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (ok, stdout, stderr) = run_eventlog(
        dir.path(),
        &[
            "--no-config",
            "--db",
            "events.db",
            "query",
            "42",
            "--from",
            "2023-08-15T00:00:00Z",
            "--to",
            "2023-08-14T00:00:00Z",
        ],
        &[],
    );
    assert!(!ok);
    assert!(stdout.is_empty());
    assert!(stderr.contains("Invalid time range"), "stderr: {}", stderr);
    assert!(!dir.path().join("events.db").exists());
}

#[test]
fn query_unparseable_from_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (ok, _, stderr) = run_eventlog(
        dir.path(),
        &["--no-config", "query", "42", "--from", "yesterday"],
        &[],
    );
    assert!(!ok);
    assert!(stderr.contains("--from"), "stderr: {}", stderr);
}

#[test]
fn record_missing_file_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (ok, _, stderr) = run_eventlog(
        dir.path(),
        &["--no-config", "record", "does_not_exist.txt"],
        &[],
    );
    assert!(!ok);
    assert!(stderr.contains("does not exist"), "stderr: {}", stderr);
}

#[test]
fn stats_reports_counts_and_range() {
    let dir = recorded_dir();
    let (ok, stdout, stderr) =
        run_eventlog(dir.path(), &["--no-config", "--db", "events.db", "stats"], &[]);
    assert!(ok, "stderr: {}", stderr);
    assert!(stdout.contains("total_events=4"), "stdout: {}", stdout);
    assert!(stdout.contains("unique_users=2"), "stdout: {}", stdout);
    assert!(stdout.contains("from=2023-08-14T10:00:00Z"), "stdout: {}", stdout);
    assert!(stdout.contains("to=2023-08-14T13:00:00Z"), "stdout: {}", stdout);
}

#[test]
fn no_command_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (ok, _, _) = run_eventlog(dir.path(), &["--no-config"], &[]);
    assert!(!ok);
}

#[test]
fn validate_config_no_config_uses_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (ok, stdout, stderr) = run_eventlog(dir.path(), &["--validate-config", "--no-config"], &[]);
    assert!(ok, "stderr: {}", stderr);
    assert!(stdout.contains("db_path=events.db"), "stdout: {}", stdout);
    assert!(stdout.contains("batch_size=10000"), "stdout: {}", stdout);
    assert!(stdout.contains("journal_mode=WAL"), "stdout: {}", stdout);
}

#[test]
fn validate_config_env_db_path_overridden_by_cli() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (ok, stdout, _) = run_eventlog(
        dir.path(),
        &["--validate-config", "--no-config", "--db", "/cli/events.db"],
        &[("EVENTLOG_DB_PATH", "/env/events.db")],
    );
    assert!(ok);
    assert!(
        stdout.contains("db_path=/cli/events.db"),
        "CLI should win: {}",
        stdout
    );
}

#[test]
fn validate_config_env_override_with_no_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (ok, stdout, _) = run_eventlog(
        dir.path(),
        &["--validate-config", "--no-config"],
        &[("EVENTLOG_DB_PATH", "/env/events.db"), ("EVENTLOG_BATCH_SIZE", "250")],
    );
    assert!(ok);
    assert!(stdout.contains("db_path=/env/events.db"), "stdout: {}", stdout);
    assert!(stdout.contains("batch_size=250"), "stdout: {}", stdout);
}

#[test]
fn validate_config_file_then_env_then_cli() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("custom.toml");
    fs::write(
        &path,
        r#"
db_path = "/file/events.db"
batch_size = 500

[sqlite]
journal_mode = "DELETE"
synchronous = "FULL"
"#,
    )
    .expect("write config");
    let path_str = path.to_str().expect("utf-8 path");

    let (ok, stdout, stderr) = run_eventlog(dir.path(), &["--validate-config", "--config", path_str], &[]);
    assert!(ok, "stderr: {}", stderr);
    assert!(stdout.contains("db_path=/file/events.db"), "stdout: {}", stdout);
    assert!(stdout.contains("batch_size=500"), "stdout: {}", stdout);
    assert!(stdout.contains("journal_mode=DELETE"), "stdout: {}", stdout);
    assert!(stdout.contains("synchronous=FULL"), "stdout: {}", stdout);

    let (ok, stdout, _) = run_eventlog(
        dir.path(),
        &["--validate-config", "--config", path_str, "--batch-size", "7"],
        &[("EVENTLOG_BATCH_SIZE", "99")],
    );
    assert!(ok);
    assert!(stdout.contains("batch_size=7"), "stdout: {}", stdout);
}

#[test]
fn default_config_file_in_working_dir_is_loaded() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("eventlog.toml"), "batch_size = 42\n").expect("write config");
    let (ok, stdout, _) = run_eventlog(dir.path(), &["--validate-config"], &[]);
    assert!(ok);
    assert!(stdout.contains("batch_size=42"), "stdout: {}", stdout);
}

#[test]
fn zero_batch_size_fails_validation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (ok, _, stderr) = run_eventlog(
        dir.path(),
        &["--validate-config", "--no-config", "--batch-size", "0"],
        &[],
    );
    assert!(!ok);
    assert!(stderr.contains("batch_size"), "stderr: {}", stderr);
}

#[test]
fn invalid_batch_size_in_config_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bad.toml");
    fs::write(&path, "batch_size = \"lots\"\n").expect("write config");
    let (ok, _, stderr) = run_eventlog(
        dir.path(),
        &["--validate-config", "--config", path.to_str().expect("utf-8 path")],
        &[],
    );
    assert!(!ok);
    assert!(stderr.contains("config error"), "stderr: {}", stderr);
}

#[test]
fn missing_config_file_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (ok, _, stderr) = run_eventlog(
        dir.path(),
        &["--validate-config", "--config", "nope.toml"],
        &[],
    );
    assert!(!ok);
    assert!(stderr.contains("config file not found"), "stderr: {}", stderr);
}
