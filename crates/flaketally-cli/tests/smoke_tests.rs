//! Smoke tests for the flaketally CLI
//!
//! These tests drive the real binary against stub test commands.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin until assert_cmd is updated
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get a command for the flaketally binary
fn flaketally() -> Command {
    Command::cargo_bin("flaketally").expect("flaketally binary should exist")
}

/// Report files written into `dir`
fn reports(dir: &TempDir) -> Vec<std::path::PathBuf> {
    let mut paths: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("test_harness_output_") && n.ends_with(".txt"))
        })
        .collect();
    paths.sort();
    paths
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    flaketally()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_flag() {
    flaketally()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("show"));
}

#[test]
fn test_no_args_fails() {
    flaketally().assert().code(1);
}

#[test]
fn test_run_subcommand_help() {
    flaketally()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--iterations"))
        .stdout(predicate::str::contains("--grep"));
}

#[test]
fn test_zero_iterations_rejected() {
    flaketally()
        .args(["run", "-n", "0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--iterations"));
}

#[test]
fn test_unknown_flag_exits_one() {
    flaketally()
        .args(["run", "--no-such-flag"])
        .assert()
        .code(1);
}

// ============================================================================
// Run Tests
// ============================================================================

#[cfg(unix)]
mod run_tests {
    use super::*;

    #[test]
    fn test_stable_test_writes_empty_report() {
        let dir = TempDir::new().unwrap();
        flaketally()
            .args(["-q", "run", "-n", "4", "-o"])
            .arg(dir.path())
            .args(["--", "sh", "-c", r#"echo '{"failures": []}'"#])
            .assert()
            .success()
            .stdout(predicate::str::contains("Report written to"));

        let written = reports(&dir);
        assert_eq!(written.len(), 1);
        assert_eq!(fs::read_to_string(&written[0]).unwrap(), "");
    }

    #[test]
    fn test_always_failing_test_counts_every_iteration() {
        let dir = TempDir::new().unwrap();
        flaketally()
            .args(["-q", "run", "-o"])
            .arg(dir.path())
            .args([
                "--",
                "sh",
                "-c",
                r#"echo '{"failures": [{"fullTitle": "Panel copies URL", "err": {"message": "boom"}}]}'; exit 1"#,
            ])
            .assert()
            .success();

        let written = reports(&dir);
        assert_eq!(written.len(), 1);
        assert_eq!(
            fs::read_to_string(&written[0]).unwrap(),
            "Panel copies URL: 32\n"
        );
    }

    #[test]
    fn test_verbose_prints_every_iteration() {
        let dir = TempDir::new().unwrap();
        flaketally()
            .args(["-v", "--color", "never", "run", "-n", "2", "-o"])
            .arg(dir.path())
            .args(["--", "sh", "-c", r#"echo '{"failures": []}'"#])
            .assert()
            .success()
            .stderr(predicate::str::contains("PASS iteration #0"))
            .stderr(predicate::str::contains("PASS iteration #1"));
    }

    #[test]
    fn test_garbage_output_is_skipped_not_fatal() {
        let dir = TempDir::new().unwrap();
        flaketally()
            .args(["-q", "run", "-n", "3", "-o"])
            .arg(dir.path())
            .args(["--", "sh", "-c", "echo 'npm ERR! missing script: test'"])
            .assert()
            .success();

        assert_eq!(reports(&dir).len(), 1);
    }

    #[test]
    fn test_missing_program_is_skipped_not_fatal() {
        let dir = TempDir::new().unwrap();
        flaketally()
            .args(["-q", "run", "-n", "2", "-o"])
            .arg(dir.path())
            .args(["--", "flaketally-no-such-runner"])
            .assert()
            .success();
    }

    #[test]
    fn test_fail_on_flaky_exit_code() {
        let dir = TempDir::new().unwrap();
        flaketally()
            .args(["-q", "run", "-n", "2", "--fail-on-flaky", "-o"])
            .arg(dir.path())
            .args(["--", "sh", "-c", r#"echo '{"failures": [{"fullTitle": "a"}]}'"#])
            .assert()
            .failure()
            .stderr(predicate::str::contains("1 test(s) failed"));
    }

    #[test]
    fn test_json_outcome() {
        let dir = TempDir::new().unwrap();
        let output = flaketally()
            .args(["run", "-n", "2", "--json", "-o"])
            .arg(dir.path())
            .args(["--", "sh", "-c", r#"echo '{"failures": [{"fullTitle": "a"}]}'"#])
            .output()
            .unwrap();
        assert!(output.status.success());

        let outcome: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(outcome["tally"]["counts"]["a"], 2);
        assert_eq!(outcome["tally"]["iterations"], 2);
        assert_eq!(outcome["decode_failures"], 0);
    }

    #[test]
    fn test_libtest_format() {
        let dir = TempDir::new().unwrap();
        let script = r#"echo '{ "type": "test", "name": "net::times_out", "event": "failed" }'"#;
        flaketally()
            .args(["-q", "run", "-n", "2", "--format", "libtest", "-o"])
            .arg(dir.path())
            .args(["--", "sh", "-c", script])
            .assert()
            .success();

        let written = reports(&dir);
        assert_eq!(
            fs::read_to_string(&written[0]).unwrap(),
            "net::times_out: 2\n"
        );
    }

    #[test]
    fn test_timeout_skips_hanging_iteration() {
        let dir = TempDir::new().unwrap();
        flaketally()
            .args(["-q", "run", "-n", "2", "--timeout", "100", "-o"])
            .arg(dir.path())
            .args(["--", "sleep", "5"])
            .timeout(std::time::Duration::from_secs(8))
            .assert()
            .success();
    }

    #[test]
    fn test_timed_out_iterations_do_not_overlap() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("log");
        let script = format!(
            "echo start >> '{log}'; sh -c 'sleep 0.6; echo survived >> \"{log}\"'",
            log = log.display()
        );
        flaketally()
            .args(["-q", "run", "-n", "3", "--timeout", "200", "-o"])
            .arg(dir.path())
            .args(["--", "sh", "-c", script.as_str()])
            .timeout(std::time::Duration::from_secs(10))
            .assert()
            .success();

        std::thread::sleep(std::time::Duration::from_millis(1000));
        assert_eq!(fs::read_to_string(&log).unwrap(), "start\nstart\nstart\n");
    }
}

// ============================================================================
// Show Tests
// ============================================================================

#[test]
fn test_show_ranks_entries() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ranked.txt");
    fs::write(&path, "rare: 1\ncommon: 9\n").unwrap();

    flaketally()
        .arg("show")
        .arg(&path)
        .assert()
        .success()
        .stdout("9  common\n1  rare\n");
}

#[test]
fn test_show_top() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.txt");
    fs::write(&path, "rare: 1\ncommon: 9\n").unwrap();

    flaketally()
        .args(["show", "--top", "1"])
        .arg(&path)
        .assert()
        .success()
        .stdout("9  common\n");
}

#[test]
fn test_show_empty_report() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.txt");
    fs::write(&path, "").unwrap();

    flaketally()
        .arg("show")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("No failures recorded"));
}

#[test]
fn test_show_missing_file() {
    flaketally()
        .args(["show", "/nonexistent/flaketally/report.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}
