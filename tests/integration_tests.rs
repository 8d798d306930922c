//! Integration tests for the sitewright CLI.
//!
//! These exercise the session lifecycle end-to-end through the binary:
//! start, inspect, cancel, reap. Step execution needs registered
//! collaborators and is covered by the library-level pipeline tests.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

/// Helper to create a sitewright Command pointed at an isolated session dir
fn sitewright(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("sitewright");
    cmd.arg("--session-dir").arg(dir.path().join("sessions"));
    cmd
}

/// Start a session and return its id, parsed from stdout.
fn start_session(dir: &TempDir, args: &[&str]) -> String {
    let output = sitewright(dir)
        .arg("start")
        .arg("A website for my bakery")
        .args(args)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8(output).unwrap();
    stdout
        .split_whitespace()
        .find(|word| word.starts_with("sess_"))
        .expect("no session id in start output")
        .to_string()
}

mod cli_basics {
    use super::*;

    #[test]
    fn test_help() {
        cargo_bin_cmd!("sitewright").arg("--help").assert().success();
    }

    #[test]
    fn test_version() {
        cargo_bin_cmd!("sitewright").arg("--version").assert().success();
    }

    #[test]
    fn test_unknown_subcommand_fails() {
        cargo_bin_cmd!("sitewright").arg("frobnicate").assert().failure();
    }
}

mod session_lifecycle {
    use super::*;

    #[test]
    fn test_start_prints_session_summary() {
        let dir = TempDir::new().unwrap();
        sitewright(&dir)
            .arg("start")
            .arg("A website for my restaurant")
            .assert()
            .success()
            .stdout(predicate::str::contains("Started session sess_"))
            .stdout(predicate::str::contains("industry: restaurant"))
            .stdout(predicate::str::contains("steps:    10"));
    }

    #[test]
    fn test_status_shows_mockup_phase() {
        let dir = TempDir::new().unwrap();
        let id = start_session(&dir, &[]);

        sitewright(&dir)
            .arg("status")
            .arg(&id)
            .assert()
            .success()
            .stdout(predicate::str::contains("phase:   mockup"))
            .stdout(predicate::str::contains("status:  initialized"));
    }

    #[test]
    fn test_status_of_missing_session_fails() {
        let dir = TempDir::new().unwrap();
        sitewright(&dir)
            .arg("status")
            .arg("sess_0000000000000000")
            .assert()
            .failure()
            .stderr(predicate::str::contains("not found or expired"));
    }

    #[test]
    fn test_steps_lists_pipeline_in_order() {
        let dir = TempDir::new().unwrap();
        let id = start_session(&dir, &["--page", "home", "--page", "about"]);

        let assert = sitewright(&dir).arg("steps").arg(&id).assert().success();
        let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
        let steps: Vec<&str> = stdout
            .lines()
            .filter_map(|line| line.split_whitespace().last())
            .filter(|word| !word.is_empty())
            .collect();
        assert_eq!(
            steps,
            vec![
                "architect",
                "content:header_footer",
                "content:home",
                "content:about",
                "stylist",
                "seo",
                "images",
                "assemble",
            ]
        );
    }

    #[test]
    fn test_accept_without_mockup_fails() {
        let dir = TempDir::new().unwrap();
        let id = start_session(&dir, &[]);

        sitewright(&dir)
            .arg("accept")
            .arg(&id)
            .assert()
            .failure()
            .stderr(predicate::str::contains("No mockup to accept"));
    }

    #[test]
    fn test_cancel_roundtrip() {
        let dir = TempDir::new().unwrap();
        let id = start_session(&dir, &[]);

        sitewright(&dir)
            .arg("cancel")
            .arg(&id)
            .assert()
            .success()
            .stdout(predicate::str::contains("cancelled"));

        // Second cancel: the session is gone
        sitewright(&dir)
            .arg("cancel")
            .arg(&id)
            .assert()
            .success()
            .stdout(predicate::str::contains("did not exist"));

        sitewright(&dir).arg("status").arg(&id).assert().failure();
    }

    #[test]
    fn test_list_shows_started_sessions() {
        let dir = TempDir::new().unwrap();
        let id = start_session(&dir, &[]);

        sitewright(&dir)
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains(&id));
    }

    #[test]
    fn test_list_empty() {
        let dir = TempDir::new().unwrap();
        sitewright(&dir)
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains("No sessions"));
    }

    #[test]
    fn test_reap_reports_count() {
        let dir = TempDir::new().unwrap();
        sitewright(&dir)
            .arg("reap")
            .assert()
            .success()
            .stdout(predicate::str::contains("Reaped 0 expired"));
    }

    #[test]
    fn test_explicit_industry_wins_over_detection() {
        let dir = TempDir::new().unwrap();
        sitewright(&dir)
            .arg("start")
            .arg("A website for my restaurant")
            .arg("--industry")
            .arg("agency")
            .assert()
            .success()
            .stdout(predicate::str::contains("industry: agency"));
    }
}
