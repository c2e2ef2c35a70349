//! CLI integration tests using assert_cmd.

use std::path::Path;
use std::process::{Child, Stdio};
use std::time::{Duration, Instant};

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

/// A `cadence` command running inside `dir`, isolated from any user config.
fn cadence(dir: &Path) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("cadence").unwrap();
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env_remove("CADENCE_STATE_PATH")
        .env_remove("CADENCE_CATALOG_PATH");
    cmd
}

fn initialized() -> TempDir {
    let dir = TempDir::new().unwrap();
    cadence(dir.path()).arg("init").assert().success();
    dir
}

fn json_output(cmd: &mut Command) -> Value {
    let output = cmd.arg("--json").assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).unwrap()
}

fn submit_quiz(dir: &Path, user: &str) -> Value {
    json_output(cadence(dir).args([
        "submit",
        "--user",
        user,
        "--challenge",
        "walkers-quiz",
        "--answer",
        "walker",
        "--answer",
        "Node",
        "--answer",
        "edge",
    ]))
}

#[test]
fn help_output() {
    let dir = TempDir::new().unwrap();
    cadence(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("spaced-repetition"))
        .stdout(predicate::str::contains("submit"))
        .stdout(predicate::str::contains("review"));
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();
    cadence(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created cadence.toml"))
        .stdout(predicate::str::contains("Created catalog/example.toml"));

    assert!(dir.path().join("cadence.toml").exists());
    assert!(dir.path().join("catalog/example.toml").exists());

    // second run leaves existing files alone
    cadence(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn validate_example_catalog() {
    let dir = initialized();
    cadence(dir.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("4 challenges"))
        .stdout(predicate::str::contains("All catalogs valid"));
}

#[test]
fn validate_reports_warnings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("odd.toml");
    std::fs::write(
        &path,
        r#"
[catalog]
id = "odd"
name = "Odd"

[[challenges]]
id = "essay"
type = "essay"
skills = ["problem_solving"]
"#,
    )
    .unwrap();

    cadence(dir.path())
        .arg("validate")
        .arg("--catalog")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("[essay] WARNING"))
        .stdout(predicate::str::contains("1 warning(s) found"));
}

#[test]
fn validate_nonexistent_file() {
    let dir = TempDir::new().unwrap();
    cadence(dir.path())
        .arg("validate")
        .arg("--catalog")
        .arg("nonexistent.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn submit_creates_session_and_updates_profile() {
    let dir = initialized();
    let result = submit_quiz(dir.path(), "alice");

    assert_eq!(result["score"], 1.0);
    assert_eq!(result["status"], "completed");
    assert_eq!(result["adjustment"]["previous"], "beginner");
    assert_eq!(result["adjustment"]["current"], "intermediate");
    assert_eq!(result["scheduling"]["outcome"], "created");
    assert_eq!(result["updated_challenge"]["total_attempts"], 1);
    assert!(dir.path().join("cadence-state.json").exists());

    let shown = json_output(cadence(dir.path()).args(["profile", "--user", "alice"]));
    assert_eq!(shown["profile"]["current_difficulty"], "intermediate");
    assert_eq!(shown["profile"]["success_streak"], 1);
    assert_eq!(shown["sessions"].as_array().unwrap().len(), 1);

    // a second success reuses the session and the stored challenge counters
    let again = submit_quiz(dir.path(), "alice");
    assert_eq!(again["scheduling"]["outcome"], "marked_ready");
    assert_eq!(again["updated_challenge"]["total_attempts"], 2);
}

#[test]
fn submit_human_output() {
    let dir = initialized();
    cadence(dir.path())
        .args(["submit", "--user", "bob", "--challenge", "walkers-quiz"])
        .args(["--answer", "wrong", "--answer", "wrong", "--answer", "wrong"])
        .assert()
        .success()
        .stdout(predicate::str::contains("score 0.00"))
        .stdout(predicate::str::contains("very_beginner"))
        .stdout(predicate::str::contains("Review: none"));
}

#[test]
fn submit_unknown_challenge_fails() {
    let dir = initialized();
    cadence(dir.path())
        .args(["submit", "--user", "alice", "--challenge", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("challenge not found"));
}

#[test]
fn review_and_postpone_session() {
    let dir = initialized();
    let result = submit_quiz(dir.path(), "carol");
    let session = result["scheduling"]["session_id"].as_str().unwrap().to_string();

    cadence(dir.path())
        .args(["review", "--session", &session, "--quality", "9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("quality rating 9"));

    cadence(dir.path())
        .args(["postpone", "--session", &session, "--days", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least one day"));

    let reviewed = json_output(cadence(dir.path()).args([
        "review",
        "--session",
        &session,
        "--quality",
        "4",
    ]));
    assert_eq!(reviewed["session_id"], session.as_str());

    cadence(dir.path())
        .args(["postpone", "--session", &session, "--days", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Postponed"));

    let shown = json_output(cadence(dir.path()).args(["profile", "--user", "carol"]));
    let sessions = shown["sessions"].as_array().unwrap();
    assert_eq!(sessions[0]["status"], "delayed");
    assert_eq!(sessions[0]["review_stage"], 2);
}

#[test]
fn review_unknown_session_fails() {
    let dir = initialized();
    cadence(dir.path())
        .args([
            "review",
            "--session",
            "6f1c2a52-6a53-4a55-9f3b-6d6d7b0c0c11",
            "--quality",
            "3",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn due_lists_nothing_for_new_session() {
    let dir = initialized();
    submit_quiz(dir.path(), "dave");
    cadence(dir.path())
        .args(["due", "--user", "dave"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No reviews due for dave"));
}

#[test]
fn analyze_and_adjust() {
    let dir = initialized();
    submit_quiz(dir.path(), "erin");
    cadence(dir.path())
        .args(["record-module", "--user", "erin", "--module", "graphs-101"])
        .assert()
        .success();

    let advice = json_output(cadence(dir.path()).args(["analyze", "--user", "erin"]));
    assert_eq!(advice["snapshot"]["success_rate"], 1.0);
    assert_eq!(advice["snapshot"]["trend"], "insufficient_data");

    cadence(dir.path())
        .args(["analyze", "--user", "erin", "--window-days", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least one day"));

    cadence(dir.path())
        .args(["adjust", "--user", "erin", "--direction", "sideways"])
        .assert()
        .failure();

    cadence(dir.path())
        .args(["adjust", "--user", "erin", "--direction", "increase"])
        .assert()
        .success()
        .stdout(predicate::str::contains("intermediate -> advanced"));
}

#[test]
fn batch_processes_every_entry() {
    let dir = initialized();
    let batch = dir.path().join("batch.json");
    std::fs::write(
        &batch,
        r#"[
  {"user": "u1", "challenge": "walkers-quiz", "answers": ["walker", "node", "edge"]},
  {"user": "u2", "challenge": "walkers-quiz", "answers": ["x", "y", "z"]},
  {"user": "u1", "challenge": "missing"}
]"#,
    )
    .unwrap();

    // unknown challenge ids are rejected before anything is processed
    cadence(dir.path())
        .args(["batch", "--file"])
        .arg(&batch)
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing"));

    std::fs::write(
        &batch,
        r#"[
  {"user": "u1", "challenge": "walkers-quiz", "answers": ["walker", "node", "edge"]},
  {"user": "u2", "challenge": "walkers-quiz", "answers": ["x", "y", "z"]},
  {"user": "", "challenge": "walkers-quiz"}
]"#,
    )
    .unwrap();
    let reports = json_output(cadence(dir.path()).args(["batch", "--file"]).arg(&batch));
    let reports = reports.as_array().unwrap();
    assert_eq!(reports.len(), 3);
    assert_eq!(reports[0]["score"], 1.0);
    assert_eq!(reports[1]["score"], 0.0);
    assert!(reports[2]["error"].as_str().unwrap().contains("user_id"));

    let state: Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("cadence-state.json")).unwrap())
            .unwrap();
    assert_eq!(state["challenges"]["walkers-quiz"]["total_attempts"], 2);
    assert_eq!(state["challenges"]["walkers-quiz"]["successful_attempts"], 1);
}

#[test]
fn sweep_once() {
    let dir = initialized();
    cadence(dir.path())
        .arg("sweep")
        .assert()
        .success()
        .stdout(predicate::str::contains("Promoted 0 session(s)"));
}

/// Kills the child when the test ends, pass or fail.
struct Running(Child);

impl Drop for Running {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn read_state(dir: &Path) -> Value {
    let content = std::fs::read_to_string(dir.join("cadence-state.json")).unwrap();
    serde_json::from_str(&content).unwrap()
}

/// Edit the snapshot the way another writer would: bump the generation
/// and replace the file in one rename.
fn make_due(dir: &Path, session: &str) {
    let mut state = read_state(dir);
    state["sessions"][session]["scheduled_for"] = "2020-01-01T00:00:00Z".into();
    state["generation"] = (state["generation"].as_u64().unwrap() + 1).into();
    let tmp = dir.join("edit.json.tmp");
    std::fs::write(&tmp, serde_json::to_string_pretty(&state).unwrap()).unwrap();
    std::fs::rename(&tmp, dir.join("cadence-state.json")).unwrap();
}

fn wait_for_status(dir: &Path, session: &str, status: &str) -> Value {
    let deadline = Instant::now() + Duration::from_secs(15);
    loop {
        let state = read_state(dir);
        if state["sessions"][session]["status"] == status {
            return state;
        }
        assert!(
            Instant::now() < deadline,
            "session {session} never became {status}"
        );
        std::thread::sleep(Duration::from_millis(100));
    }
}

#[test]
fn watch_sweep_keeps_concurrent_submissions() {
    let dir = initialized();
    let config_path = dir.path().join("cadence.toml");
    let config = std::fs::read_to_string(&config_path).unwrap();
    let fast = config.replace("interval_seconds = 60", "interval_seconds = 1");
    assert_ne!(config, fast);
    std::fs::write(&config_path, fast).unwrap();

    let alice = submit_quiz(dir.path(), "alice");
    let alice_session = alice["scheduling"]["session_id"].as_str().unwrap().to_string();
    make_due(dir.path(), &alice_session);

    #[allow(deprecated)]
    let bin = assert_cmd::cargo::cargo_bin("cadence");
    let _watcher = Running(
        std::process::Command::new(bin)
            .args(["sweep", "--watch"])
            .current_dir(dir.path())
            .env("HOME", dir.path())
            .env_remove("CADENCE_STATE_PATH")
            .env_remove("CADENCE_CATALOG_PATH")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap(),
    );
    wait_for_status(dir.path(), &alice_session, "ready");

    // a submission while the watcher is running
    let bob = submit_quiz(dir.path(), "bob");
    let bob_session = bob["scheduling"]["session_id"].as_str().unwrap().to_string();

    // the watcher only promotes bob if it picked up the other process's writes
    make_due(dir.path(), &bob_session);
    let state = wait_for_status(dir.path(), &bob_session, "ready");

    assert_eq!(state["sessions"][&alice_session]["status"], "ready");
    assert!(state["profiles"]["alice"].is_object());
    assert!(state["profiles"]["bob"].is_object());
    assert_eq!(state["attempts"].as_array().unwrap().len(), 2);
}
