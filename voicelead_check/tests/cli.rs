// The `check` binary: exit status and output streams.

use std::path::Path;
use std::process::{Command, Output};

fn run_check(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_check"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run check")
}

fn write_score(dir: &Path, name: &str, json: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, json).unwrap();
    path.to_string_lossy().into_owned()
}

const PARALLEL_FIFTHS: &str = r#"{
    "layout": { "voices": ["cf", "cp"], "texture": "linear" },
    "time_points": [
        { "tick": 0, "notes": [
            { "voice": "cf", "pitch": 48, "tpc": 14 }, { "voice": "cp", "pitch": 55, "tpc": 15 }
        ] },
        { "tick": 1, "notes": [
            { "voice": "cf", "pitch": 50, "tpc": 16 }, { "voice": "cp", "pitch": 57, "tpc": 17 }
        ] }
    ]
}"#;

const CONTRARY_MOTION: &str = r#"{
    "layout": { "voices": ["cf", "cp"], "texture": "linear" },
    "time_points": [
        { "tick": 0, "notes": [
            { "voice": "cf", "pitch": 48, "tpc": 14 }, { "voice": "cp", "pitch": 64, "tpc": 18 }
        ] },
        { "tick": 1, "notes": [
            { "voice": "cf", "pitch": 50, "tpc": 16 }, { "voice": "cp", "pitch": 62, "tpc": 16 }
        ] }
    ]
}"#;

#[test]
fn test_missing_score_is_reported_once() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.json");
    let output = run_check(&[&missing.to_string_lossy()]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("failed to read score").count(), 1, "stderr: {stderr}");
    assert!(output.stdout.is_empty());
}

#[test]
fn test_bad_config_is_reported_once() {
    let dir = tempfile::tempdir().unwrap();
    let score = write_score(dir.path(), "score.json", CONTRARY_MOTION);
    let config = write_score(dir.path(), "config.json", "{ not json");
    let output = run_check(&[&score, "--config", &config]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.lines().filter(|l| l.contains("Error")).count(), 1, "stderr: {stderr}");
}

#[test]
fn test_exit_status_follows_findings() {
    let dir = tempfile::tempdir().unwrap();
    let clean = write_score(dir.path(), "clean.json", CONTRARY_MOTION);
    let output = run_check(&[&clean]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("No problems found."));

    let faulty = write_score(dir.path(), "faulty.json", PARALLEL_FIFTHS);
    let output = run_check(&[&faulty, "--json"]);
    assert_eq!(output.status.code(), Some(1));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["diagnostics"][0]["message"], "Parallel P5");
}
