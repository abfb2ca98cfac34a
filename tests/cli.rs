// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Drives the `detect` binary the way a calling process does.

use std::path::Path;
use std::process::{Command, Output};

fn detect(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_detect"))
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to spawn detect")
}

fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn test_no_arguments_prints_usage() {
    let dir = tempfile::tempdir().unwrap();
    let output = detect(dir.path(), &[]);

    assert_eq!(output.status.code(), Some(1));
    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("error:"));
    assert!(lines[0].contains("Usage"));
    assert!(!output.stderr.is_empty());
}

#[test]
fn test_missing_model_is_load_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("frame.jpg"), b"irrelevant").unwrap();

    let output = detect(dir.path(), &["frame.jpg"]);

    assert_eq!(output.status.code(), Some(1));
    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("error:model load error"));
    assert!(lines[0].contains("best.onnx"));
}

#[test]
fn test_corrupt_model_is_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let weights = dir.path().join("runs/detect/train2/weights");
    std::fs::create_dir_all(&weights).unwrap();
    std::fs::write(weights.join("best.onnx"), b"not a model").unwrap();

    let output = detect(dir.path(), &["frame.jpg"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout_lines(&output)[0].starts_with("error:model load error"));
}

#[test]
fn test_verbose_keeps_stdout_to_one_line() {
    let dir = tempfile::tempdir().unwrap();
    let output = detect(dir.path(), &["frame.jpg", "--verbose"]);

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stdout_lines(&output).len(), 1);
}

#[test]
fn test_help_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let output = detect(dir.path(), &["--help"]);

    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Usage"));
}
