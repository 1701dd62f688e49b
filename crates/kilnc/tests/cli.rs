//! End-to-end tests for the `kilnc` driver.
//!
//! Each test writes a source file, runs `kilnc check` on it, and checks
//! the exit status, stdout and stderr.

use std::process::{Command, Output};

/// Write `source` to a temporary file and run `kilnc check` with `args`.
fn run_check(source: &str, args: &[&str]) -> Output {
    let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = temp_dir.path().join("main.kiln");
    std::fs::write(&path, source).expect("failed to write main.kiln");

    Command::new(env!("CARGO_BIN_EXE_kilnc"))
        .arg("check")
        .arg(&path)
        .args(args)
        .output()
        .expect("failed to invoke kilnc")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn prints_inferred_schemes() {
    let output = run_check("(define (id x) x)\n(define (double x) (+ x x))\n", &[]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "id :: :a -> :a\ndouble :: Num :a => :a -> :a\n");
}

#[test]
fn unicode_flag_changes_glyphs() {
    let output = run_check("(define (double x) (+ x x))", &["--unicode"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "double :: Num :a ⇒ :a → :a\n");
}

#[test]
fn type_errors_fail() {
    let output = run_check("(define (f x) y)", &["--no-color"]);
    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("E0003"), "stderr: {err}");
    assert!(err.contains("unbound variable `y`"), "stderr: {err}");
}

#[test]
fn parse_errors_fail() {
    let output = run_check("(define (f x)", &["--no-color"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("P0001"), "stderr: {}", stderr(&output));
}

#[test]
fn json_diagnostics_are_one_object_per_line() {
    let output = run_check("(define (f x) y)\n(define (g x) z)", &["--json"]);
    assert!(!output.status.success());
    let err = stderr(&output);
    let lines: Vec<&str> = err.lines().collect();
    assert_eq!(lines.len(), 2, "stderr: {err}");
    for line in lines {
        let value: serde_json::Value = serde_json::from_str(line).expect("valid JSON");
        assert_eq!(value["code"], "E0003");
    }
}

#[test]
fn missing_files_are_reported() {
    let output = Command::new(env!("CARGO_BIN_EXE_kilnc"))
        .args(["check", "/nonexistent/main.kiln"])
        .output()
        .expect("failed to invoke kilnc");
    assert!(!output.status.success());
    assert!(stderr(&output).contains("is not a file"));
}
