use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn demo(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../demos").join(name)
}

fn pinpoint(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pinpoint"))
        .args(args)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn writes_mutants_and_reports_each() {
    let out = TempDir::new().unwrap();
    let subject = demo("subject.py");
    let suite = demo("suite.toml");
    let output = pinpoint(&[
        subject.to_str().unwrap(),
        "--suite",
        suite.to_str().unwrap(),
        "-n",
        "6",
        "-t",
        "200",
        "-o",
        out.path().to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    assert!(out.path().join("no-mutations.py").exists());
    for i in 0..6 {
        assert!(out.path().join(format!("{i}.py")).exists());
    }
    assert!(!out.path().join("6.py").exists());

    let text = stdout(&output);
    let verdicts = text.lines().filter(|l| l.contains(".py kills ")).count();
    assert_eq!(verdicts, 6);
    assert!(text.contains("\n---\n"));
    assert!(text.contains("of 12 tests"));
}

#[test]
fn same_seed_offset_gives_same_mutants() {
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    let subject = demo("subject.py");
    let suite = demo("suite.toml");
    for dir in [&a, &b] {
        let output = pinpoint(&[
            subject.to_str().unwrap(),
            "-s",
            suite.to_str().unwrap(),
            "-n",
            "3",
            "-t",
            "200",
            "--seed-offset",
            "40",
            "-o",
            dir.path().to_str().unwrap(),
        ]);
        assert!(output.status.success());
    }
    for i in 0..3 {
        let name = format!("{i}.py");
        assert_eq!(
            fs::read_to_string(a.path().join(&name)).unwrap(),
            fs::read_to_string(b.path().join(&name)).unwrap()
        );
    }
}

#[test]
fn call_swaps_kill_one_test() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("pinpoint.toml");
    fs::write(
        &config,
        r#"
num_mutants = 2

[weights]
comparison = 0.0
binary_operator = 0.0
deletable_statement = 0.0
boolean_literal_test = 0.0
call_name_swap = 1.0

[[tests]]
function = "f05"
args = [7, 8]

[[tests]]
function = "f01"
args = [5, 0]
"#,
    )
    .unwrap();
    let subject = demo("subject.py");
    let output = pinpoint(&[subject.to_str().unwrap(), "-c", config.to_str().unwrap(), "--diff"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let text = stdout(&output);
    assert!(text.contains("0.py kills exactly one test: f05(7,8)"), "{text}");
    assert!(text.contains("1.py kills exactly one test: f05(7,8)"), "{text}");
    assert!(text.contains("+    return max(i, j)"), "{text}");
    assert!(text.ends_with("selectively killed 1 of 2 tests\n+ f05(7,8)\n"), "{text}");
}

#[test]
fn missing_tests_is_an_error() {
    let subject = demo("subject.py");
    let output = pinpoint(&[subject.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no tests to run"));
}

#[test]
fn parse_errors_report_a_position() {
    let dir = TempDir::new().unwrap();
    let subject = dir.path().join("broken.py");
    fs::write(&subject, "def f(a):\n    return a +\n").unwrap();
    let suite = demo("suite.toml");
    let output = pinpoint(&[subject.to_str().unwrap(), "-s", suite.to_str().unwrap()]);
    assert!(!output.status.success());
    let err = String::from_utf8_lossy(&output.stderr);
    assert!(err.contains("could not parse"), "{err}");
    assert!(err.contains("2:"), "{err}");
}
