//! End-to-end tests for fable-kernel CLI commands.
//!
//! Only commands that need neither dotnet nor a working compiler run here.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin for tests

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn fable_kernel() -> Command {
    let mut cmd = Command::cargo_bin("fable-kernel").expect("Failed to find fable-kernel binary");
    for var in [
        "FABLE_KERNEL_WORK_DIR",
        "FABLE_KERNEL_DOTNET",
        "FABLE_KERNEL_PYTHON",
        "FABLE_KERNEL_POLL_ATTEMPTS",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help_lists_commands() {
    fable_kernel()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("console"))
        .stdout(predicate::str::contains("project"))
        .stdout(predicate::str::contains("info"));
}

#[test]
fn test_project_prints_manifest() {
    fable_kernel()
        .arg("project")
        .assert()
        .success()
        .stdout(predicate::str::contains("<Compile Include=\"Fable.fs\" />"))
        .stdout(predicate::str::contains("Fable.Python"));
}

#[test]
fn test_project_writes_manifest() {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let out = temp.path().join("kernel");

    fable_kernel()
        .args(["project", "--output", out.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Jupyter.fsproj"));

    let manifest = fs::read_to_string(out.join("Jupyter.fsproj")).unwrap();
    assert!(manifest.contains("<TargetFramework>net5</TargetFramework>"));
}

#[test]
fn test_info_is_json() {
    let output = fable_kernel()
        .arg("info")
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());

    let info: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("info should print JSON");
    assert_eq!(info["implementation"], "Fable Python");
    assert_eq!(info["language_info"]["name"], "fsharp");
}

#[test]
fn test_console_rejects_zero_poll_attempts() {
    fable_kernel()
        .args(["console", "--poll-attempts", "0"])
        .assert()
        .failure();
}

#[test]
fn test_console_reports_missing_python_with_hint() {
    fable_kernel()
        .args([
            "console",
            "--no-compiler",
            "--python",
            "/definitely/not/here/python3",
        ])
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"))
        .stderr(predicate::str::contains("hint:"));
}
