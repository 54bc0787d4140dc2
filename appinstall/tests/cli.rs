//! Integration tests for the appinstall CLI.
//!
//! These tests run the compiled binary and the bundles it writes.

use appinstall_common::bundle::Bundle;
use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use assert_fs::prelude::*;
use predicates::prelude::*;

/// Get an appinstall command whose work directories live in `temp`.
///
/// The tar used by generated unpack commands is replaced by `echo` so an
/// install never writes over `/`.
fn appinstall(temp: &assert_fs::TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("appinstall");
    configure(&mut cmd, temp);
    cmd
}

fn configure(cmd: &mut Command, temp: &assert_fs::TempDir) {
    cmd.env("APPINSTALL_HOME", temp.path().join("home"));
    cmd.env("APPINSTALL_TAR", "echo");
    cmd.env("APPINSTALL_SHELL", "sh");
    cmd.env_remove("RUST_LOG");
}

/// Build a bundle of `temp/app` into `temp/app-installer`.
fn build_bundle(temp: &assert_fs::TempDir, extra: &[&str]) -> std::path::PathBuf {
    temp.child("app/bin/run.sh").write_str("echo run\n").unwrap();
    temp.child("app/logs").create_dir_all().unwrap();
    let output = temp.path().join("app-installer");

    appinstall(temp)
        .arg("-o")
        .arg(&output)
        .arg("--file")
        .arg(temp.path().join("app/bin"))
        .arg("--dir")
        .arg(temp.path().join("app/logs"))
        .args(extra)
        .assert()
        .success();
    output
}

// ============================================================================
// Build mode
// ============================================================================

#[test]
fn help_describes_build_mode() {
    let temp = assert_fs::TempDir::new().unwrap();
    appinstall(&temp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Build a self-installing application bundle"))
        .stdout(predicate::str::contains("--qsys"));
}

#[test]
fn missing_output_is_an_error() {
    let temp = assert_fs::TempDir::new().unwrap();
    appinstall(&temp)
        .arg("--dir")
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("output file not specified"));
}

#[test]
fn output_given_twice_is_an_error() {
    let temp = assert_fs::TempDir::new().unwrap();
    appinstall(&temp)
        .args(["-o", "a", "--output", "b"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("output file set more than once"));
}

#[test]
fn unknown_library_is_an_error() {
    let temp = assert_fs::TempDir::new().unwrap();
    appinstall(&temp)
        .arg("-o")
        .arg(temp.path().join("out"))
        .args(["--qsys", "NOSUCHLIB"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("/qsys.lib/NOSUCHLIB.lib"));
}

#[test]
fn missing_file_is_an_error() {
    let temp = assert_fs::TempDir::new().unwrap();
    appinstall(&temp)
        .arg("-o")
        .arg(temp.path().join("out"))
        .arg("--file")
        .arg(temp.path().join("nope"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn build_writes_bundle_with_manifest() {
    let temp = assert_fs::TempDir::new().unwrap();
    let output = build_bundle(&temp, &[]);

    let bundle = Bundle::open(&output).unwrap().expect("payload");
    assert_eq!(bundle.manifest().files, vec!["files.tar"]);
    assert_eq!(
        bundle.manifest().commands,
        vec!["echo xvf $PWD/files.tar -C /"]
    );
}

#[test]
fn build_from_spec_file() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("app/conf/app.yaml").write_str("port: 80\n").unwrap();
    temp.child("start.sh").write_str("#!/bin/sh\n").unwrap();
    temp.child("bundle.yml")
        .write_str("files: [app]\npostinstall: start.sh\n")
        .unwrap();
    let output = temp.path().join("out");

    appinstall(&temp)
        .arg("-o")
        .arg(&output)
        .arg("--spec")
        .arg(temp.path().join("bundle.yml"))
        .assert()
        .success();

    let bundle = Bundle::open(&output).unwrap().expect("payload");
    assert_eq!(bundle.manifest().files, vec!["files.tar", ".postinstall"]);
}

// ============================================================================
// Install mode
// ============================================================================

#[test]
fn bundle_runs_in_install_mode() {
    let temp = assert_fs::TempDir::new().unwrap();
    let output = build_bundle(&temp, &[]);

    let mut cmd = Command::new(&output);
    configure(&mut cmd, &temp);
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Install the application packaged"))
        .stdout(predicate::str::contains("--rstlib"));
}

#[test]
fn install_without_terminal_is_canceled() {
    let temp = assert_fs::TempDir::new().unwrap();
    let output = build_bundle(&temp, &[]);

    let mut cmd = Command::new(&output);
    configure(&mut cmd, &temp);
    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("Extraction phase complete"))
        .stdout(predicate::str::contains("following actions will be taken"))
        .stdout(predicate::str::contains("canceled by user"));
}

#[test]
fn unattended_install_runs_plan_and_hook() {
    let temp = assert_fs::TempDir::new().unwrap();
    let marker = temp.path().join("post-ran");
    temp.child("post.sh")
        .write_str(&format!("#!/bin/sh\npwd > {}\n", marker.display()))
        .unwrap();
    let post = temp.path().join("post.sh");
    let output = build_bundle(&temp, &["--postinstall", post.to_str().unwrap()]);

    let mut cmd = Command::new(&output);
    configure(&mut cmd, &temp);
    cmd.arg("-y")
        .assert()
        .success()
        .stdout(predicate::str::contains("Continuing without confirmation"))
        .stdout(predicate::str::contains("xvf"))
        .stdout(predicate::str::contains("Installation complete"));

    let cwd = std::fs::read_to_string(&marker).unwrap();
    assert!(cwd.contains("installs"));
}
