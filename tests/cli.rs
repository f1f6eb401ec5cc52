use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn prints_version() {
    Command::cargo_bin("linkseek")
        .expect("binary built")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn prints_help() {
    Command::cargo_bin("linkseek")
        .expect("binary built")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Linkseek"))
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--version"));
}

#[test]
fn config_flag_requires_a_path() {
    Command::cargo_bin("linkseek")
        .expect("binary built")
        .arg("--config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--config needs a path"));
}

#[test]
fn rejects_unknown_arguments() {
    Command::cargo_bin("linkseek")
        .expect("binary built")
        .arg("--frobnicate")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown argument"));
}
