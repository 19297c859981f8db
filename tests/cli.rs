use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::tempdir;

/// `daemonctl` with an empty config directory so no real settings leak in
fn daemonctl(config_home: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("daemonctl").expect("binary builds");
    cmd.env("XDG_CONFIG_HOME", config_home).env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_every_verb() {
    let home = tempdir().expect("failed to create tempdir");
    let output = daemonctl(home.path())
        .arg("--help")
        .output()
        .expect("run daemonctl");
    assert!(output.status.success());
    let help = String::from_utf8_lossy(&output.stdout);
    for verb in ["install", "start", "stop", "restart", "delete", "show", "query"] {
        assert!(help.contains(verb), "missing {verb} in:\n{help}");
    }
}

#[test]
fn verb_is_required() {
    let home = tempdir().expect("failed to create tempdir");
    daemonctl(home.path()).assert().failure();
}

#[cfg(any(target_os = "linux", target_os = "openbsd", windows))]
#[test]
fn missing_working_dir_is_reported() {
    let home = tempdir().expect("failed to create tempdir");
    let missing = home.path().join("no-such-dir");
    daemonctl(home.path())
        .args(["--name", "daemonctl-test", "--dir"])
        .arg(&missing)
        .args(["install", "--", "server"])
        .assert()
        .failure()
        .stderr(contains("not directory"));
}

#[test]
fn explicit_settings_file_must_exist() {
    let home = tempdir().expect("failed to create tempdir");
    daemonctl(home.path())
        .args(["--config"])
        .arg(home.path().join("absent.toml"))
        .arg("show")
        .assert()
        .failure()
        .stderr(contains("Failed to load settings"));
}

#[cfg(any(target_os = "linux", target_os = "openbsd", windows))]
#[test]
fn settings_file_feeds_the_daemon() {
    let home = tempdir().expect("failed to create tempdir");
    let config = home.path().join("daemon.toml");
    std::fs::write(
        &config,
        format!("dir = {:?}\n", home.path().join("gone").display().to_string()),
    )
    .expect("write settings");

    daemonctl(home.path())
        .arg("-c")
        .arg(&config)
        .args(["--name", "daemonctl-test", "show"])
        .assert()
        .failure()
        .stderr(contains("not directory"));
}

#[test]
fn quiet_query_still_reports_setup_errors() {
    let home = tempdir().expect("failed to create tempdir");
    daemonctl(home.path())
        .args(["--name", "daemonctl-test", "--dir"])
        .arg(home.path().join("no-such-dir"))
        .args(["query", "-q"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(contains("Failed to set up service"));
}

#[test]
fn quiet_query_reports_unknown_user() {
    let home = tempdir().expect("failed to create tempdir");
    daemonctl(home.path())
        .args(["--user", "no-such-user-xyz", "--name", "daemonctl-test", "query", "-q"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(contains("Failed to set up service"));
}
