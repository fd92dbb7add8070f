//! Integration tests for coordinator settings loading.
//!
//! Verifies that unreadable or malformed settings files fail fast and that
//! valid files seed the poller configuration.

use std::fs;
use std::time::Duration;

use camino::Utf8PathBuf;
use multinode_config::{ConfigError, CoordinatorSettings, PollerConfig};
use tempfile::TempDir;

fn settings_path(temp_dir: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(temp_dir.path().join("lava-coordinator.conf"))
        .expect("temp path should be UTF-8")
}

#[test]
fn missing_settings_file_reports_path() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let path = settings_path(&temp_dir);

    let error = CoordinatorSettings::load(&path).expect_err("loading must fail");
    match error {
        ConfigError::ReadSettings { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("expected read failure, got {other:?}"),
    }
}

#[test]
fn malformed_settings_file_is_rejected() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let path = settings_path(&temp_dir);
    fs::write(&path, "port = 3079\n").expect("write malformed settings");

    let error = CoordinatorSettings::load(&path).expect_err("loading must fail");
    let message = error.to_string();
    assert!(
        message.contains("lava-coordinator.conf"),
        "expected the path in the message, got {message:?}"
    );
    assert!(matches!(error, ConfigError::InvalidSettings { .. }));
}

#[test]
fn settings_file_seeds_poller_configuration() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let path = settings_path(&temp_dir);
    fs::write(
        &path,
        r#"{
            "port": 3179,
            "blocksize": 4096,
            "poll_delay": 3,
            "coordinator_hostname": "coordinator.lab",
            "logfile": "/var/log/lava-coordinator.log"
        }"#,
    )
    .expect("write settings");

    let settings = CoordinatorSettings::load(&path).expect("load settings");
    let config = settings.apply(PollerConfig::default());

    assert_eq!(config.host, "coordinator.lab");
    assert_eq!(config.port, 3179);
    assert_eq!(config.blocksize, 4096);
    assert_eq!(config.poll_delay, Duration::from_secs(3));
}

#[test]
fn negative_poll_delay_is_rejected() {
    let error = PollerConfig::from_json(r#"{"poll_delay": -1}"#).expect_err("negative delay");
    assert!(matches!(error, ConfigError::InvalidJson { .. }));
}
