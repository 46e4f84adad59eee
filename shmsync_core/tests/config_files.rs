use shmsync_core::{Algorithm, ExchangeConfig, ShmSyncError};
use std::fs;

#[test]
fn toml_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("exchange.toml");

    let mut config = ExchangeConfig::peterson_sleepy_reader();
    config.writer_realtime.priority = Some(80);
    config.writer_realtime.lock_memory = true;
    config.save_toml(&path).unwrap();

    let loaded = ExchangeConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn yaml_and_json_are_accepted() {
    let dir = tempfile::tempdir().unwrap();

    let yaml = dir.path().join("exchange.yml");
    fs::write(&yaml, "algorithm: test-and-set\npayload_len: 16\n").unwrap();
    let config = ExchangeConfig::load(&yaml).unwrap();
    assert_eq!(config.algorithm, Algorithm::TestAndSet);
    assert_eq!(config.payload_len, 16);

    let json = dir.path().join("exchange.json");
    fs::write(&json, r#"{"algorithm": "peterson", "reader_poll_interval_us": 500}"#).unwrap();
    let config = ExchangeConfig::load(&json).unwrap();
    assert_eq!(config.algorithm, Algorithm::Peterson);
    assert_eq!(config.reader_poll_interval_us, Some(500));
}

#[test]
fn invalid_values_fail_validation_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("exchange.toml");
    fs::write(&path, "payload_len = 1\n").unwrap();
    assert!(matches!(ExchangeConfig::load(&path), Err(ShmSyncError::Config(_))));
}

#[test]
fn unknown_algorithm_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("exchange.toml");
    fs::write(&path, "algorithm = \"dekker\"\n").unwrap();
    assert!(matches!(
        ExchangeConfig::load(&path),
        Err(ShmSyncError::Serialization(_))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    assert!(matches!(ExchangeConfig::load(&path), Err(ShmSyncError::Io(_))));
}
