use super::settings::Settings;
use super::load_config_from;
use crate::persistence::Durability;

use serial_test::serial;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.store.path, "upsub_db");
    assert!(!settings.store.temporary);
    assert_eq!(settings.exchange.namespace, "MQ");
    assert_eq!(settings.exchange.name, "messages");
    assert_eq!(settings.exchange.durability, Durability::Soft);
    assert_eq!(settings.logging.level, "info");
}

#[test]
#[serial]
fn test_missing_file_falls_back_to_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("absent");

    let cfg = load_config_from(path.to_str().unwrap()).expect("load_config failed");
    assert_eq!(cfg.exchange.name, "messages");
    assert_eq!(cfg.store.flush_every_ms, Some(500));
}

#[test]
#[serial]
fn test_file_overrides_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("default.toml");
    let toml = r#"
        [store]
        path = "/var/lib/upsub"
        temporary = true

        [exchange]
        name = "weather"
        durability = "hard"
    "#;
    fs::write(&path, toml).expect("write config file");

    let cfg = load_config_from(path.to_str().unwrap()).expect("load_config failed");
    assert_eq!(cfg.store.path, "/var/lib/upsub");
    assert!(cfg.store.temporary);
    assert_eq!(cfg.exchange.name, "weather");
    assert_eq!(cfg.exchange.durability, Durability::Hard);
    // untouched values keep their defaults
    assert_eq!(cfg.exchange.namespace, "MQ");
    assert_eq!(cfg.logging.level, "info");
}

#[test]
#[serial]
fn test_environment_overrides_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("absent");

    temp_env::with_vars(
        [
            ("UPSUB__EXCHANGE__NAMESPACE", Some("repubsub")),
            ("UPSUB__LOGGING__LEVEL", Some("debug")),
        ],
        || {
            let cfg = load_config_from(path.to_str().unwrap()).expect("load_config failed");
            assert_eq!(cfg.exchange.namespace, "repubsub");
            assert_eq!(cfg.logging.level, "debug");
            assert_eq!(cfg.exchange.name, "messages");
        },
    );
}
