//! Configuration files

use rowquery::config::{ConfigError, EngineConfig};
use rowquery::storage::MemoryEngine;
use std::fs;

#[test]
fn test_save_and_load_key_value_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.conf");

    let config = EngineConfig {
        page_size: 4096,
        lock_wait_timeout_ms: 750,
        deadlock_detection: false,
        ..EngineConfig::default()
    };
    config.save_file(&path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("lock_wait_timeout_ms=750"));
    assert_eq!(EngineConfig::load_file(&path).unwrap(), config);
}

#[test]
fn test_load_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.json");
    fs::write(&path, r#"{ "page_size": 2048, "deadlock_detection": false }"#).unwrap();

    let config = EngineConfig::load_file(&path).unwrap();
    assert_eq!(config.page_size, 2048);
    assert!(!config.deadlock_detection);
    assert_eq!(config.lock_wait_timeout_ms, EngineConfig::default().lock_wait_timeout_ms);

    let engine = MemoryEngine::with_config(config.clone()).unwrap();
    assert_eq!(engine.config(), &config);
}

#[test]
fn test_key_value_file_with_comments_and_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.conf");
    fs::write(
        &path,
        "# tuned for the test suite\n\npage_size = 1024\nlock_wait_timeout_ms=DEFAULT\n",
    )
    .unwrap();

    let config = EngineConfig::load_file(&path).unwrap();
    assert_eq!(config.page_size, 1024);
    assert_eq!(config.lock_wait_timeout_ms, 50_000);
}

#[test]
fn test_load_errors() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        EngineConfig::load_file(dir.path().join("missing.conf")),
        Err(ConfigError::Io(_))
    ));

    let path = dir.path().join("engine.conf");
    fs::write(&path, "page_size=64\n").unwrap();
    assert!(matches!(
        EngineConfig::load_file(&path),
        Err(ConfigError::Invalid(_))
    ));

    fs::write(&path, "buffer_pool_size=1G\n").unwrap();
    assert_eq!(
        EngineConfig::load_file(&path),
        Err(ConfigError::UnknownKey("buffer_pool_size".to_string()))
    );
}

#[test]
fn test_engine_rejects_invalid_config() {
    let config = EngineConfig {
        extern_field_threshold: 1,
        ..EngineConfig::default()
    };
    assert!(matches!(
        MemoryEngine::with_config(config),
        Err(ConfigError::Invalid(_))
    ));
}
