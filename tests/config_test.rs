//! Configuration system tests.

use redtrace_lib::core::{Config, ConfigBuilder, LogLevel};
use std::io::Write;
use std::time::Duration;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.storage.ttl, Duration::from_secs(60));
    assert_eq!(config.storage.write_timeout, Duration::from_secs(30));
    assert_eq!(config.storage.read_timeout, Duration::from_secs(30));
    assert_eq!(config.storage.catalog_limit, 10_000);
    assert_eq!(config.logging.level, LogLevel::Warn);
    assert!(config.metrics.enabled);
}

#[test]
fn test_config_builder() {
    let config = ConfigBuilder::new()
        .ttl(Duration::from_secs(7 * 24 * 3600))
        .read_timeout(Duration::from_secs(2))
        .log_level(LogLevel::Info)
        .debug(true)
        .build()
        .unwrap();

    assert_eq!(config.storage.ttl, Duration::from_secs(604_800));
    assert_eq!(config.storage.read_timeout, Duration::from_secs(2));
    assert_eq!(config.logging.level, LogLevel::Info);
    assert!(config.debug);
}

#[test]
fn test_yaml_config() {
    let yaml = r#"
storage:
  ttl: 2h
  write_timeout: 500ms
  read_timeout: 1s
  catalog_limit: 250
logging:
  level: error
  structured: true
metrics:
  enabled: false
"#;

    let config = ConfigBuilder::new().from_yaml(yaml).unwrap().build().unwrap();

    assert_eq!(config.storage.ttl, Duration::from_secs(7200));
    assert_eq!(config.storage.write_timeout, Duration::from_millis(500));
    assert_eq!(config.storage.read_timeout, Duration::from_secs(1));
    assert_eq!(config.storage.catalog_limit, 250);
    assert_eq!(config.logging.level, LogLevel::Error);
    assert!(config.logging.structured);
    assert!(!config.metrics.enabled);
}

#[test]
fn test_invalid_config() {
    assert!(ConfigBuilder::new().ttl(Duration::ZERO).build().is_err());
    assert!(ConfigBuilder::new().write_timeout(Duration::ZERO).build().is_err());

    let yaml = "storage:\n  catalog_limit: 0\n";
    assert!(ConfigBuilder::new().from_yaml(yaml).unwrap().build().is_err());
}

#[tokio::test]
async fn test_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "storage:\n  ttl: 90s").unwrap();

    let config = ConfigBuilder::new()
        .from_file(file.path())
        .await
        .unwrap()
        .build()
        .unwrap();
    assert_eq!(config.storage.ttl, Duration::from_secs(90));
}

#[tokio::test]
async fn test_missing_config_file() {
    let result = ConfigBuilder::new()
        .from_file(std::path::Path::new("/nonexistent/redtrace.yaml"))
        .await;
    assert!(result.is_err());
}
