//! Tests for configuration loading and graceful degradation
//!
//! - Missing TOML files do not cause failure (defaults + warning)
//! - Broken TOML falls back to defaults
//! - Atomic write round-trips every field

use safereads_common::config::{
    load_toml_config, read_toml_config, write_toml_config, CacheStrategy, RetryConfig, TomlConfig,
};
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_missing_file_yields_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = load_toml_config(&temp_dir.path().join("absent.toml"));
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_broken_file_yields_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "port = \"not a number").unwrap();

    assert!(read_toml_config(&path).is_err());
    assert_eq!(load_toml_config(&path), TomlConfig::default());
}

#[test]
fn test_partial_file_keeps_other_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("partial.toml");
    std::fs::write(
        &path,
        r#"
free_analysis_limit = 5
admin_emails = ["admin@example.com"]

[retry]
initial_backoff_ms = 10
"#,
    )
    .unwrap();

    let config = load_toml_config(&path);
    assert_eq!(config.free_analysis_limit, 5);
    assert_eq!(config.admin_emails, vec!["admin@example.com".to_string()]);
    assert_eq!(
        config.retry,
        RetryConfig {
            max_attempts: 3,
            initial_backoff_ms: 10
        }
    );
    assert_eq!(config.port, 5740);
    assert_eq!(config.openai_model, "gpt-4o");
}

#[test]
fn test_atomic_write_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("conf").join("safereads.toml");

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/srv/safereads")),
        openai_api_key: Some("sk-test".to_string()),
        cache_strategy: CacheStrategy::ProfileKeyed,
        ..Default::default()
    };

    write_toml_config(&config, &path).unwrap();

    assert!(path.exists());
    assert!(!path.with_extension("toml.tmp").exists());
    assert_eq!(read_toml_config(&path).unwrap(), config);
}

#[cfg(unix)]
#[test]
fn test_written_config_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("safereads.toml");
    write_toml_config(&TomlConfig::default(), &path).unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}
