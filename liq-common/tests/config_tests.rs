//! Integration tests for configuration loading and graceful degradation
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate XDG_CONFIG_HOME are marked with #[serial].

use liq_common::config::{load_toml_config, ConfigOverrides, ScannerConfig};
use liq_common::Error;
use serial_test::serial;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

fn write_config(dir: &std::path::Path, body: &str) -> PathBuf {
    let path = dir.join("config.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(body.as_bytes()).unwrap();
    path
}

#[test]
fn test_explicit_config_file_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
        endpoint = "https://backend.example/exec"
        mode = "liquidaciones"
        autosync_interval_ms = 5000
        cache_path = "/tmp/liq-test/scanned.json.zst"
        "#,
    );

    let file = load_toml_config(Some(&path)).unwrap();
    let config = ScannerConfig::resolve(&ConfigOverrides::default(), &file).unwrap();

    assert_eq!(config.endpoint, "https://backend.example/exec");
    assert_eq!(config.autosync_interval, Duration::from_secs(5));
    assert_eq!(config.cache_path, PathBuf::from("/tmp/liq-test/scanned.json.zst"));
}

#[test]
fn test_explicit_missing_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = load_toml_config(Some(&dir.path().join("nope.toml")));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_malformed_toml_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "endpoint = [unterminated");
    assert!(matches!(load_toml_config(Some(&path)), Err(Error::Config(_))));
}

#[test]
fn test_cli_overrides_take_priority() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
        endpoint = "https://file.example/exec"

        [logging]
        level = "warn"
        "#,
    );
    let file = load_toml_config(Some(&path)).unwrap();
    let overrides = ConfigOverrides {
        endpoint: Some("http://127.0.0.1:8080/exec".to_string()),
        cache_path: Some(dir.path().join("cache.zst")),
        log_level: Some("debug".to_string()),
    };

    let config = ScannerConfig::resolve(&overrides, &file).unwrap();
    assert_eq!(config.endpoint, "http://127.0.0.1:8080/exec");
    assert_eq!(config.cache_path, dir.path().join("cache.zst"));
    assert_eq!(config.log_level, "debug");
}

#[cfg(target_os = "linux")]
#[test]
#[serial]
fn test_user_config_dir_searched() {
    let dir = tempfile::tempdir().unwrap();
    let app_dir = dir.path().join("liq-scanner");
    std::fs::create_dir_all(&app_dir).unwrap();
    write_config(&app_dir, "endpoint = \"https://found.example/exec\"\n");

    let previous = std::env::var_os("XDG_CONFIG_HOME");
    std::env::set_var("XDG_CONFIG_HOME", dir.path());
    let file = load_toml_config(None);
    match previous {
        Some(value) => std::env::set_var("XDG_CONFIG_HOME", value),
        None => std::env::remove_var("XDG_CONFIG_HOME"),
    }

    assert_eq!(
        file.unwrap().endpoint.as_deref(),
        Some("https://found.example/exec")
    );
}
