//! Configuration file loading and graceful degradation
//!
//! Tests that touch QSYNC_* environment variables are marked #[serial]
//! so they never run in parallel with each other.

use qsync_common::config::{AppConfig, CliOverrides, TomlConfig};
use serial_test::serial;
use std::env;
use std::io::Write;
use tempfile::TempDir;

#[test]
fn test_missing_config_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let config = TomlConfig::load_or_default(Some(&dir.path().join("absent.toml")));
    assert!(config.is_ok(), "missing file should not be fatal: {:?}", config.err());
    let config = config.unwrap();
    assert!(config.database_path.is_none());
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_malformed_config_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::File::create(&path)
        .unwrap()
        .write_all(b"database_path = [unterminated")
        .unwrap();
    assert!(TomlConfig::load_or_default(Some(&path)).is_err());
}

#[test]
fn test_config_file_is_read() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("qsync.toml");
    std::fs::write(
        &path,
        "master_sheet = \"Quotes\"\n[nocodb]\nurl = \"https://noco\"\ntoken = \"t\"\nproject = \"p\"\n",
    )
    .unwrap();
    let config = TomlConfig::load_or_default(Some(&path)).unwrap();
    assert_eq!(config.master_sheet.as_deref(), Some("Quotes"));
    assert!(config.nocodb.is_configured());
}

#[test]
#[serial]
fn test_process_environment_overrides_toml() {
    env::set_var("QSYNC_NOCODB_TABLE", "FromEnv");
    env::remove_var("QSYNC_DATABASE");

    let config = AppConfig::resolve(CliOverrides::default(), TomlConfig::default());
    assert_eq!(config.targets.nocodb.table, "FromEnv");

    env::remove_var("QSYNC_NOCODB_TABLE");
}

#[test]
#[serial]
fn test_empty_environment_value_is_ignored() {
    env::set_var("QSYNC_SUPABASE_TABLE", "");

    let config = AppConfig::resolve(CliOverrides::default(), TomlConfig::default());
    assert_eq!(config.targets.supabase.table, "cotizaciones");

    env::remove_var("QSYNC_SUPABASE_TABLE");
}
