//! Tests for configuration resolution and graceful degradation
//!
//! - Missing or malformed TOML files do not fail startup
//! - Priority order: CLI → environment → TOML → defaults
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that set BLB_* variables are marked with #[serial].

use blb_common::config::{
    load_toml_config, AdminConfig, ConfigOverrides, DEFAULT_CONFLICT_PAGE_SIZE,
    DEFAULT_NEAR_DUPLICATE_LIMIT,
};
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

const ENV_VARS: [&str; 4] = [
    "BLB_DATABASE_PATH",
    "BLB_BIND_ADDRESS",
    "BLB_ALLOWED_ACTORS",
    "BLB_NEAR_DUPLICATE_LIMIT",
];

fn clear_env() {
    for var in ENV_VARS {
        env::remove_var(var);
    }
}

fn write_toml(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Should create temp file");
    file.write_all(content.as_bytes()).expect("Should write TOML");
    file
}

#[test]
fn test_load_toml_config_reads_all_fields() {
    let file = write_toml(
        r#"
database_path = "/srv/betterlb/betterlb.db"
bind_address = "0.0.0.0:8080"
allowed_actors = ["clerk@losbanos.gov.ph"]
near_duplicate_limit = 25
conflict_page_size = 10
"#,
    );

    let config = load_toml_config(file.path()).unwrap();
    assert_eq!(
        config.database_path,
        Some(PathBuf::from("/srv/betterlb/betterlb.db"))
    );
    assert_eq!(config.bind_address.as_deref(), Some("0.0.0.0:8080"));
    assert_eq!(
        config.allowed_actors,
        Some(vec!["clerk@losbanos.gov.ph".to_string()])
    );
    assert_eq!(config.near_duplicate_limit, Some(25));
    assert_eq!(config.conflict_page_size, Some(10));
}

#[test]
fn test_load_toml_config_rejects_malformed_file() {
    let file = write_toml("bind_address = [this is not toml");
    assert!(load_toml_config(file.path()).is_err());
}

#[test]
#[serial]
fn test_missing_config_file_falls_back_to_defaults() {
    clear_env();

    let config = AdminConfig::resolve(ConfigOverrides {
        config_file: Some(PathBuf::from("/nonexistent/betterlb/admin.toml")),
        ..Default::default()
    })
    .expect("Missing config file should not be fatal");

    assert_eq!(config.near_duplicate_limit, DEFAULT_NEAR_DUPLICATE_LIMIT);
    assert_eq!(config.conflict_page_size, DEFAULT_CONFLICT_PAGE_SIZE);
    assert!(config.allowed_actors.is_empty());
}

#[test]
#[serial]
fn test_malformed_config_file_is_ignored() {
    clear_env();
    let file = write_toml("near_duplicate_limit = \"lots\"");

    let config = AdminConfig::resolve(ConfigOverrides {
        config_file: Some(file.path().to_path_buf()),
        ..Default::default()
    })
    .unwrap();

    assert_eq!(config.near_duplicate_limit, DEFAULT_NEAR_DUPLICATE_LIMIT);
}

#[test]
#[serial]
fn test_env_overrides_toml() {
    clear_env();
    let file = write_toml(
        r#"
bind_address = "127.0.0.1:1111"
allowed_actors = ["toml@losbanos.gov.ph"]
near_duplicate_limit = 5
"#,
    );
    env::set_var("BLB_BIND_ADDRESS", "127.0.0.1:2222");
    env::set_var("BLB_ALLOWED_ACTORS", "a@losbanos.gov.ph, b@losbanos.gov.ph");

    let config = AdminConfig::resolve(ConfigOverrides {
        config_file: Some(file.path().to_path_buf()),
        ..Default::default()
    })
    .unwrap();
    clear_env();

    assert_eq!(config.bind_address, "127.0.0.1:2222");
    assert_eq!(
        config.allowed_actors,
        vec!["a@losbanos.gov.ph".to_string(), "b@losbanos.gov.ph".to_string()]
    );
    assert_eq!(config.near_duplicate_limit, 5);
}

#[test]
#[serial]
fn test_cli_overrides_env() {
    clear_env();
    env::set_var("BLB_DATABASE_PATH", "/env/betterlb.db");

    let config = AdminConfig::resolve(ConfigOverrides {
        database_path: Some(PathBuf::from("/cli/betterlb.db")),
        config_file: Some(PathBuf::from("/nonexistent/admin.toml")),
        ..Default::default()
    })
    .unwrap();
    clear_env();

    assert_eq!(config.database_path, PathBuf::from("/cli/betterlb.db"));
}

#[test]
#[serial]
fn test_non_numeric_env_limit_is_ignored() {
    clear_env();
    env::set_var("BLB_NEAR_DUPLICATE_LIMIT", "many");

    let config = AdminConfig::resolve(ConfigOverrides {
        config_file: Some(PathBuf::from("/nonexistent/admin.toml")),
        ..Default::default()
    })
    .unwrap();
    clear_env();

    assert_eq!(config.near_duplicate_limit, DEFAULT_NEAR_DUPLICATE_LIMIT);
}
