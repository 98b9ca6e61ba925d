//! Config file discovery and loading through the process environment
//!
//! These tests mutate process-wide environment variables and run serially.

use obras_common::config::{
    load_toml_config, locate_config_file, ConfigSource, Settings, ENV_CONFIG_PATH,
    ENV_DATABASE_PATH, ENV_UF,
};
use obras_common::Error;
use serial_test::serial;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn clear_env() {
    for key in [ENV_CONFIG_PATH, ENV_DATABASE_PATH, ENV_UF] {
        std::env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_explicit_config_path_is_used() {
    clear_env();
    let file = write_config(
        r#"
        database_path = "/var/lib/obras/obras.db"

        [api]
        uf = "MG"
        transport_backoff_secs = 5

        [logging]
        level = "warn"
        "#,
    );
    std::env::set_var(ENV_CONFIG_PATH, file.path());

    assert_eq!(locate_config_file(), ConfigSource::File(file.path().to_path_buf()));

    let (settings, source) = Settings::load().unwrap();
    assert_eq!(source, ConfigSource::File(file.path().to_path_buf()));
    assert_eq!(settings.store.database_path, PathBuf::from("/var/lib/obras/obras.db"));
    assert_eq!(settings.api.uf, "MG");
    assert_eq!(settings.api.transport_backoff, Duration::from_secs(5));
    assert_eq!(settings.log_level, "warn");

    clear_env();
}

#[test]
#[serial]
fn test_environment_beats_config_file() {
    clear_env();
    let file = write_config("[api]\nuf = \"MG\"\n");
    std::env::set_var(ENV_CONFIG_PATH, file.path());
    std::env::set_var(ENV_UF, "BA");
    std::env::set_var(ENV_DATABASE_PATH, "/tmp/obras-env.db");

    let (settings, _) = Settings::load().unwrap();
    assert_eq!(settings.api.uf, "BA");
    assert_eq!(settings.store.database_path, PathBuf::from("/tmp/obras-env.db"));

    clear_env();
}

#[test]
#[serial]
fn test_missing_explicit_config_falls_back_to_defaults() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let absent = dir.path().join("absent.toml");
    std::env::set_var(ENV_CONFIG_PATH, &absent);

    let (settings, source) = Settings::load().unwrap();
    assert_eq!(source, ConfigSource::MissingExplicit(absent));
    assert_eq!(settings.api.uf, "DF");

    clear_env();
}

#[test]
#[serial]
fn test_malformed_config_file_is_rejected() {
    clear_env();
    let file = write_config("[api\nuf = ");
    std::env::set_var(ENV_CONFIG_PATH, file.path());

    let err = Settings::load().unwrap_err();
    assert!(matches!(err, Error::Config(_)));

    clear_env();
}

#[test]
fn test_load_toml_config_reports_unreadable_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_toml_config(&dir.path().join("nope.toml")).unwrap_err();
    match err {
        Error::Config(message) => assert!(message.contains("nope.toml")),
        other => panic!("expected config error, got {:?}", other),
    }
}
