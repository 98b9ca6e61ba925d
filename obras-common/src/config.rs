//! Configuration loading
//!
//! Every setting resolves in priority order:
//! 1. Environment variable
//! 2. TOML config file
//! 3. Compiled default (fallback)
//!
//! A missing config file is not an error: the defaults apply and the
//! returned [`ConfigSource`] says so. An unreadable or malformed file is.
//!
//! Loading happens before the log subscriber exists (the log level is
//! itself a setting), so nothing here logs directly. Binaries call
//! [`ConfigSource::log`] once tracing is installed.

use crate::retry::RetryPolicy;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const ENV_CONFIG_PATH: &str = "OBRAS_CONFIG";
pub const ENV_DATABASE_PATH: &str = "OBRAS_DATABASE_PATH";
pub const ENV_API_BASE_URL: &str = "OBRAS_API_BASE_URL";
pub const ENV_UF: &str = "OBRAS_UF";
pub const ENV_LOG_LEVEL: &str = "OBRAS_LOG_LEVEL";
pub const ENV_DASHBOARD_BIND: &str = "OBRAS_DASHBOARD_BIND";

const DEFAULT_BASE_URL: &str = "https://api.obrasgov.gestao.gov.br/obrasgov/api/projeto-investimento";
const DEFAULT_UF: &str = "DF";
const DEFAULT_PAGE_DELAY_MS: u64 = 1000;
const DEFAULT_RATE_LIMIT_BACKOFF_SECS: u64 = 60;
const DEFAULT_TRANSPORT_BACKOFF_SECS: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONNECT_ATTEMPTS: u32 = 10;
const DEFAULT_CONNECT_DELAY_SECS: u64 = 5;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_DASHBOARD_BIND: &str = "127.0.0.1:5730";

/// Raw contents of config.toml; every field optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub database_path: Option<PathBuf>,
    pub api: ApiSection,
    pub store: StoreSection,
    pub logging: LoggingSection,
    pub dashboard: DashboardSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    pub base_url: Option<String>,
    pub uf: Option<String>,
    pub page_delay_ms: Option<u64>,
    pub rate_limit_backoff_secs: Option<u64>,
    pub transport_backoff_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub connect_attempts: Option<u32>,
    pub connect_delay_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DashboardSection {
    pub bind: Option<String>,
}

/// Upstream API settings consumed by the record fetcher
#[derive(Debug, Clone, PartialEq)]
pub struct ApiSettings {
    pub base_url: String,
    /// State filter sent as the `uf` query parameter
    pub uf: String,
    /// Pause between successful page requests
    pub page_delay: Duration,
    /// Wait after an HTTP 429 before retrying the same page
    pub rate_limit_backoff: Duration,
    /// Wait after a transport error or 5xx before retrying the same page
    pub transport_backoff: Duration,
    pub request_timeout: Duration,
}

/// Persistent store connection settings
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSettings {
    pub database_path: PathBuf,
    pub connect_attempts: u32,
    pub connect_delay: Duration,
}

impl StoreSettings {
    /// Bounded policy used when opening the store
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::bounded(self.connect_attempts, self.connect_delay)
    }
}

/// Where the TOML layer of the settings came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from this file
    File(PathBuf),
    /// `$OBRAS_CONFIG` named a file that does not exist
    MissingExplicit(PathBuf),
    /// No file at the default location
    Defaults,
}

impl ConfigSource {
    /// Report the config file outcome; call after tracing is initialized
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded config file: {}", path.display()),
            ConfigSource::MissingExplicit(path) => warn!(
                "{} points to missing file {}, using defaults and environment",
                ENV_CONFIG_PATH,
                path.display()
            ),
            ConfigSource::Defaults => {
                warn!("No config file found, using defaults and environment")
            }
        }
    }
}

/// Fully resolved settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api: ApiSettings,
    pub store: StoreSettings,
    pub log_level: String,
    pub dashboard_bind: String,
}

impl Settings {
    /// Resolve settings from the process environment and the config file
    pub fn load() -> Result<(Self, ConfigSource)> {
        let source = locate_config_file();
        let toml_config = match &source {
            ConfigSource::File(path) => load_toml_config(path)?,
            ConfigSource::MissingExplicit(_) | ConfigSource::Defaults => TomlConfig::default(),
        };

        let settings = Self::resolve(&toml_config, |key| std::env::var(key).ok());
        Ok((settings, source))
    }

    /// Resolve settings from an already-parsed TOML config and an
    /// environment lookup (injectable for tests)
    pub fn resolve<F>(toml_config: &TomlConfig, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        let api = &toml_config.api;
        let store = &toml_config.store;

        let database_path = env(ENV_DATABASE_PATH)
            .map(PathBuf::from)
            .or_else(|| toml_config.database_path.clone())
            .unwrap_or_else(default_database_path);

        Settings {
            api: ApiSettings {
                base_url: env(ENV_API_BASE_URL)
                    .or_else(|| api.base_url.clone())
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                uf: env(ENV_UF)
                    .or_else(|| api.uf.clone())
                    .unwrap_or_else(|| DEFAULT_UF.to_string()),
                page_delay: Duration::from_millis(
                    api.page_delay_ms.unwrap_or(DEFAULT_PAGE_DELAY_MS),
                ),
                rate_limit_backoff: Duration::from_secs(
                    api.rate_limit_backoff_secs
                        .unwrap_or(DEFAULT_RATE_LIMIT_BACKOFF_SECS),
                ),
                transport_backoff: Duration::from_secs(
                    api.transport_backoff_secs
                        .unwrap_or(DEFAULT_TRANSPORT_BACKOFF_SECS),
                ),
                request_timeout: Duration::from_secs(
                    api.request_timeout_secs
                        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
                ),
            },
            store: StoreSettings {
                database_path,
                connect_attempts: store.connect_attempts.unwrap_or(DEFAULT_CONNECT_ATTEMPTS),
                connect_delay: Duration::from_secs(
                    store.connect_delay_secs.unwrap_or(DEFAULT_CONNECT_DELAY_SECS),
                ),
            },
            log_level: env(ENV_LOG_LEVEL)
                .or_else(|| toml_config.logging.level.clone())
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            dashboard_bind: env(ENV_DASHBOARD_BIND)
                .or_else(|| toml_config.dashboard.bind.clone())
                .unwrap_or_else(|| DEFAULT_DASHBOARD_BIND.to_string()),
        }
    }
}

/// Locate the config file: `$OBRAS_CONFIG`, then `<config_dir>/obrasgov/config.toml`
pub fn locate_config_file() -> ConfigSource {
    if let Ok(explicit) = std::env::var(ENV_CONFIG_PATH) {
        let path = PathBuf::from(explicit);
        if path.exists() {
            return ConfigSource::File(path);
        }
        return ConfigSource::MissingExplicit(path);
    }

    dirs::config_dir()
        .map(|d| d.join("obrasgov").join("config.toml"))
        .filter(|p| p.exists())
        .map_or(ConfigSource::Defaults, ConfigSource::File)
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;

    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))?;

    Ok(config)
}

/// OS-dependent default database location
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("obrasgov"))
        .unwrap_or_else(|| PathBuf::from("./obrasgov_data"))
        .join("obrasgov.db")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io;
    use std::sync::{Arc, Mutex};

    fn no_env(_: &str) -> Option<String> {
        None
    }

    /// Log sink shared between the subscriber and the assertions
    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLog {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    fn capture_log(source: &ConfigSource) -> String {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || source.log());
        log.text()
    }

    #[test]
    fn test_missing_explicit_config_is_warned() {
        let path = PathBuf::from("/nonexistent/obras/config.toml");
        let text = capture_log(&ConfigSource::MissingExplicit(path));

        assert!(text.contains("WARN"), "{text}");
        assert!(text.contains("OBRAS_CONFIG points to missing file"), "{text}");
        assert!(text.contains("/nonexistent/obras/config.toml"), "{text}");
    }

    #[test]
    fn test_config_source_outcomes_are_logged() {
        let loaded = capture_log(&ConfigSource::File(PathBuf::from("/etc/obras.toml")));
        assert!(loaded.contains("INFO"), "{loaded}");
        assert!(loaded.contains("Loaded config file: /etc/obras.toml"), "{loaded}");

        let defaults = capture_log(&ConfigSource::Defaults);
        assert!(defaults.contains("WARN"), "{defaults}");
        assert!(defaults.contains("No config file found"), "{defaults}");
    }

    #[test]
    fn test_defaults_when_nothing_configured() {
        let settings = Settings::resolve(&TomlConfig::default(), no_env);

        assert_eq!(settings.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.api.uf, "DF");
        assert_eq!(settings.api.page_delay, Duration::from_secs(1));
        assert_eq!(settings.api.rate_limit_backoff, Duration::from_secs(60));
        assert_eq!(settings.api.transport_backoff, Duration::from_secs(30));
        assert_eq!(settings.store.connect_attempts, 10);
        assert_eq!(settings.store.connect_delay, Duration::from_secs(5));
        assert_eq!(settings.log_level, "info");
        assert!(settings.store.database_path.ends_with("obrasgov.db"));
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
            database_path = "/srv/obras/data.db"

            [api]
            uf = "GO"
            page_delay_ms = 250

            [store]
            connect_attempts = 3
            "#,
        )
        .unwrap();

        let settings = Settings::resolve(&toml_config, no_env);

        assert_eq!(settings.store.database_path, PathBuf::from("/srv/obras/data.db"));
        assert_eq!(settings.api.uf, "GO");
        assert_eq!(settings.api.page_delay, Duration::from_millis(250));
        assert_eq!(settings.store.connect_attempts, 3);
        assert_eq!(settings.store.retry_policy().max_attempts, Some(3));
    }

    #[test]
    fn test_env_overrides_toml() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
            database_path = "/from/toml.db"
            [api]
            uf = "GO"
            "#,
        )
        .unwrap();

        let env: HashMap<&str, &str> = [
            (ENV_DATABASE_PATH, "/from/env.db"),
            (ENV_UF, "SP"),
            (ENV_LOG_LEVEL, "debug"),
        ]
        .into_iter()
        .collect();

        let settings =
            Settings::resolve(&toml_config, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(settings.store.database_path, PathBuf::from("/from/env.db"));
        assert_eq!(settings.api.uf, "SP");
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn test_blank_env_value_is_ignored() {
        let settings = Settings::resolve(&TomlConfig::default(), |k| {
            (k == ENV_UF).then(|| "  ".to_string())
        });
        assert_eq!(settings.api.uf, "DF");
    }

    #[test]
    fn test_wrong_value_type_is_an_error() {
        let parsed = toml::from_str::<TomlConfig>("[api]\npage_delay_ms = \"fast\"");
        assert!(parsed.is_err());
    }
}
