//! Store initialization
//!
//! The pipeline holds exactly one connection for the whole run: the pool
//! is capped at one connection and foreign keys are enabled on it.

use crate::config::StoreSettings;
use crate::retry::{retry, RetryDecision, RetryError};
use crate::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn single_connection_pool() -> SqlitePoolOptions {
    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
}

/// Open (creating if necessary) the store at `db_path`, single attempt
pub async fn connect_store(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = single_connection_pool().connect_with(options).await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    Ok(pool)
}

/// Open the store with the configured bounded retry budget
///
/// Exhausting the budget yields [`Error::Connectivity`], which the entry
/// point turns into a non-zero exit.
pub async fn open_store(settings: &StoreSettings) -> Result<SqlitePool> {
    let path = settings.database_path.as_path();

    let classify = |err: &Error| match err {
        Error::Database(_) | Error::Io(_) => RetryDecision::Retry,
        _ => RetryDecision::Fail,
    };

    retry("store connection", &settings.retry_policy(), classify, || connect_store(path))
        .await
        .map_err(|e| match e {
            RetryError::Fatal(err) => err,
            RetryError::Exhausted { attempts, last } => Error::Connectivity {
                target: format!("store {}", path.display()),
                attempts,
                last_error: last.to_string(),
            },
        })
}

/// Private in-memory store (tests and dry runs)
pub async fn open_memory_store() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    Ok(single_connection_pool().connect_with(options).await?)
}

/// Open an existing store read-only (dashboard side)
pub async fn connect_readonly(db_path: &Path) -> Result<SqlitePool> {
    if !db_path.exists() {
        return Err(Error::NotFound(format!(
            "Database not found: {}. Run obras-etl first to create it.",
            db_path.display()
        )));
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .read_only(true)
        .busy_timeout(BUSY_TIMEOUT);

    Ok(SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?)
}
