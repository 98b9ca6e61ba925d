//! # ObrasGov Common Library
//!
//! Shared code for the ObrasGov ETL and dashboard binaries:
//! - Error type and result alias
//! - Configuration loading (env → TOML → defaults)
//! - Bounded retry-with-backoff combinator
//! - Store initialization, table declarations and full-refresh clearing
//! - Normalized row models and the dashboard view reader

pub mod config;
pub mod db;
pub mod error;
pub mod retry;

pub use error::{Error, Result};
pub use retry::{retry, RetryDecision, RetryError, RetryPolicy};
