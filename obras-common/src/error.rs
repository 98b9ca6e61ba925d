//! Common error types for the ObrasGov pipeline

use thiserror::Error;

/// Common result type for pipeline and store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the ETL and dashboard binaries
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Store unreachable after the connection retry budget was spent
    #[error("{target} unreachable after {attempts} attempts: {last_error}")]
    Connectivity {
        target: String,
        attempts: u32,
        last_error: String,
    },

    /// Referential integrity violated by normalized data (normalizer defect)
    #[error("Integrity violation: {0}")]
    Integrity(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_message_names_target_and_attempts() {
        let err = Error::Connectivity {
            target: "store".to_string(),
            attempts: 10,
            last_error: "unable to open database file".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "store unreachable after 10 attempts: unable to open database file"
        );
    }

    #[test]
    fn test_sqlx_errors_convert() {
        let err: Error = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, Error::Database(_)));
        assert!(err.to_string().starts_with("Database error:"));
    }
}
