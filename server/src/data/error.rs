//! Unified error type for the data layer

use thiserror::Error;

use crate::data::duckdb::DuckdbError;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("DuckDB error: {0}")]
    Duckdb(#[from] duckdb::Error),

    #[error("Migration {version} ({name}) failed on {backend}: {error}")]
    MigrationFailed {
        backend: &'static str,
        version: i32,
        name: String,
        error: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Query timeout after {timeout_secs}s on {backend}")]
    Timeout {
        backend: &'static str,
        timeout_secs: u64,
    },

    /// Stored data could not be decoded
    #[error("Corrupt {what}: {reason}")]
    Corrupt { what: &'static str, reason: String },
}

impl DataError {
    pub fn timeout(backend: &'static str, timeout_secs: u64) -> Self {
        Self::Timeout {
            backend,
            timeout_secs,
        }
    }
}

impl From<DuckdbError> for DataError {
    fn from(e: DuckdbError) -> Self {
        match e {
            DuckdbError::Database(e) => Self::Duckdb(e),
            DuckdbError::MigrationFailed {
                version,
                name,
                error,
            } => Self::MigrationFailed {
                backend: "duckdb",
                version,
                name,
                error,
            },
            DuckdbError::Io(e) => Self::Io(e),
            DuckdbError::Timeout { timeout_secs } => Self::timeout("duckdb", timeout_secs),
            DuckdbError::Corrupt { what, reason } => Self::Corrupt { what, reason },
        }
    }
}
