//! Error types for tally-core

use thiserror::Error;

/// Result type alias using tally-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tally-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No rate window covers the requested date
    #[error("No effective rate for product {product_id} ({unit}) on {date}")]
    NoEffectiveRate {
        product_id: String,
        unit: String,
        date: chrono::NaiveDate,
    },

    /// A unique key (idempotency key or device origin) is already taken
    #[error("Duplicate record: {0}")]
    Duplicate(String),
}

impl Error {
    /// Returns true if the error was raised by a storage-level uniqueness constraint.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Duplicate(_) => true,
            Self::Sqlite(rusqlite::Error::SqliteFailure(failure, _)) => {
                failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            }
            _ => false,
        }
    }

    /// Returns true if the error came from caller input rather than storage.
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::InvalidInput(_)
                | Self::Serialization(_)
                | Self::NoEffectiveRate { .. }
                | Self::Duplicate(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(Error::InvalidInput("bad".into()).is_client_error());
        assert!(!Error::Database("locked".into()).is_client_error());
        assert!(Error::Duplicate("key".into()).is_unique_violation());
        assert!(!Error::NotFound("id".into()).is_unique_violation());
    }

    #[test]
    fn no_effective_rate_message_names_the_window() {
        let err = Error::NoEffectiveRate {
            product_id: "p-1".into(),
            unit: "kg".into(),
            date: chrono::NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(),
        };
        let msg = err.to_string();
        assert!(msg.contains("p-1"));
        assert!(msg.contains("2024-05-31"));
    }
}
