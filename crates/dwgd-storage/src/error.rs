//! Error types for the dwgd store.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying SQL error, including constraint violations.
    #[error(transparent)]
    Sql(#[from] sqlx::Error),

    /// A mutating statement touched an unexpected number of rows.
    #[error("number of affected rows: {actual} is not 1")]
    RowCount {
        /// Rows the statement actually affected.
        actual: u64,
    },

    /// A stored value could not be parsed back into its in-memory form.
    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    /// A migration file failed to apply.
    #[error("migration error: name={name}: {source}")]
    Migration {
        /// Migration file name.
        name: String,
        /// Underlying SQL error.
        #[source]
        source: sqlx::Error,
    },
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StorageError>;
