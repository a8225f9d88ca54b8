//! Error types for the `pgvector-store` crate.

use thiserror::Error;

/// Errors that can occur while orchestrating vector storage.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A configuration validation error, raised before any database call.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The database connection could not be opened.
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Neither client-library shape is usable against the current schema.
    #[error("API compatibility error: {0}")]
    ApiIncompatibility(String),

    /// The batched write failed. The write path is all-or-nothing per call.
    #[error("Storage write error (collection '{collection}'): {message}")]
    StorageWrite {
        /// The collection targeted by the failed write.
        collection: String,
        /// A description of the failure.
        message: String,
    },

    /// An error from the database driver in a fatal (non-optimization) phase.
    #[error("Database error during {phase}: {message}")]
    Database {
        /// The orchestration phase that was executing.
        phase: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },
}

impl StoreError {
    pub(crate) fn database(phase: &str, e: sqlx::Error) -> Self {
        StoreError::Database { phase: phase.to_string(), message: e.to_string() }
    }
}

/// A convenience result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
