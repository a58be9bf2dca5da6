//! Error types and result aliases for Strata.
//!
//! This module defines the shared error types used by the storage, table, and
//! schema layers. Errors are structured for programmatic handling and carry
//! enough context to be logged without the caller re-describing the failure.

use std::fmt;

/// The result type used throughout Strata.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Strata core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A path or object was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A named resource (table, schema entry) was not found.
    #[error("not found: {resource_type} '{id}'")]
    ResourceNotFound {
        /// The type of resource that was not found.
        resource_type: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// A storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Parquet encoding or decoding failed.
    #[error("parquet error: {message}")]
    Parquet {
        /// Description of the parquet failure.
        message: String,
    },

    /// Tabular data could not be cast to the expected schema.
    #[error("schema cast failed: {message}")]
    SchemaCast {
        /// Description of the mismatch.
        message: String,
    },

    /// A conditional write lost against a concurrent writer.
    #[error("conflict: {message}")]
    Conflict {
        /// Description of the conflict.
        message: String,
    },

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new resource not found error.
    #[must_use]
    pub fn resource_not_found(resource_type: &'static str, id: impl fmt::Display) -> Self {
        Self::ResourceNotFound {
            resource_type,
            id: id.to_string(),
        }
    }

    /// Creates a new schema cast error.
    #[must_use]
    pub fn schema_cast(message: impl Into<String>) -> Self {
        Self::SchemaCast {
            message: message.into(),
        }
    }

    /// Creates a new parquet error.
    #[must_use]
    pub fn parquet(message: impl Into<String>) -> Self {
        Self::Parquet {
            message: message.into(),
        }
    }

    /// Creates a new conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Returns true for "not found" style errors.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::ResourceNotFound { .. })
    }
}
