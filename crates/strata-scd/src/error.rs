//! Error types for `strata-scd`.

/// Result type for dimension and extract jobs.
pub type Result<T> = std::result::Result<T, ScdError>;

/// Errors raised by reconciliation and extract jobs.
///
/// Every variant is fatal to the run that raised it. Jobs never retry
/// internally; rescheduling is the caller's decision.
#[derive(Debug, thiserror::Error)]
pub enum ScdError {
    /// Misconfiguration detected before any data moved (missing table,
    /// unknown registry entry).
    #[error("setup error: {message}")]
    Setup {
        /// Human-readable error details.
        message: String,
    },

    /// Invalid arguments from a caller.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Human-readable error details.
        message: String,
    },

    /// Extracted data did not fit the registered schema.
    #[error("schema cast failed: {message}")]
    SchemaCast {
        /// Human-readable error details.
        message: String,
    },

    /// The table moved on between read and commit.
    #[error("conflict: {message}")]
    Conflict {
        /// Human-readable conflict details.
        message: String,
    },

    /// Stored data breaks a dimension invariant (e.g. two active rows for one key).
    #[error("invariant violation: {message}")]
    Invariant {
        /// Human-readable error details.
        message: String,
    },

    /// The extract source failed.
    #[error("source error: {message}")]
    Source {
        /// Human-readable error details.
        message: String,
    },

    /// The analytical query failed.
    #[error("query failed: {message}")]
    Query {
        /// Human-readable error details.
        message: String,
    },

    /// A storage or encoding operation failed.
    #[error(transparent)]
    Core(strata_core::Error),
}

impl ScdError {
    /// Creates a setup error.
    #[must_use]
    pub fn setup(message: impl Into<String>) -> Self {
        Self::Setup {
            message: message.into(),
        }
    }

    /// Creates an invalid input error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates an invariant violation error.
    #[must_use]
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }

    /// Creates an extract source error.
    #[must_use]
    pub fn extract(message: impl Into<String>) -> Self {
        Self::Source {
            message: message.into(),
        }
    }

    /// Creates a query error.
    #[must_use]
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }
}

impl From<strata_core::Error> for ScdError {
    fn from(error: strata_core::Error) -> Self {
        match error {
            strata_core::Error::SchemaCast { message } => Self::SchemaCast { message },
            strata_core::Error::Conflict { message } => Self::Conflict { message },
            other => Self::Core(other),
        }
    }
}
