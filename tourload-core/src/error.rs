//! Error types for tourload

use std::fmt;
use thiserror::Error;

use crate::ident::EntityKind;

/// Result type alias for tourload operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tourload operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid or inconsistent scale parameters
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The store accepted fewer rows than a flush submitted
    #[error("Bulk load into `{table}` failed: {inserted} of {submitted} rows inserted: {first_error}")]
    BulkLoad {
        table: String,
        submitted: u64,
        inserted: u64,
        first_error: String,
    },

    /// An ordinal outside `[0, count)` was handed to the identifier codec
    #[error("Identifier overflow: {kind} ordinal {ordinal} is outside [0, {count})")]
    IdentifierOverflow {
        kind: EntityKind,
        ordinal: u64,
        count: u64,
    },

    /// A finished verification report contained failing checks
    #[error("Verification failed: {failed} of {total} checks failed")]
    Verification { failed: usize, total: usize },

    /// Storage collaborator errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl Error {
    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid operation error
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    /// Create a bulk load error from a short flush
    pub fn bulk_load(
        table: impl Into<String>,
        submitted: u64,
        inserted: u64,
        first_error: impl Into<String>,
    ) -> Self {
        Self::BulkLoad {
            table: table.into(),
            submitted,
            inserted,
            first_error: first_error.into(),
        }
    }

    /// Whether the error must stop the run.
    ///
    /// Only a finished verification report is non-fatal: it has already
    /// enumerated everything that is inconsistent.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Verification { .. })
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Io(_) => ErrorCategory::System,
            Error::Serialization(_) => ErrorCategory::Data,
            Error::Configuration(_) => ErrorCategory::Configuration,
            Error::BulkLoad { .. } => ErrorCategory::Load,
            Error::IdentifierOverflow { .. } => ErrorCategory::Generation,
            Error::Verification { .. } => ErrorCategory::Verification,
            Error::Storage(_) => ErrorCategory::Storage,
            Error::NotFound(_) => ErrorCategory::NotFound,
            Error::InvalidOperation(_) => ErrorCategory::Logic,
        }
    }
}

/// Error categories for grouping related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// System-level errors (I/O)
    System,
    /// Data-related errors (serialization)
    Data,
    /// Scale parameter or config errors
    Configuration,
    /// Row generation contract violations
    Generation,
    /// Bulk load failures
    Load,
    /// Invariant check failures
    Verification,
    /// Storage collaborator errors
    Storage,
    /// Resource not found
    NotFound,
    /// Logic errors
    Logic,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::System => "System",
            ErrorCategory::Data => "Data",
            ErrorCategory::Configuration => "Configuration",
            ErrorCategory::Generation => "Generation",
            ErrorCategory::Load => "Load",
            ErrorCategory::Verification => "Verification",
            ErrorCategory::Storage => "Storage",
            ErrorCategory::NotFound => "NotFound",
            ErrorCategory::Logic => "Logic",
        };
        write!(f, "{}", name)
    }
}

/// Convert from bincode errors
impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Convert from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
