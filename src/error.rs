//! Unified error type for stratatx.
//!
//! Business code can use [`Error`] directly as the failure type of its
//! transactional operations: it carries either a classified business
//! failure or a structural [`TransactionError`].

use stratatx_core::{Classify, Severity, TransactionError};
use thiserror::Error;

/// All stratatx errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// Failure raised by business code
    #[error("{code}: {message}")]
    Business {
        /// Dotted failure code (e.g. `order.not_enough_money`)
        code: String,
        /// Checked (expected) or unchecked (unexpected)
        severity: Severity,
        /// Human-readable message
        message: String,
    },

    /// Structural error raised by the transaction machinery
    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

/// Result type for stratatx operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Expected business failure; commits by default
    pub fn checked(code: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Business {
            code: code.into(),
            severity: Severity::Checked,
            message: message.into(),
        }
    }

    /// Unexpected failure; rolls back by default
    pub fn unchecked(code: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Business {
            code: code.into(),
            severity: Severity::Unchecked,
            message: message.into(),
        }
    }

    /// Check if this is a business failure.
    pub fn is_business(&self) -> bool {
        matches!(self, Error::Business { .. })
    }

    /// Check if a commit was refused because the transaction was rollback-only.
    pub fn is_unexpected_rollback(&self) -> bool {
        matches!(self, Error::Transaction(e) if e.is_unexpected_rollback())
    }

    /// Check if this is a storage error.
    pub fn is_resource(&self) -> bool {
        matches!(self, Error::Transaction(e) if e.is_resource())
    }

    /// Structural error, if this is one
    pub fn as_transaction_error(&self) -> Option<&TransactionError> {
        match self {
            Error::Transaction(e) => Some(e),
            Error::Business { .. } => None,
        }
    }
}

impl Classify for Error {
    fn severity(&self) -> Severity {
        match self {
            Error::Business { severity, .. } => *severity,
            Error::Transaction(e) => e.severity(),
        }
    }

    fn failure_code(&self) -> &str {
        match self {
            Error::Business { code, .. } => code,
            Error::Transaction(e) => e.failure_code(),
        }
    }
}
