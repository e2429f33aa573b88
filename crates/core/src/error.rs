//! Structural error types for the transaction core
//!
//! [`TransactionError`] covers every failure the propagation machinery itself
//! can raise. Business failures are not represented here: they are opaque
//! values that the core only classifies (see [`crate::rollback`]).
//!
//! ## Error Kinds
//!
//! | Variant | Raised when |
//! |---------|-------------|
//! | Resource | Storage connection unavailable, closed, or commit/rollback failed |
//! | UnexpectedRollback | Commit attempted on a transaction marked rollback-only |
//! | IncompatibleTransaction | `Never` propagation with an active transaction |
//! | NoTransaction | `Mandatory` propagation without an active transaction |
//! | ReadOnlyViolation | Write attempted through a read-only transaction |
//! | IllegalState | Registry or LIFO ordering invariant broken |
//! | Config | Invalid interceptor configuration |

use crate::propagation::Propagation;
use crate::rollback::{Classify, Severity};
use thiserror::Error;

/// Result type for transaction-core operations
pub type Result<T> = std::result::Result<T, TransactionError>;

/// Errors raised by the transaction machinery
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransactionError {
    /// Underlying storage unavailable, closed, or failed to commit/roll back
    #[error("resource error: {0}")]
    Resource(String),

    /// Commit attempted on a transaction that was marked rollback-only
    ///
    /// The work was rolled back instead of being applied.
    #[error("transaction silently rolled back because it has been marked as rollback-only{}", .name.as_deref().map(|n| format!(" ({})", n)).unwrap_or_default())]
    UnexpectedRollback {
        /// Declared name of the owning transaction, if any
        name: Option<String>,
    },

    /// A `Never` operation was invoked inside an active transaction
    #[error("existing transaction found for operation declared with propagation {propagation}")]
    IncompatibleTransaction {
        /// The propagation that was violated
        propagation: Propagation,
    },

    /// A `Mandatory` operation was invoked without an active transaction
    #[error("no existing transaction found for operation declared with propagation {propagation}")]
    NoTransaction {
        /// The propagation that was violated
        propagation: Propagation,
    },

    /// A write was attempted through a read-only transaction
    #[error("write rejected: transaction is read-only ({0})")]
    ReadOnlyViolation(String),

    /// Registry or ordering invariant violated
    #[error("illegal transaction state: {0}")]
    IllegalState(String),

    /// Configuration could not be parsed or is inconsistent
    #[error("configuration error: {0}")]
    Config(String),
}

impl TransactionError {
    /// Check if this is an unexpected-rollback error
    pub fn is_unexpected_rollback(&self) -> bool {
        matches!(self, TransactionError::UnexpectedRollback { .. })
    }

    /// Check if this error came from the underlying resource
    pub fn is_resource(&self) -> bool {
        matches!(self, TransactionError::Resource(_))
    }

    /// Check if this error signals a propagation policy violation
    pub fn is_propagation_violation(&self) -> bool {
        matches!(
            self,
            TransactionError::IncompatibleTransaction { .. } | TransactionError::NoTransaction { .. }
        )
    }
}

// Structural errors are always unchecked: they roll back any transaction
// they pass through.
impl Classify for TransactionError {
    fn severity(&self) -> Severity {
        Severity::Unchecked
    }

    fn failure_code(&self) -> &str {
        match self {
            TransactionError::Resource(_) => "transaction.resource",
            TransactionError::UnexpectedRollback { .. } => "transaction.unexpected_rollback",
            TransactionError::IncompatibleTransaction { .. } => "transaction.incompatible",
            TransactionError::NoTransaction { .. } => "transaction.none",
            TransactionError::ReadOnlyViolation(_) => "transaction.read_only",
            TransactionError::IllegalState(_) => "transaction.illegal_state",
            TransactionError::Config(_) => "transaction.config",
        }
    }
}
