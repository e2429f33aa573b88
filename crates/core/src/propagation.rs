//! Propagation policies and the propagation decision table
//!
//! A [`Propagation`] declares how a transactional operation relates to the
//! transaction (if any) that is already current when it is invoked.
//! [`Propagation::decide`] turns a policy plus "is a transaction current?"
//! into a [`PropagationDecision`]; the transaction manager carries the
//! decision out.
//!
//! ```text
//!                 | no current tx          | current tx
//! ----------------+------------------------+------------------------------
//! Required        | StartNew               | Join
//! RequiresNew     | StartNew               | StartNew (suspend current)
//! Nested          | StartNew               | Nest (savepoint)
//! Supports        | NonTransactional       | Join
//! NotSupported    | NonTransactional       | NonTransactional (suspend)
//! Never           | NonTransactional       | IncompatibleTransaction
//! Mandatory       | NoTransaction          | Join
//! ```

use crate::error::{Result, TransactionError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Propagation policy of a transactional operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Propagation {
    /// Join the current transaction, or create one if none exists
    #[default]
    Required,
    /// Always create a new transaction, suspending the current one
    RequiresNew,
    /// Run inside a savepoint of the current transaction, or behave like `Required`
    Nested,
    /// Join the current transaction, or run without one
    Supports,
    /// Suspend the current transaction and run without one
    NotSupported,
    /// Fail if a transaction is current
    Never,
    /// Fail if no transaction is current
    Mandatory,
}

/// What the manager must do for one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagationDecision {
    /// Participate in the current transaction
    Join,
    /// Begin a fresh resource handle; `suspend` detaches the current context first
    StartNew {
        /// Whether a current context has to be suspended
        suspend: bool,
    },
    /// Create a savepoint inside the current transaction
    Nest,
    /// Run with no transaction bound; `suspend` detaches the current context first
    NonTransactional {
        /// Whether a current context has to be suspended
        suspend: bool,
    },
}

impl Propagation {
    /// All propagation policies, in declaration order
    pub const ALL: [Propagation; 7] = [
        Propagation::Required,
        Propagation::RequiresNew,
        Propagation::Nested,
        Propagation::Supports,
        Propagation::NotSupported,
        Propagation::Never,
        Propagation::Mandatory,
    ];

    /// Decide how to proceed given whether a transaction is current
    pub fn decide(self, has_current: bool) -> Result<PropagationDecision> {
        use PropagationDecision::*;
        let decision = match (self, has_current) {
            (Propagation::Required, true) => Join,
            (Propagation::Required, false) => StartNew { suspend: false },
            (Propagation::RequiresNew, current) => StartNew { suspend: current },
            (Propagation::Nested, true) => Nest,
            (Propagation::Nested, false) => StartNew { suspend: false },
            (Propagation::Supports, true) => Join,
            (Propagation::Supports, false) => NonTransactional { suspend: false },
            (Propagation::NotSupported, current) => NonTransactional { suspend: current },
            (Propagation::Never, true) => {
                return Err(TransactionError::IncompatibleTransaction { propagation: self })
            }
            (Propagation::Never, false) => NonTransactional { suspend: false },
            (Propagation::Mandatory, true) => Join,
            (Propagation::Mandatory, false) => {
                return Err(TransactionError::NoTransaction { propagation: self })
            }
        };
        Ok(decision)
    }

    /// Canonical upper-case name (`REQUIRES_NEW`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            Propagation::Required => "REQUIRED",
            Propagation::RequiresNew => "REQUIRES_NEW",
            Propagation::Nested => "NESTED",
            Propagation::Supports => "SUPPORTS",
            Propagation::NotSupported => "NOT_SUPPORTED",
            Propagation::Never => "NEVER",
            Propagation::Mandatory => "MANDATORY",
        }
    }
}

impl fmt::Display for Propagation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
