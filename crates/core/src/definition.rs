//! Transaction definitions
//!
//! A [`TransactionDefinition`] is what a declaration resolves to for one
//! operation: propagation, access mode, optional name, and rollback rules.

use crate::propagation::Propagation;
use crate::rollback::RollbackRules;
use serde::{Deserialize, Serialize};

/// Controls whether a transaction allows writes or is read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    #[default]
    ReadWrite,
    ReadOnly,
}

impl AccessMode {
    /// Map a read-only flag to an access mode
    pub fn from_read_only(read_only: bool) -> Self {
        if read_only {
            AccessMode::ReadOnly
        } else {
            AccessMode::ReadWrite
        }
    }

    /// Check if this mode rejects writes
    pub fn is_read_only(&self) -> bool {
        matches!(self, AccessMode::ReadOnly)
    }
}

/// Resolved transactional attributes of one operation.
///
/// Use the builder pattern to configure a definition:
///
/// ```
/// use stratatx_core::{Propagation, TransactionDefinition};
///
/// let def = TransactionDefinition::new()
///     .propagation(Propagation::RequiresNew)
///     .read_only(true)
///     .named("LogRepository.save");
/// assert!(def.is_read_only());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionDefinition {
    pub propagation: Propagation,
    pub access_mode: AccessMode,
    pub name: Option<String>,
    pub rollback_rules: RollbackRules,
}

impl TransactionDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a definition with the given propagation
    pub fn with_propagation(propagation: Propagation) -> Self {
        Self::new().propagation(propagation)
    }

    pub fn propagation(mut self, propagation: Propagation) -> Self {
        self.propagation = propagation;
        self
    }

    pub fn access_mode(mut self, mode: AccessMode) -> Self {
        self.access_mode = mode;
        self
    }

    pub fn read_only(self, read_only: bool) -> Self {
        self.access_mode(AccessMode::from_read_only(read_only))
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn rollback_rules(mut self, rules: RollbackRules) -> Self {
        self.rollback_rules = rules;
        self
    }

    pub fn is_read_only(&self) -> bool {
        self.access_mode.is_read_only()
    }
}
