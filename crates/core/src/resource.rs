//! Resource handle contract
//!
//! A storage driver plugs into the transaction core by implementing
//! [`ResourceManager`] (opens handles) and [`ResourceHandle`] (one unit of
//! connection-scoped work). Every operation fails with
//! [`TransactionError::Resource`](crate::TransactionError::Resource) when the
//! underlying connection is unavailable or already closed.
//!
//! Handles are owned exclusively by the transaction that began them.
//! Participating and nested transactions borrow the owner's handle and never
//! commit or close it.

use crate::error::Result;
use std::any::Any;
use std::fmt;

/// Options passed to [`ResourceManager::begin`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BeginOptions {
    /// Handle must reject writes
    pub read_only: bool,
    /// Declared transaction name, for diagnostics
    pub name: Option<String>,
}

/// Restorable mid-transaction checkpoint
///
/// Opaque to the core; drivers encode whatever they need in `id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Savepoint {
    id: u64,
}

impl Savepoint {
    /// Create a savepoint token
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    /// Driver-assigned identifier
    pub fn id(&self) -> u64 {
        self.id
    }

    /// SQL-style name (`SP_<id>`)
    pub fn name(&self) -> String {
        format!("SP_{}", self.id)
    }
}

impl fmt::Display for Savepoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SP_{}", self.id)
    }
}

/// One unit of connection-scoped work
pub trait ResourceHandle: Send {
    /// Durably apply all work done through this handle
    fn commit(&mut self) -> Result<()>;

    /// Discard all work done through this handle
    fn rollback(&mut self) -> Result<()>;

    /// Create a savepoint at the current position
    fn savepoint(&mut self) -> Result<Savepoint>;

    /// Discard work done after `savepoint`; the savepoint stays valid
    fn rollback_to_savepoint(&mut self, savepoint: &Savepoint) -> Result<()>;

    /// Forget `savepoint`, keeping the work done after it
    fn release_savepoint(&mut self, savepoint: Savepoint) -> Result<()>;

    /// Release the underlying connection
    fn close(&mut self) -> Result<()>;

    /// Whether the handle rejects writes
    fn is_read_only(&self) -> bool;

    /// Downcast support so drivers can reach their concrete handle type
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Storage driver entry point
pub trait ResourceManager: Send + Sync {
    /// Acquire a connection and begin a transaction on it
    fn begin(&self, options: &BeginOptions) -> Result<Box<dyn ResourceHandle>>;
}
