//! Public types for the stratatx API.
//!
//! This module re-exports types from internal crates with a clean public interface.

// Definitions
pub use stratatx_core::{AccessMode, Propagation, TransactionDefinition, TransactionId};

// Rollback classification
pub use stratatx_core::{Classify, RollbackDecision, RollbackRule, RollbackRules, Severity};

// Driver seam
pub use stratatx_core::{BeginOptions, ResourceHandle, ResourceManager, Savepoint, TransactionError};

// Propagation engine
pub use stratatx_concurrency::{
    Completion, Participation, TransactionContext, TransactionManager, TransactionMetrics,
    TransactionStatus,
};

// Interception boundary and reference driver
pub use stratatx_engine::{
    AttributeRegistry, ComponentDescriptor, DeclarationSite, InterceptorConfig, MemoryConnection,
    MemoryStore, MemoryTemplate, Proxy, StoreStats, TransactionAttribute, TransactionInterceptor,
};

/// Transaction state observed from the calling thread
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionSnapshot {
    /// A transaction is bound to the calling thread
    pub active: bool,
    /// The bound transaction is read-only
    pub read_only: bool,
    /// Name of the bound transaction
    pub name: Option<String>,
    /// Policy the current scope was started with
    pub propagation: Option<Propagation>,
    /// The bound transaction will roll back
    pub rollback_only: bool,
}
