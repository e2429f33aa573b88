//! Convenient imports for stratatx.
//!
//! ```ignore
//! use stratatx::prelude::*;
//!
//! let runtime = TxRuntime::ephemeral();
//! runtime.declare_operation("MemberService", "join", TransactionAttribute::new());
//! ```

// Main entry point
pub use crate::runtime::{TxRuntime, TxRuntimeBuilder};

// Error handling
pub use crate::error::{Error, Result};

// Components
pub use crate::lifecycle::Component;

// Core types
pub use crate::types::{
    Classify, ComponentDescriptor, MemoryStore, MemoryTemplate, Propagation, Proxy, RollbackRule,
    Severity, TransactionAttribute, TransactionDefinition, TransactionSnapshot,
};
