//! Concurrency layer for stratatx
//!
//! This crate implements transaction propagation with:
//! - TransactionContext: one logical transaction per boundary crossing
//! - ContextRegistry: thread-local binding of the current context
//! - TransactionManager: begin/finish state machine over a resource manager
//! - TransactionMetrics: commit/rollback counters

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod manager;
pub mod metrics;
pub mod registry;

pub use context::{Participation, SharedResource, TransactionContext};
pub use manager::{Completion, TransactionManager, TransactionStatus};
pub use metrics::TransactionMetrics;
pub use registry::ContextRegistry;
