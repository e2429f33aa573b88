//! Core types for declarative transaction management
//!
//! This crate defines the vocabulary shared by every layer:
//! - [`Propagation`] and its decision table
//! - [`TransactionDefinition`]: resolved attributes of one operation
//! - [`RollbackRules`]: rollback classification of failures
//! - [`ResourceManager`] / [`ResourceHandle`]: the storage driver contract
//! - [`TransactionError`]: structural errors

#![warn(clippy::all)]

pub mod definition;
pub mod error;
pub mod propagation;
pub mod resource;
pub mod rollback;
pub mod types;

pub use definition::{AccessMode, TransactionDefinition};
pub use error::{Result, TransactionError};
pub use propagation::{Propagation, PropagationDecision};
pub use resource::{BeginOptions, ResourceHandle, ResourceManager, Savepoint};
pub use rollback::{Classify, RollbackDecision, RollbackRule, RollbackRules, Severity};
pub use types::TransactionId;
