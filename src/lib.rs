//! # stratatx
//!
//! Declarative transaction management for Strata services.
//!
//! Business components declare transactional behavior per operation
//! (propagation policy, read-only flag, rollback rules) and are wrapped in a
//! [`Proxy`] that begins, joins, suspends or nests transactions around each
//! intercepted call.
//!
//! ## Quick Start
//!
//! ```ignore
//! use stratatx::prelude::*;
//!
//! let runtime = TxRuntime::ephemeral();
//! runtime.declare_operation("MemberService", "join", TransactionAttribute::new());
//! runtime.declare_operation(
//!     "LogService",
//!     "record",
//!     TransactionAttribute::new().propagation(Propagation::RequiresNew),
//! );
//!
//! let members = runtime.proxy(MemberServiceImpl::new(..), ComponentDescriptor::new("MemberService"));
//! members.invoke("join", |service| service.join("kim"))?;
//! ```
//!
//! ## Self-invocation
//!
//! Only calls that pass through a proxy are intercepted. A component calling
//! its own operation through `self` runs that operation inside whatever
//! scope the caller already has; the callee's declaration is not consulted.
//! Split the callee into a separately proxied component when it needs its
//! own transactional behavior.
//!
//! ## Crates
//!
//! - `stratatx-core`: definitions, propagation policies, rollback rules, driver traits
//! - `stratatx-concurrency`: per-thread context registry and the transaction manager
//! - `stratatx-engine`: declarations, interceptor, proxies, in-memory driver

#![warn(missing_docs)]

mod error;
mod lifecycle;
mod runtime;
mod types;

pub mod prelude;

// Re-export main entry points
pub use runtime::{TxRuntime, TxRuntimeBuilder};
pub use error::{Error, Result};
pub use lifecycle::{Component, INIT_OPERATION, READY_OPERATION};

// Re-export types
pub use types::*;
