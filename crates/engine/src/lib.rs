//! Engine layer for stratatx
//!
//! Wires the propagation engine to business components:
//! - [`transaction`]: interception boundary and component proxies
//! - [`attributes`]: declarations and precedence resolution
//! - [`config`]: TOML configuration of the boundary
//! - [`memory`]: in-memory reference storage driver

#![warn(clippy::all)]

pub mod attributes;
pub mod config;
pub mod memory;
pub mod transaction;

pub use attributes::{AttributeRegistry, DeclarationSite, TransactionAttribute};
pub use config::{AttributeConfig, DeclarationConfig, InterceptorConfig};
pub use memory::{MemoryConnection, MemoryStore, MemoryTemplate, StoreStats};
pub use transaction::{ComponentDescriptor, Proxy, TransactionInterceptor};
