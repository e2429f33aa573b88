//! Interception boundary
//!
//! This module provides:
//! - [`TransactionInterceptor`]: wraps one invocation in begin/finish
//! - [`Proxy`]: decorator installed around a business component
//! - [`ComponentDescriptor`]: the names declarations are resolved against
//!
//! # Self-invocation
//!
//! A proxy only intercepts calls made through it. The body of an intercepted
//! operation receives the raw target, so an operation calling another
//! operation of the same component bypasses the boundary: the callee's
//! declaration is ignored and it runs in whatever transaction is already
//! current. Split the callee into a separately proxied component to make the
//! declaration effective.

pub mod interceptor;
pub mod proxy;

pub use interceptor::TransactionInterceptor;
pub use proxy::{ComponentDescriptor, Proxy};
