//! Component proxies
//!
//! A [`Proxy`] is the decorator placed between callers and a business
//! component. Components expose their capability contract by implementing
//! it for `Proxy<Self>` and routing every method through [`Proxy::invoke`]:
//!
//! ```ignore
//! impl MemberService for Proxy<MemberServiceImpl> {
//!     fn join(&self, name: &str) -> Result<(), Error> {
//!         self.invoke("join", |target| target.join(name))
//!     }
//! }
//! ```

use crate::transaction::interceptor::TransactionInterceptor;
use std::fmt;
use std::sync::Arc;
use stratatx_core::{Classify, TransactionError};

/// Names used to resolve declarations for a component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDescriptor {
    name: String,
    contracts: Vec<String>,
}

impl ComponentDescriptor {
    /// Describe the concrete component `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contracts: Vec::new(),
        }
    }

    /// Add an implemented contract
    pub fn implements(mut self, contract: impl Into<String>) -> Self {
        self.contracts.push(contract.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Implemented contracts, in declaration order
    pub fn contracts(&self) -> &[String] {
        &self.contracts
    }
}

/// Transactional decorator around a component
pub struct Proxy<T> {
    target: Arc<T>,
    descriptor: ComponentDescriptor,
    interceptor: Arc<TransactionInterceptor>,
}

impl<T> Proxy<T> {
    pub fn new(target: T, descriptor: ComponentDescriptor, interceptor: Arc<TransactionInterceptor>) -> Self {
        Self::from_arc(Arc::new(target), descriptor, interceptor)
    }

    pub fn from_arc(
        target: Arc<T>,
        descriptor: ComponentDescriptor,
        interceptor: Arc<TransactionInterceptor>,
    ) -> Self {
        Self {
            target,
            descriptor,
            interceptor,
        }
    }

    /// Invoke `operation` through the interception boundary
    pub fn invoke<R, E>(&self, operation: &str, body: impl FnOnce(&T) -> Result<R, E>) -> Result<R, E>
    where
        E: Classify + From<TransactionError>,
    {
        let target = &self.target;
        self.interceptor
            .invoke(&self.descriptor, operation, || body(target))
    }

    /// Whether `operation` has an applicable declaration
    pub fn is_transactional(&self, operation: &str) -> bool {
        self.interceptor
            .definition_for(&self.descriptor, operation)
            .is_some()
    }

    /// The raw component; calls made on it are not intercepted
    pub fn target(&self) -> &Arc<T> {
        &self.target
    }

    pub fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }

    pub fn interceptor(&self) -> &Arc<TransactionInterceptor> {
        &self.interceptor
    }
}

impl<T> Clone for Proxy<T> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            descriptor: self.descriptor.clone(),
            interceptor: self.interceptor.clone(),
        }
    }
}

impl<T> fmt::Debug for Proxy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Proxy<{}>", self.descriptor.name)
    }
}
