//! Main runtime entry point for stratatx.
//!
//! This module provides the `TxRuntime` struct, which owns the transaction
//! manager and the interception boundary, and hands out proxies for
//! business components.

use crate::error::{Error, Result};
use crate::lifecycle::{Component, ReadyHook, INIT_OPERATION, READY_OPERATION};
use crate::types::TransactionSnapshot;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use stratatx_concurrency::{TransactionManager, TransactionMetrics};
use stratatx_core::{ResourceManager, TransactionDefinition, TransactionError};
use stratatx_engine::{
    AttributeRegistry, ComponentDescriptor, InterceptorConfig, MemoryStore, MemoryTemplate, Proxy,
    TransactionAttribute, TransactionInterceptor,
};
use tracing::{debug, info};

/// The transaction runtime.
///
/// Create a runtime using [`TxRuntime::ephemeral`] or [`TxRuntime::builder`].
///
/// # Example
///
/// ```ignore
/// use stratatx::prelude::*;
///
/// let store = MemoryStore::new();
/// let runtime = TxRuntime::builder()
///     .memory_store(store.clone())
///     .config_file("tx.toml")?
///     .build();
///
/// let members = runtime.proxy(MemberServiceImpl::new(..), ComponentDescriptor::new("MemberService"));
/// members.join("kim")?;
/// ```
pub struct TxRuntime {
    manager: Arc<TransactionManager>,
    interceptor: Arc<TransactionInterceptor>,
    memory_store: Option<MemoryStore>,
    ready_hooks: Mutex<Vec<ReadyHook>>,
    started: AtomicBool,
}

impl TxRuntime {
    /// Create a runtime over a fresh in-memory store.
    ///
    /// The store is reachable through [`TxRuntime::memory_store`].
    pub fn ephemeral() -> Self {
        Self::builder().build()
    }

    /// Create a builder for runtime configuration.
    pub fn builder() -> TxRuntimeBuilder {
        TxRuntimeBuilder::new()
    }

    /// The propagation engine
    pub fn manager(&self) -> &Arc<TransactionManager> {
        &self.manager
    }

    /// The interception boundary shared by every proxy
    pub fn interceptor(&self) -> &Arc<TransactionInterceptor> {
        &self.interceptor
    }

    /// Declarations consulted by the interceptor
    pub fn attributes(&self) -> &Arc<AttributeRegistry> {
        self.interceptor.attributes()
    }

    /// The in-memory store, when the runtime runs on one
    pub fn memory_store(&self) -> Option<&MemoryStore> {
        self.memory_store.as_ref()
    }

    /// Data access helper bound to this runtime's transactions
    pub fn template(&self, store: &MemoryStore) -> MemoryTemplate {
        MemoryTemplate::new(store.clone(), self.manager.clone())
    }

    /// Declare one operation of a concrete component
    pub fn declare_operation(&self, component: &str, operation: &str, attribute: TransactionAttribute) {
        self.attributes().declare_operation(component, operation, attribute);
    }

    /// Declare every operation of a concrete component
    pub fn declare_component(&self, component: &str, attribute: TransactionAttribute) {
        self.attributes().declare_component(component, attribute);
    }

    /// Declare one operation of a contract
    pub fn declare_contract_operation(&self, contract: &str, operation: &str, attribute: TransactionAttribute) {
        self.attributes()
            .declare_contract_operation(contract, operation, attribute);
    }

    /// Declare every operation of a contract
    pub fn declare_contract(&self, contract: &str, attribute: TransactionAttribute) {
        self.attributes().declare_contract(contract, attribute);
    }

    /// Wrap `target` in the interception boundary
    pub fn proxy<T>(&self, target: T, descriptor: ComponentDescriptor) -> Proxy<T> {
        Proxy::new(target, descriptor, self.interceptor.clone())
    }

    /// Register a component: run its `init` hook, then wrap it
    ///
    /// The `on_ready` hook runs through the proxy on [`TxRuntime::start`].
    pub fn register<T: Component>(&self, target: T) -> Result<Proxy<T>> {
        let descriptor = target.descriptor();
        debug!(component = descriptor.name(), operation = INIT_OPERATION, "Running init hook");
        target.init()?;

        let proxy = self.proxy(target, descriptor);
        let hook_proxy = proxy.clone();
        self.ready_hooks.lock().push(Box::new(move || {
            hook_proxy.invoke(READY_OPERATION, |target| target.on_ready())
        }));
        Ok(proxy)
    }

    /// Run every registered `on_ready` hook, in registration order
    pub fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(TransactionError::IllegalState("runtime already started".to_string()).into());
        }
        let hooks = std::mem::take(&mut *self.ready_hooks.lock());
        info!(components = hooks.len(), "Starting transaction runtime");
        for hook in hooks {
            hook()?;
        }
        Ok(())
    }

    /// Run `body` inside a transaction described by `definition`
    pub fn execute<T, E>(&self, definition: &TransactionDefinition, body: impl FnOnce() -> std::result::Result<T, E>) -> std::result::Result<T, E>
    where
        E: stratatx_core::Classify + From<TransactionError>,
    {
        self.interceptor.execute(definition, body)
    }

    /// Transaction state of the calling thread
    pub fn status(&self) -> TransactionSnapshot {
        match self.manager.current() {
            Some(ctx) => TransactionSnapshot {
                active: true,
                read_only: ctx.is_read_only(),
                name: ctx.name().map(str::to_string),
                propagation: Some(ctx.propagation()),
                rollback_only: ctx.is_rollback_only(),
            },
            None => TransactionSnapshot::default(),
        }
    }

    /// Mark the current transaction rollback-only
    pub fn set_rollback_only(&self) -> Result<()> {
        self.manager.set_rollback_only().map_err(Error::from)
    }

    /// Get transaction metrics.
    pub fn metrics(&self) -> TransactionMetrics {
        self.manager.metrics()
    }
}

/// Builder for runtime configuration.
///
/// # Example
///
/// ```ignore
/// let runtime = TxRuntime::builder()
///     .resources(Arc::new(my_driver))
///     .validate_existing_transaction(true)
///     .build();
/// ```
#[derive(Default)]
pub struct TxRuntimeBuilder {
    resources: Option<Arc<dyn ResourceManager>>,
    memory_store: Option<MemoryStore>,
    config: InterceptorConfig,
}

impl TxRuntimeBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a storage driver.
    pub fn resources(mut self, resources: Arc<dyn ResourceManager>) -> Self {
        self.resources = Some(resources);
        self.memory_store = None;
        self
    }

    /// Use an in-memory store (the default is a fresh one).
    pub fn memory_store(mut self, store: MemoryStore) -> Self {
        self.resources = Some(Arc::new(store.clone()));
        self.memory_store = Some(store);
        self
    }

    /// Replace the interceptor configuration.
    pub fn config(mut self, config: InterceptorConfig) -> Self {
        self.config = config;
        self
    }

    /// Load the interceptor configuration from a TOML file.
    pub fn config_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let config = InterceptorConfig::from_file(path)?;
        Ok(self.config(config))
    }

    /// Reject read-write participants in read-only transactions.
    pub fn validate_existing_transaction(mut self, validate: bool) -> Self {
        self.config.validate_existing_transaction = validate;
        self
    }

    /// Build the runtime.
    pub fn build(self) -> TxRuntime {
        let (resources, memory_store): (Arc<dyn ResourceManager>, Option<MemoryStore>) =
            match (self.resources, self.memory_store) {
                (Some(resources), store) => (resources, store),
                (None, _) => {
                    let store = MemoryStore::new();
                    (Arc::new(store.clone()), Some(store))
                }
            };

        let manager = Arc::new(
            TransactionManager::new(resources)
                .validate_existing_transaction(self.config.validate_existing_transaction),
        );
        let attributes = Arc::new(AttributeRegistry::new());
        self.config.apply_to(&attributes);
        let interceptor = Arc::new(
            TransactionInterceptor::new(manager.clone(), attributes)
                .with_default_rollback_rules(self.config.default_rules()),
        );

        TxRuntime {
            manager,
            interceptor,
            memory_store,
            ready_hooks: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }
}
