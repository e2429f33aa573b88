//! Execution-scoped context registry
//!
//! Maps the calling thread to its current [`TransactionContext`]. Storage is
//! thread-local, so concurrent threads never observe each other's bound
//! context, and every registry instance owns its own slot so independent
//! transaction managers on one thread do not interfere.
//!
//! # Binding discipline
//!
//! [`ContextRegistry::bind`] fails if a context is already bound: callers
//! must `unbind` before rebinding. The transaction manager restores the
//! previous binding in strict LIFO order.

use crate::context::TransactionContext;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use stratatx_core::{Result, TransactionError};

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static BOUND: RefCell<HashMap<u64, Arc<TransactionContext>>> = RefCell::new(HashMap::new());
}

/// Thread-local binding of the current transaction context
#[derive(Debug)]
pub struct ContextRegistry {
    id: u64,
}

impl ContextRegistry {
    /// Create a registry with its own slot on every thread
    pub fn new() -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Context bound to the calling thread, if any
    pub fn current(&self) -> Option<Arc<TransactionContext>> {
        BOUND.with(|bound| bound.borrow().get(&self.id).cloned())
    }

    /// Whether a context is bound to the calling thread
    pub fn is_bound(&self) -> bool {
        BOUND.with(|bound| bound.borrow().contains_key(&self.id))
    }

    /// Bind `ctx` to the calling thread
    ///
    /// Fails with `IllegalState` if a context is already bound.
    pub fn bind(&self, ctx: Arc<TransactionContext>) -> Result<()> {
        BOUND.with(|bound| {
            let mut bound = bound.borrow_mut();
            if let Some(existing) = bound.get(&self.id) {
                return Err(TransactionError::IllegalState(format!(
                    "transaction {} is already bound to this thread",
                    existing.id()
                )));
            }
            bound.insert(self.id, ctx);
            Ok(())
        })
    }

    /// Remove and return the context bound to the calling thread
    ///
    /// Fails with `IllegalState` if nothing is bound.
    pub fn unbind(&self) -> Result<Arc<TransactionContext>> {
        BOUND.with(|bound| {
            bound.borrow_mut().remove(&self.id).ok_or_else(|| {
                TransactionError::IllegalState("no transaction is bound to this thread".to_string())
            })
        })
    }

    /// Drop any binding on the calling thread
    ///
    /// The removed context is handed back after the thread-local slot is
    /// released, so dropping it may touch the registry again.
    pub fn clear(&self) -> Option<Arc<TransactionContext>> {
        BOUND.with(|bound| {
            let mut bound = bound.borrow_mut();
            bound.remove(&self.id)
        })
    }
}

impl Default for ContextRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ContextRegistry {
    fn drop(&mut self) {
        // Bindings left on other threads go away with those threads.
        let removed = BOUND.try_with(|bound| {
            let mut bound = bound.borrow_mut();
            bound.remove(&self.id)
        });
        drop(removed);
    }
}
