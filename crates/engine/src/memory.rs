//! In-memory storage driver
//!
//! Reference [`ResourceManager`] over a process-local key/value map.
//!
//! # Design
//!
//! - Committed data: `RwLock<BTreeMap>`, applied atomically at commit
//! - Each connection buffers its writes; reads see own writes first
//! - Savepoints record the write-log length; rollback truncates to it
//! - Read-only connections reject writes with `ReadOnlyViolation`
//! - Without a bound transaction, [`MemoryTemplate`] writes auto-commit
//!
//! Availability can be switched off to simulate a lost storage connection:
//! every subsequent operation fails with `Resource`.

use parking_lot::RwLock;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use stratatx_concurrency::TransactionManager;
use stratatx_core::{
    BeginOptions, ResourceHandle, ResourceManager, Result, Savepoint, TransactionError,
};
use tracing::{debug, trace};

/// Counters of one store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub connections_opened: u64,
    pub connections_closed: u64,
    pub commits: u64,
    pub rollbacks: u64,
    pub auto_commits: u64,
}

impl StoreStats {
    /// Connections not yet closed
    pub fn open_connections(&self) -> u64 {
        self.connections_opened.saturating_sub(self.connections_closed)
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    data: RwLock<BTreeMap<String, String>>,
    unavailable: AtomicBool,
    next_connection: AtomicU64,
    next_savepoint: AtomicU64,
    connections_opened: AtomicU64,
    connections_closed: AtomicU64,
    commits: AtomicU64,
    rollbacks: AtomicU64,
    auto_commits: AtomicU64,
}

impl StoreInner {
    fn ensure_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::Acquire) {
            return Err(TransactionError::Resource("storage unavailable".to_string()));
        }
        Ok(())
    }

    fn apply(&self, writes: &[Write]) {
        let mut data = self.data.write();
        for write in writes {
            match write {
                Write::Put(key, value) => {
                    data.insert(key.clone(), value.clone());
                }
                Write::Delete(key) => {
                    data.remove(key);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Write {
    Put(String, String),
    Delete(String),
}

/// Process-local storage with transactional connections
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate losing (or regaining) the storage connection
    pub fn set_available(&self, available: bool) {
        self.inner.unavailable.store(!available, Ordering::Release);
    }

    /// Committed value of `key`
    pub fn committed(&self, key: &str) -> Option<String> {
        self.inner.data.read().get(key).cloned()
    }

    /// Committed keys, in order
    pub fn keys(&self) -> Vec<String> {
        self.inner.data.read().keys().cloned().collect()
    }

    /// Number of committed entries
    pub fn len(&self) -> usize {
        self.inner.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            connections_opened: self.inner.connections_opened.load(Ordering::Relaxed),
            connections_closed: self.inner.connections_closed.load(Ordering::Relaxed),
            commits: self.inner.commits.load(Ordering::Relaxed),
            rollbacks: self.inner.rollbacks.load(Ordering::Relaxed),
            auto_commits: self.inner.auto_commits.load(Ordering::Relaxed),
        }
    }

    /// Open a connection directly, outside any transaction manager
    pub fn connect(&self, read_only: bool) -> Result<MemoryConnection> {
        self.inner.ensure_available()?;
        let id = self.inner.next_connection.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner.connections_opened.fetch_add(1, Ordering::Relaxed);
        trace!(connection = id, read_only, "Opened memory connection");
        Ok(MemoryConnection {
            id,
            store: self.inner.clone(),
            read_only,
            writes: Vec::new(),
            savepoints: Vec::new(),
            closed: false,
        })
    }

    fn auto_commit(&self, write: Write) -> Result<()> {
        self.inner.ensure_available()?;
        self.inner.apply(std::slice::from_ref(&write));
        self.inner.auto_commits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn owns(&self, connection: &MemoryConnection) -> bool {
        Arc::ptr_eq(&self.inner, &connection.store)
    }
}

impl ResourceManager for MemoryStore {
    fn begin(&self, options: &BeginOptions) -> Result<Box<dyn ResourceHandle>> {
        let connection = self.connect(options.read_only)?;
        debug!(
            connection = connection.id,
            name = options.name.as_deref().unwrap_or(""),
            read_only = options.read_only,
            "Acquired connection for transaction"
        );
        Ok(Box::new(connection))
    }
}

/// One transactional connection to a [`MemoryStore`]
#[derive(Debug)]
pub struct MemoryConnection {
    id: u64,
    store: Arc<StoreInner>,
    read_only: bool,
    writes: Vec<Write>,
    savepoints: Vec<(u64, usize)>,
    closed: bool,
}

impl MemoryConnection {
    pub fn id(&self) -> u64 {
        self.id
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(TransactionError::Resource(format!(
                "connection {} is already closed",
                self.id
            )));
        }
        self.store.ensure_available()
    }

    fn ensure_writable(&self, operation: &str) -> Result<()> {
        self.ensure_open()?;
        if self.read_only {
            return Err(TransactionError::ReadOnlyViolation(operation.to_string()));
        }
        Ok(())
    }

    pub fn put(&mut self, key: &str, value: &str) -> Result<()> {
        self.ensure_writable("put")?;
        self.writes.push(Write::Put(key.to_string(), value.to_string()));
        Ok(())
    }

    pub fn delete(&mut self, key: &str) -> Result<()> {
        self.ensure_writable("delete")?;
        self.writes.push(Write::Delete(key.to_string()));
        Ok(())
    }

    /// Value of `key` as seen by this connection
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.ensure_open()?;
        for write in self.writes.iter().rev() {
            match write {
                Write::Put(k, v) if k == key => return Ok(Some(v.clone())),
                Write::Delete(k) if k == key => return Ok(None),
                _ => {}
            }
        }
        Ok(self.store.data.read().get(key).cloned())
    }

    /// Number of buffered writes
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    fn savepoint_index(&self, savepoint: &Savepoint) -> Result<usize> {
        self.savepoints
            .iter()
            .position(|(id, _)| *id == savepoint.id())
            .ok_or_else(|| {
                TransactionError::Resource(format!(
                    "savepoint {} does not exist on connection {}",
                    savepoint, self.id
                ))
            })
    }
}

impl ResourceHandle for MemoryConnection {
    fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.store.apply(&self.writes);
        trace!(connection = self.id, writes = self.writes.len(), "Committed");
        self.writes.clear();
        self.savepoints.clear();
        self.store.commits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.ensure_open()?;
        trace!(connection = self.id, writes = self.writes.len(), "Rolled back");
        self.writes.clear();
        self.savepoints.clear();
        self.store.rollbacks.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn savepoint(&mut self) -> Result<Savepoint> {
        self.ensure_open()?;
        let id = self.store.next_savepoint.fetch_add(1, Ordering::Relaxed) + 1;
        self.savepoints.push((id, self.writes.len()));
        Ok(Savepoint::new(id))
    }

    fn rollback_to_savepoint(&mut self, savepoint: &Savepoint) -> Result<()> {
        self.ensure_open()?;
        let index = self.savepoint_index(savepoint)?;
        let (_, mark) = self.savepoints[index];
        self.writes.truncate(mark);
        self.savepoints.truncate(index + 1);
        Ok(())
    }

    fn release_savepoint(&mut self, savepoint: Savepoint) -> Result<()> {
        self.ensure_open()?;
        let index = self.savepoint_index(&savepoint)?;
        self.savepoints.truncate(index);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(TransactionError::Resource(format!(
                "connection {} is already closed",
                self.id
            )));
        }
        self.closed = true;
        self.store.connections_closed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Data access helper bound to the current transaction
///
/// Operations run on the connection of the transaction bound to the calling
/// thread, or auto-commit when none is bound.
#[derive(Debug, Clone)]
pub struct MemoryTemplate {
    store: MemoryStore,
    manager: Arc<TransactionManager>,
}

impl MemoryTemplate {
    pub fn new(store: MemoryStore, manager: Arc<TransactionManager>) -> Self {
        Self { store, manager }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    fn with_connection<R>(
        &self,
        f: impl FnOnce(&mut MemoryConnection) -> Result<R>,
    ) -> Option<Result<R>> {
        let store = &self.store;
        self.manager.with_current_resource(|resource| {
            resource.with_handle_as::<MemoryConnection, _>(|connection| {
                if !store.owns(connection) {
                    return Err(TransactionError::IllegalState(
                        "current transaction runs on a different store".to_string(),
                    ));
                }
                f(connection)
            })
        })
    }

    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        match self.with_connection(|connection| connection.put(key, value)) {
            Some(result) => result,
            None => self.store.auto_commit(Write::Put(key.to_string(), value.to_string())),
        }
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        match self.with_connection(|connection| connection.delete(key)) {
            Some(result) => result,
            None => self.store.auto_commit(Write::Delete(key.to_string())),
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        match self.with_connection(|connection| connection.get(key)) {
            Some(result) => result,
            None => {
                self.store.inner.ensure_available()?;
                Ok(self.store.committed(key))
            }
        }
    }

    pub fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}
