//! Transaction contexts and the shared resource they run on
//!
//! A [`TransactionContext`] describes one logical transaction as seen by one
//! boundary crossing. Several contexts can run on the same
//! [`SharedResource`]: the owner that began the handle (`is_new`), plus any
//! participating or nested contexts created while it was current.
//!
//! ## Rollback-only state
//!
//! There are two markers:
//! - the context's own marker, set on failure or by an explicit request,
//!   monotonic for the lifetime of the context;
//! - the resource's marker, set when a participant that does not own the
//!   handle has to roll back. The owner finds it at commit time and fails
//!   with `UnexpectedRollback` instead of committing.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use stratatx_core::{
    Propagation, ResourceHandle, Result, Savepoint, TransactionDefinition, TransactionError,
    TransactionId,
};
use tracing::{debug, warn};

/// How a context relates to the resource it runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participation {
    /// Began its own resource handle and owns it
    New,
    /// Runs inside the current transaction without owning the handle
    Joined,
    /// Runs inside a savepoint of the current transaction
    Nested,
    /// No transaction is bound for the invocation
    NonTransactional,
}

/// A resource handle shared by an owning context and its participants
pub struct SharedResource {
    owner: TransactionId,
    read_only: bool,
    handle: Mutex<Box<dyn ResourceHandle>>,
    rollback_only: AtomicBool,
    completed: AtomicBool,
}

impl SharedResource {
    pub(crate) fn new(owner: TransactionId, read_only: bool, handle: Box<dyn ResourceHandle>) -> Self {
        Self {
            owner,
            read_only,
            handle: Mutex::new(handle),
            rollback_only: AtomicBool::new(false),
            completed: AtomicBool::new(false),
        }
    }

    /// Id of the context that began the handle
    pub fn owner(&self) -> TransactionId {
        self.owner
    }

    /// Whether the handle was begun read-only
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Whether a participant has forced the whole transaction to roll back
    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only.load(Ordering::Acquire)
    }

    pub(crate) fn mark_rollback_only(&self) {
        self.rollback_only.store(true, Ordering::Release);
    }

    pub(crate) fn reset_rollback_only(&self) {
        self.rollback_only.store(false, Ordering::Release);
    }

    /// Whether the owner has already committed or rolled back
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Run `f` with exclusive access to the handle
    pub fn with_handle<R>(&self, f: impl FnOnce(&mut dyn ResourceHandle) -> Result<R>) -> Result<R> {
        if self.is_completed() {
            return Err(TransactionError::IllegalState(format!(
                "transaction {} is already completed",
                self.owner
            )));
        }
        let mut handle = self.handle.lock();
        f(handle.as_mut())
    }

    /// Run `f` with the handle downcast to the driver's concrete type
    pub fn with_handle_as<H: Any, R>(&self, f: impl FnOnce(&mut H) -> Result<R>) -> Result<R> {
        self.with_handle(|handle| match handle.as_any_mut().downcast_mut::<H>() {
            Some(typed) => f(typed),
            None => Err(TransactionError::IllegalState(format!(
                "current transaction does not run on a {}",
                std::any::type_name::<H>()
            ))),
        })
    }

    /// Commit the handle, or roll it back and fail if marked rollback-only
    pub(crate) fn commit(&self, name: Option<&str>) -> Result<()> {
        let mut handle = self.handle.lock();
        self.completed.store(true, Ordering::Release);
        if self.is_rollback_only() {
            debug!(txn_id = %self.owner, "Global transaction is marked as rollback-only; rolling back");
            let rolled_back = handle.rollback();
            close_after(handle.as_mut(), rolled_back)?;
            return Err(TransactionError::UnexpectedRollback {
                name: name.map(str::to_string),
            });
        }
        let committed = handle.commit();
        close_after(handle.as_mut(), committed)
    }

    /// Roll the handle back and release it
    pub(crate) fn rollback(&self) -> Result<()> {
        let mut handle = self.handle.lock();
        self.completed.store(true, Ordering::Release);
        let rolled_back = handle.rollback();
        close_after(handle.as_mut(), rolled_back)
    }
}

// The handle is released whatever the outcome of the completion; the first
// failure wins.
fn close_after(handle: &mut dyn ResourceHandle, outcome: Result<()>) -> Result<()> {
    let closed = handle.close();
    match (outcome, closed) {
        (Err(e), Err(close_err)) => {
            warn!(error = %close_err, "Failed to close resource after completion failure");
            Err(e)
        }
        (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
        (Ok(()), Ok(())) => Ok(()),
    }
}

impl fmt::Debug for SharedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedResource")
            .field("owner", &self.owner)
            .field("read_only", &self.read_only)
            .field("rollback_only", &self.is_rollback_only())
            .field("completed", &self.is_completed())
            .finish()
    }
}

/// One logical transaction as seen from one boundary crossing
pub struct TransactionContext {
    id: TransactionId,
    name: Option<String>,
    propagation: Propagation,
    read_only: bool,
    participation: Participation,
    resource: Arc<SharedResource>,
    savepoint: Mutex<Option<Savepoint>>,
    // Resource marker at savepoint creation; restored on rollback-to-savepoint.
    resource_rollback_only_at_savepoint: bool,
    rollback_only: AtomicBool,
    suspended_parent: Option<Weak<TransactionContext>>,
    started_at: DateTime<Utc>,
}

impl TransactionContext {
    /// Context owning a freshly begun handle
    pub(crate) fn new_owner(
        id: TransactionId,
        definition: &TransactionDefinition,
        handle: Box<dyn ResourceHandle>,
        suspended_parent: Option<&Arc<TransactionContext>>,
    ) -> Self {
        let read_only = definition.is_read_only();
        Self {
            id,
            name: definition.name.clone(),
            propagation: definition.propagation,
            read_only,
            participation: Participation::New,
            resource: Arc::new(SharedResource::new(id, read_only, handle)),
            savepoint: Mutex::new(None),
            resource_rollback_only_at_savepoint: false,
            rollback_only: AtomicBool::new(false),
            suspended_parent: suspended_parent.map(Arc::downgrade),
            started_at: Utc::now(),
        }
    }

    /// Context participating in `parent`'s transaction
    ///
    /// Name and read-only flag are inherited from the transaction actually used.
    pub(crate) fn participant(parent: &Arc<TransactionContext>, definition: &TransactionDefinition) -> Self {
        Self::inside(parent, definition, Participation::Joined, None)
    }

    /// Context running inside `savepoint` of `parent`'s transaction
    pub(crate) fn nested(
        parent: &Arc<TransactionContext>,
        definition: &TransactionDefinition,
        savepoint: Savepoint,
    ) -> Self {
        Self::inside(parent, definition, Participation::Nested, Some(savepoint))
    }

    fn inside(
        parent: &Arc<TransactionContext>,
        definition: &TransactionDefinition,
        participation: Participation,
        savepoint: Option<Savepoint>,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            name: parent.name.clone(),
            propagation: definition.propagation,
            read_only: parent.read_only,
            participation,
            resource: parent.resource.clone(),
            savepoint: Mutex::new(savepoint),
            resource_rollback_only_at_savepoint: parent.resource.is_rollback_only(),
            rollback_only: AtomicBool::new(false),
            suspended_parent: Some(Arc::downgrade(parent)),
            started_at: Utc::now(),
        }
    }

    /// Identifier of the transaction this context runs in
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Name of the transaction this context runs in
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Propagation declared by the operation that created this context
    pub fn propagation(&self) -> Propagation {
        self.propagation
    }

    /// Effective read-only flag (inherited when joining)
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// How this invocation takes part in the transaction
    pub fn participation(&self) -> Participation {
        self.participation
    }

    /// Whether this context began (and owns) its resource handle
    pub fn is_new_transaction(&self) -> bool {
        self.participation == Participation::New
    }

    /// Whether this context currently holds a savepoint
    pub fn has_savepoint(&self) -> bool {
        self.savepoint.lock().is_some()
    }

    pub(crate) fn take_savepoint(&self) -> Option<Savepoint> {
        self.savepoint.lock().take()
    }

    pub(crate) fn resource_rollback_only_at_savepoint(&self) -> bool {
        self.resource_rollback_only_at_savepoint
    }

    /// Resource shared with the owner and other participants
    pub fn resource(&self) -> &Arc<SharedResource> {
        &self.resource
    }

    /// Request rollback of this context
    ///
    /// Owners roll back silently; participants propagate the request to
    /// the owner, whose commit then fails with `UnexpectedRollback`.
    pub fn set_rollback_only(&self) {
        self.rollback_only.store(true, Ordering::Release);
    }

    /// Whether this context itself was marked rollback-only
    pub fn is_local_rollback_only(&self) -> bool {
        self.rollback_only.load(Ordering::Acquire)
    }

    /// Whether this context or its shared resource is marked rollback-only
    pub fn is_rollback_only(&self) -> bool {
        self.is_local_rollback_only() || self.resource.is_rollback_only()
    }

    /// Context that was current before this one, if it is still alive
    pub fn suspended_parent(&self) -> Option<Arc<TransactionContext>> {
        self.suspended_parent.as_ref().and_then(Weak::upgrade)
    }

    /// When the context was created
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

impl fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionContext")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("propagation", &self.propagation)
            .field("read_only", &self.read_only)
            .field("participation", &self.participation)
            .field("has_savepoint", &self.has_savepoint())
            .field("rollback_only", &self.is_local_rollback_only())
            .field("resource", &self.resource)
            .finish()
    }
}
