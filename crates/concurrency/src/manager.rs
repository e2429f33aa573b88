//! Transaction manager: the propagation engine
//!
//! Decides, per invocation, whether to join, suspend, nest, or skip a
//! transaction, and on exit whether to commit, roll back, release a
//! savepoint, or only propagate a rollback-only marker.
//!
//! ## Begin Sequence
//!
//! ```text
//! 1. current() from the registry
//! 2. Propagation::decide(current.is_some())    - tagged decision, may fail
//! 3. Join     -> participant context on the current resource
//!    Nest     -> savepoint on the current resource
//!    StartNew -> suspend current (if any), begin a fresh handle
//!    NonTx    -> suspend current (if any), bind nothing
//! 4. bind the new context, remember what to restore
//! ```
//!
//! ## Finish Sequence
//!
//! ```text
//! 1. MustRollback failure    -> mark the context rollback-only
//! 2. New                     -> commit, or roll back if marked
//!                               (resource marked by a participant -> UnexpectedRollback)
//!    Nested                  -> rollback-to-savepoint if marked, release savepoint
//!    Joined                  -> mark the shared resource if marked, nothing else
//! 3. unbind the context, rebind what was current before (ALWAYS, even if 2 failed)
//! ```
//!
//! Within one thread, `finish` must be called in reverse order of `begin`.
//! A [`TransactionStatus`] can only be finished once.

use crate::context::{Participation, TransactionContext};
use crate::metrics::{MetricsRecorder, TransactionMetrics};
use crate::registry::ContextRegistry;
use std::sync::Arc;
use stratatx_core::{
    BeginOptions, Classify, PropagationDecision, ResourceManager, Result, RollbackDecision,
    RollbackRules, TransactionDefinition, TransactionError, TransactionId,
};
use tracing::{debug, error, warn};

/// How the body of a transactional invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The body returned normally
    Success,
    /// The body failed; the decision comes from rollback classification
    Failure(RollbackDecision),
}

impl Completion {
    /// Classify `failure` against `rules`
    pub fn from_failure<F: Classify + ?Sized>(failure: &F, rules: &RollbackRules) -> Self {
        Completion::Failure(rules.classify(failure))
    }
}

/// Per-invocation handle returned by [`TransactionManager::begin`]
#[must_use = "a transaction status must be passed to TransactionManager::finish"]
#[derive(Debug)]
pub struct TransactionStatus {
    context: Option<Arc<TransactionContext>>,
    restore: Option<Arc<TransactionContext>>,
    suspended: bool,
}

impl TransactionStatus {
    /// Context bound for this invocation, if any
    pub fn context(&self) -> Option<&Arc<TransactionContext>> {
        self.context.as_ref()
    }

    /// How the invocation takes part in a transaction, if any
    pub fn participation(&self) -> Participation {
        self.context
            .as_ref()
            .map_or(Participation::NonTransactional, |ctx| ctx.participation())
    }

    /// Whether this invocation began its own resource handle
    pub fn is_new_transaction(&self) -> bool {
        self.participation() == Participation::New
    }

    /// Whether a transaction is bound for this invocation
    pub fn has_transaction(&self) -> bool {
        self.context.is_some()
    }

    /// Context suspended by this invocation (`RequiresNew` / `NotSupported`)
    pub fn suspended(&self) -> Option<&Arc<TransactionContext>> {
        if self.suspended {
            self.restore.as_ref()
        } else {
            None
        }
    }
}

/// Coordinates transaction begin/finish for one resource manager
///
/// Every manager owns its own [`ContextRegistry`]; bindings are per thread.
///
/// # Thread Safety
///
/// The manager is `Send + Sync` and meant to be shared behind an `Arc`.
/// Threads never see each other's current transaction.
pub struct TransactionManager {
    resources: Arc<dyn ResourceManager>,
    registry: ContextRegistry,
    metrics: MetricsRecorder,
    validate_existing_transaction: bool,
}

impl TransactionManager {
    /// Create a manager over a storage driver
    pub fn new(resources: Arc<dyn ResourceManager>) -> Self {
        TransactionManager {
            resources,
            registry: ContextRegistry::new(),
            metrics: MetricsRecorder::default(),
            validate_existing_transaction: false,
        }
    }

    /// Reject read-write participants in read-only transactions
    ///
    /// Disabled by default: participants inherit the read-only flag of the
    /// transaction they join.
    pub fn validate_existing_transaction(mut self, validate: bool) -> Self {
        self.validate_existing_transaction = validate;
        self
    }

    /// Per-thread bindings owned by this manager
    pub fn registry(&self) -> &ContextRegistry {
        &self.registry
    }

    /// Current context on the calling thread
    pub fn current(&self) -> Option<Arc<TransactionContext>> {
        self.registry.current()
    }

    /// Whether a transaction is bound on the calling thread
    pub fn is_actual_transaction_active(&self) -> bool {
        self.registry.is_bound()
    }

    /// Read-only flag of the current transaction (`false` when none)
    pub fn is_current_transaction_read_only(&self) -> bool {
        self.current().map_or(false, |ctx| ctx.is_read_only())
    }

    /// Name of the current transaction
    pub fn current_transaction_name(&self) -> Option<String> {
        self.current().and_then(|ctx| ctx.name().map(str::to_string))
    }

    /// Mark the current transaction rollback-only
    pub fn set_rollback_only(&self) -> Result<()> {
        match self.current() {
            Some(ctx) => {
                debug!(txn_id = %ctx.id(), "Transaction marked rollback-only by request");
                ctx.set_rollback_only();
                Ok(())
            }
            None => Err(TransactionError::IllegalState(
                "no transaction is active to mark rollback-only".to_string(),
            )),
        }
    }

    /// Run `f` against the current transaction's resource
    ///
    /// Returns `None` when no transaction is bound.
    pub fn with_current_resource<R>(
        &self,
        f: impl FnOnce(&crate::context::SharedResource) -> Result<R>,
    ) -> Option<Result<R>> {
        self.current().map(|ctx| f(ctx.resource()))
    }

    /// Get transaction counters
    pub fn metrics(&self) -> TransactionMetrics {
        self.metrics.snapshot()
    }

    /// Start an invocation according to `definition`
    pub fn begin(&self, definition: &TransactionDefinition) -> Result<TransactionStatus> {
        let current = self.registry.current();
        let decision = match definition.propagation.decide(current.is_some()) {
            Ok(decision) => decision,
            Err(e) => {
                debug!(propagation = %definition.propagation, error = %e, "Propagation rejected invocation");
                return Err(e);
            }
        };

        match (decision, current) {
            (PropagationDecision::Join, Some(parent)) => self.join(parent, definition),
            (PropagationDecision::Nest, Some(parent)) => self.nest(parent, definition),
            (PropagationDecision::StartNew { suspend }, _) => self.start_new(definition, suspend),
            (PropagationDecision::NonTransactional { suspend }, _) => {
                let restore = if suspend { Some(self.suspend()?) } else { None };
                debug!(propagation = %definition.propagation, "Executing without transaction");
                Ok(TransactionStatus {
                    context: None,
                    restore,
                    suspended: suspend,
                })
            }
            (decision, None) => Err(TransactionError::IllegalState(format!(
                "{:?} requires a current transaction",
                decision
            ))),
        }
    }

    /// Complete an invocation and restore the previous binding
    ///
    /// The registry is restored even when completion fails. A status that
    /// is not the innermost open invocation is rejected with `IllegalState`
    /// before its transaction is touched.
    pub fn finish(&self, status: TransactionStatus, completion: Completion) -> Result<()> {
        match self.try_finish(status, completion) {
            Ok(finished) => finished,
            Err(rejected) => Err(self.out_of_order(&rejected)),
        }
    }

    /// Like [`finish`](Self::finish), but hands the status back untouched
    /// when it is not the innermost open invocation
    ///
    /// The returned status can be finished once the inner invocations are.
    pub fn try_finish(
        &self,
        status: TransactionStatus,
        completion: Completion,
    ) -> std::result::Result<Result<()>, TransactionStatus> {
        if !self.is_innermost(&status) {
            warn!(error = %self.out_of_order(&status), "Rejected out-of-order finish");
            return Err(status);
        }

        let TransactionStatus {
            context,
            restore,
            suspended,
        } = status;

        let completed = match &context {
            Some(ctx) => self.complete(ctx, completion),
            None => Ok(()),
        };
        let restored = self.restore(context.as_ref(), restore, suspended);

        Ok(match (completed, restored) {
            (Err(e), Err(restore_err)) => {
                error!(error = %restore_err, "Failed to restore transaction binding after completion failure");
                Err(e)
            }
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Ok(()), Ok(())) => Ok(()),
        })
    }

    /// Whether `status` belongs to the innermost open invocation on this thread
    pub fn is_innermost(&self, status: &TransactionStatus) -> bool {
        match (&status.context, self.registry.current()) {
            (Some(ctx), Some(bound)) => Arc::ptr_eq(ctx, &bound),
            (None, None) => true,
            _ => false,
        }
    }

    fn out_of_order(&self, status: &TransactionStatus) -> TransactionError {
        let current = self
            .registry
            .current()
            .map_or_else(|| "no transaction".to_string(), |bound| bound.id().to_string());
        let finishing = status
            .context
            .as_ref()
            .map_or_else(|| "non-transactional invocation".to_string(), |ctx| ctx.id().to_string());
        TransactionError::IllegalState(format!(
            "{} finished out of order; {} is current",
            finishing, current
        ))
    }

    fn join(
        &self,
        parent: Arc<TransactionContext>,
        definition: &TransactionDefinition,
    ) -> Result<TransactionStatus> {
        if parent.is_read_only() && !definition.is_read_only() {
            if self.validate_existing_transaction {
                return Err(TransactionError::IllegalState(format!(
                    "participating transaction [{}] is not marked as read-only but existing transaction is",
                    definition.name.as_deref().unwrap_or("unnamed")
                )));
            }
            debug!(txn_id = %parent.id(), "Read-write participant inherits read-only transaction");
        }

        let ctx = Arc::new(TransactionContext::participant(&parent, definition));
        self.swap_in(&parent, ctx.clone())?;
        self.metrics.record_participation();
        debug!(
            txn_id = %ctx.id(),
            owner = %ctx.resource().owner(),
            propagation = %definition.propagation,
            "Participating in existing transaction"
        );
        Ok(TransactionStatus {
            context: Some(ctx),
            restore: Some(parent),
            suspended: false,
        })
    }

    fn nest(
        &self,
        parent: Arc<TransactionContext>,
        definition: &TransactionDefinition,
    ) -> Result<TransactionStatus> {
        let savepoint = parent.resource().with_handle(|handle| handle.savepoint())?;
        debug!(owner = %parent.resource().owner(), savepoint = %savepoint, "Creating nested transaction");
        let ctx = Arc::new(TransactionContext::nested(&parent, definition, savepoint));
        self.swap_in(&parent, ctx.clone())?;
        self.metrics.record_savepoint();
        Ok(TransactionStatus {
            context: Some(ctx),
            restore: Some(parent),
            suspended: false,
        })
    }

    fn start_new(&self, definition: &TransactionDefinition, suspend: bool) -> Result<TransactionStatus> {
        let restore = if suspend { Some(self.suspend()?) } else { None };

        let options = BeginOptions {
            read_only: definition.is_read_only(),
            name: definition.name.clone(),
        };
        let handle = match self.resources.begin(&options) {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "Failed to begin transaction");
                if let Some(previous) = restore {
                    if let Err(resume_err) = self.resume(previous) {
                        error!(error = %resume_err, "Failed to resume suspended transaction");
                    }
                }
                return Err(e);
            }
        };

        let id = TransactionId::new();
        let ctx = Arc::new(TransactionContext::new_owner(id, definition, handle, restore.as_ref()));
        self.registry.bind(ctx.clone())?;
        self.metrics.record_begin();
        debug!(
            txn_id = %id,
            name = definition.name.as_deref().unwrap_or(""),
            propagation = %definition.propagation,
            read_only = definition.is_read_only(),
            "Creating new transaction"
        );
        Ok(TransactionStatus {
            context: Some(ctx),
            restore,
            suspended: suspend,
        })
    }

    fn suspend(&self) -> Result<Arc<TransactionContext>> {
        let ctx = self.registry.unbind()?;
        self.metrics.record_suspension();
        debug!(txn_id = %ctx.id(), "Suspending current transaction");
        Ok(ctx)
    }

    fn resume(&self, ctx: Arc<TransactionContext>) -> Result<()> {
        debug!(txn_id = %ctx.id(), "Resuming suspended transaction");
        self.registry.bind(ctx)
    }

    fn swap_in(&self, parent: &Arc<TransactionContext>, ctx: Arc<TransactionContext>) -> Result<()> {
        let detached = self.registry.unbind()?;
        debug_assert!(Arc::ptr_eq(&detached, parent));
        if let Err(e) = self.registry.bind(ctx) {
            self.registry.bind(detached)?;
            return Err(e);
        }
        Ok(())
    }

    fn complete(&self, ctx: &Arc<TransactionContext>, completion: Completion) -> Result<()> {
        if completion == Completion::Failure(RollbackDecision::MustRollback) {
            ctx.set_rollback_only();
        }

        match ctx.participation() {
            Participation::New => self.complete_owner(ctx),
            Participation::Nested => self.complete_nested(ctx),
            Participation::Joined => {
                if ctx.is_local_rollback_only() {
                    debug!(
                        txn_id = %ctx.id(),
                        owner = %ctx.resource().owner(),
                        "Participating transaction failed - marking existing transaction as rollback-only"
                    );
                    ctx.resource().mark_rollback_only();
                }
                Ok(())
            }
            Participation::NonTransactional => Ok(()),
        }
    }

    fn complete_owner(&self, ctx: &Arc<TransactionContext>) -> Result<()> {
        if ctx.is_local_rollback_only() {
            debug!(txn_id = %ctx.id(), "Rolling back transaction");
            self.metrics.record_rollback();
            return ctx.resource().rollback();
        }

        debug!(txn_id = %ctx.id(), "Committing transaction");
        match ctx.resource().commit(ctx.name()) {
            Ok(()) => {
                self.metrics.record_commit();
                Ok(())
            }
            Err(e) if e.is_unexpected_rollback() => {
                warn!(txn_id = %ctx.id(), "Commit refused: transaction was marked rollback-only by a participant");
                self.metrics.record_unexpected_rollback();
                Err(e)
            }
            Err(e) => {
                error!(txn_id = %ctx.id(), error = %e, "Commit failed");
                self.metrics.record_rollback();
                Err(e)
            }
        }
    }

    fn complete_nested(&self, ctx: &Arc<TransactionContext>) -> Result<()> {
        let savepoint = ctx.take_savepoint().ok_or_else(|| {
            TransactionError::IllegalState(format!("nested transaction {} has no savepoint", ctx.id()))
        })?;

        let rollback = ctx.is_local_rollback_only();
        ctx.resource().with_handle(|handle| {
            if rollback {
                debug!(txn_id = %ctx.id(), savepoint = %savepoint, "Rolling back transaction to savepoint");
                handle.rollback_to_savepoint(&savepoint)?;
            }
            debug!(txn_id = %ctx.id(), savepoint = %savepoint, "Releasing transaction savepoint");
            handle.release_savepoint(savepoint)
        })?;

        if rollback {
            self.metrics.record_savepoint_rollback();
            // Work after the savepoint is gone; so is any marker it caused.
            if !ctx.resource_rollback_only_at_savepoint() {
                ctx.resource().reset_rollback_only();
            }
        }
        Ok(())
    }

    fn restore(
        &self,
        context: Option<&Arc<TransactionContext>>,
        restore: Option<Arc<TransactionContext>>,
        suspended: bool,
    ) -> Result<()> {
        // Innermost binding was checked by `try_finish`.
        if context.is_some() {
            self.registry.unbind()?;
        }

        match restore {
            Some(previous) if suspended => self.resume(previous),
            Some(previous) => self.registry.bind(previous),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("registry", &self.registry)
            .field("validate_existing_transaction", &self.validate_existing_transaction)
            .finish()
    }
}
