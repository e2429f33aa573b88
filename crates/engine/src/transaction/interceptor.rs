//! Transaction interceptor
//!
//! The only component that talks to the [`TransactionManager`]. Each
//! intercepted invocation runs as:
//!
//! ```text
//! definition = resolve(component, operation)     - None: call body directly
//! status     = manager.begin(definition)
//! result     = body()                            - panics finish with rollback
//! Ok         -> manager.finish(status, Success)
//! Err(f)     -> manager.finish(status, classify(f)), then re-raise f
//! ```
//!
//! A structural error raised while finishing replaces the business outcome:
//! the caller must learn that its work was not applied as expected.

use crate::attributes::AttributeRegistry;
use crate::transaction::proxy::ComponentDescriptor;
use std::sync::Arc;
use stratatx_concurrency::{Completion, TransactionManager, TransactionStatus};
use stratatx_core::{Classify, RollbackDecision, RollbackRules, TransactionDefinition, TransactionError};
use tracing::{debug, error, warn};

/// Applies declared transactional behavior around invocations
#[derive(Debug)]
pub struct TransactionInterceptor {
    manager: Arc<TransactionManager>,
    attributes: Arc<AttributeRegistry>,
    default_rules: RollbackRules,
}

impl TransactionInterceptor {
    pub fn new(manager: Arc<TransactionManager>, attributes: Arc<AttributeRegistry>) -> Self {
        Self {
            manager,
            attributes,
            default_rules: RollbackRules::new(),
        }
    }

    /// Rules consulted after each operation's own rules
    pub fn with_default_rollback_rules(mut self, rules: RollbackRules) -> Self {
        self.default_rules = rules;
        self
    }

    pub fn manager(&self) -> &Arc<TransactionManager> {
        &self.manager
    }

    pub fn attributes(&self) -> &Arc<AttributeRegistry> {
        &self.attributes
    }

    /// Resolved definition for `operation`, or `None` if it is not transactional
    pub fn definition_for(
        &self,
        component: &ComponentDescriptor,
        operation: &str,
    ) -> Option<TransactionDefinition> {
        self.attributes.resolve(component, operation).map(|(site, attribute)| {
            debug!(
                component = component.name(),
                operation,
                site = ?site,
                "Resolved transaction declaration"
            );
            attribute.to_definition(format!("{}.{}", component.name(), operation))
        })
    }

    /// Invoke `body` as `operation` of `component`
    pub fn invoke<T, E>(
        &self,
        component: &ComponentDescriptor,
        operation: &str,
        body: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: Classify + From<TransactionError>,
    {
        match self.definition_for(component, operation) {
            Some(definition) => self.execute(&definition, body),
            None => body(),
        }
    }

    /// Run `body` inside a transaction described by `definition`
    pub fn execute<T, E>(&self, definition: &TransactionDefinition, body: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: Classify + From<TransactionError>,
    {
        let status = self.manager.begin(definition).map_err(E::from)?;
        let mut guard = FinishGuard {
            manager: &self.manager,
            status: Some(status),
        };
        let result = body();
        let status = guard.disarm()?;

        match result {
            Ok(value) => {
                self.manager.finish(status, Completion::Success).map_err(E::from)?;
                Ok(value)
            }
            Err(failure) => {
                let rules = definition.rollback_rules.or_else(&self.default_rules);
                let completion = Completion::from_failure(&failure, &rules);
                debug!(
                    failure_code = failure.failure_code(),
                    must_rollback = completion == Completion::Failure(RollbackDecision::MustRollback),
                    "Transactional operation failed"
                );
                match self.manager.finish(status, completion) {
                    Ok(()) => Err(failure),
                    Err(e) => {
                        warn!(
                            failure_code = failure.failure_code(),
                            error = %e,
                            "Operation failure superseded by transaction completion error"
                        );
                        Err(E::from(e))
                    }
                }
            }
        }
    }
}

// Finishes with rollback if the body unwinds.
struct FinishGuard<'a> {
    manager: &'a TransactionManager,
    status: Option<TransactionStatus>,
}

impl FinishGuard<'_> {
    fn disarm(&mut self) -> Result<TransactionStatus, TransactionError> {
        self.status
            .take()
            .ok_or_else(|| TransactionError::IllegalState("transaction status already finished".to_string()))
    }
}

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        if let Some(status) = self.status.take() {
            error!("Transactional operation panicked; rolling back");
            if let Err(e) = self
                .manager
                .finish(status, Completion::Failure(RollbackDecision::MustRollback))
            {
                error!(error = %e, "Failed to finish transaction while unwinding");
            }
        }
    }
}
