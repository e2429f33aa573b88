//! Component lifecycle hooks

use crate::common::{init_tracing, Observation, Observations};
use std::sync::Arc;
use stratatx::prelude::*;
use stratatx::{TransactionError, TransactionManager, INIT_OPERATION, READY_OPERATION};

struct WarmupService {
    manager: Arc<TransactionManager>,
    observations: Arc<Observations>,
}

impl Component for WarmupService {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new("WarmupService")
    }

    fn init(&self) -> Result<()> {
        self.observations.record("init", &self.manager);
        Ok(())
    }

    fn on_ready(&self) -> Result<()> {
        self.observations.record("on_ready", &self.manager);
        Ok(())
    }
}

fn warmup(runtime: &TxRuntime, observations: &Arc<Observations>) -> WarmupService {
    WarmupService {
        manager: runtime.manager().clone(),
        observations: observations.clone(),
    }
}

#[test]
fn init_is_never_transactional_and_on_ready_is() {
    init_tracing();
    let runtime = TxRuntime::ephemeral();
    runtime.declare_component("WarmupService", TransactionAttribute::new());
    let observations = Arc::new(Observations::default());

    let proxy = runtime.register(warmup(&runtime, &observations)).unwrap();
    assert!(proxy.is_transactional(INIT_OPERATION));
    assert_eq!(
        observations.take(),
        vec![Observation {
            operation: "init",
            active: false,
            read_only: false,
        }]
    );

    runtime.start().unwrap();
    assert_eq!(
        observations.take(),
        vec![Observation {
            operation: "on_ready",
            active: true,
            read_only: false,
        }]
    );
    assert_eq!(runtime.metrics().total_committed, 1);
}

#[test]
fn undeclared_on_ready_runs_without_transaction() {
    init_tracing();
    let runtime = TxRuntime::ephemeral();
    runtime.declare_operation("WarmupService", "other", TransactionAttribute::new());
    let observations = Arc::new(Observations::default());

    runtime.register(warmup(&runtime, &observations)).unwrap();
    observations.take();
    runtime.start().unwrap();

    assert_eq!(
        observations.take(),
        vec![Observation {
            operation: READY_OPERATION,
            active: false,
            read_only: false,
        }]
    );
}

struct BrokenService;

impl Component for BrokenService {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new("BrokenService")
    }

    fn init(&self) -> Result<()> {
        Err(Error::unchecked("broken.init", "cannot initialize"))
    }
}

#[test]
fn failing_init_prevents_registration() {
    init_tracing();
    let runtime = TxRuntime::ephemeral();

    let err = runtime.register(BrokenService).unwrap_err();

    assert_eq!(err, Error::unchecked("broken.init", "cannot initialize"));
    runtime.start().unwrap();
}

#[test]
fn runtime_starts_once() {
    init_tracing();
    let runtime = TxRuntime::ephemeral();
    runtime.start().unwrap();

    let err = runtime.start().unwrap_err();

    assert!(matches!(
        err.as_transaction_error(),
        Some(TransactionError::IllegalState(_))
    ));
}
