//! Read-only transactions

use crate::common::{init_tracing, Fixture, LevelService, Members, Observation, Observations};
use std::sync::Arc;
use stratatx::{
    ComponentDescriptor, Error, TransactionAttribute, TransactionDefinition, TransactionError,
    TxRuntime,
};

#[test]
fn write_through_read_only_transaction_is_rejected() {
    let fx = Fixture::new();
    fx.runtime.declare_component(
        "MemberRepository",
        TransactionAttribute::new().read_only(true),
    );

    let err = fx.members.save("cha").unwrap_err();

    assert!(matches!(
        err,
        Error::Transaction(TransactionError::ReadOnlyViolation(_))
    ));
    assert!(!fx.has_member("cha"));
    assert_eq!(fx.runtime.metrics().total_rolled_back, 1);
    fx.assert_clean();
}

#[test]
fn read_through_read_only_transaction_succeeds() {
    let fx = Fixture::new();
    fx.members.save("cha").unwrap();
    fx.runtime.declare_operation(
        "MemberRepository",
        "find",
        TransactionAttribute::new().read_only(true),
    );

    let found = fx
        .members
        .invoke("find", |repository| {
            assert!(fx.runtime.status().read_only);
            repository.find("cha")
        })
        .unwrap();

    assert_eq!(found.as_deref(), Some("cha"));
    fx.assert_clean();
}

#[test]
fn read_write_participant_inherits_read_only_transaction() {
    let fx = Fixture::new();

    let result: Result<(), Error> = fx.runtime.execute(
        &TransactionDefinition::new().read_only(true),
        || {
            fx.members.invoke("save", |repository| {
                assert!(fx.runtime.status().read_only);
                repository.save("kwon")
            })
        },
    );

    assert!(matches!(
        result,
        Err(Error::Transaction(TransactionError::ReadOnlyViolation(_)))
    ));
    assert!(!fx.has_member("kwon"));
    fx.assert_clean();
}

#[test]
fn validation_rejects_read_write_participant() {
    init_tracing();
    let runtime = TxRuntime::builder().validate_existing_transaction(true).build();

    let result: Result<(), Error> = runtime.execute(
        &TransactionDefinition::new().read_only(true),
        || runtime.execute(&TransactionDefinition::new().named("writer"), || Ok(())),
    );

    let err = result.unwrap_err();
    assert!(matches!(
        err,
        Error::Transaction(TransactionError::IllegalState(ref msg)) if msg.contains("writer")
    ));
    assert!(!runtime.status().active);
}

#[test]
fn operation_declaration_overrides_read_only_component() {
    init_tracing();
    let runtime = TxRuntime::ephemeral();
    runtime.declare_component("LevelService", TransactionAttribute::new().read_only(true));
    runtime.declare_operation("LevelService", "write", TransactionAttribute::new());
    let observations = Arc::new(Observations::default());
    let service = runtime.proxy(
        LevelService {
            manager: runtime.manager().clone(),
            observations: observations.clone(),
        },
        ComponentDescriptor::new("LevelService"),
    );

    service.invoke("write", |target| target.write()).unwrap();
    service.invoke("read", |target| target.read()).unwrap();

    assert_eq!(
        observations.take(),
        vec![
            Observation {
                operation: "write",
                active: true,
                read_only: false,
            },
            Observation {
                operation: "read",
                active: true,
                read_only: true,
            },
        ]
    );
}
