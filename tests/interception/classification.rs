//! Checked failures commit, unchecked failures roll back

use crate::common::{init_tracing, OrderService};
use stratatx::{
    Classify, ComponentDescriptor, Error, Proxy, RollbackRule, Severity, TransactionAttribute,
    TxRuntime,
};
use stratatx::InterceptorConfig;

fn order_service(runtime: &TxRuntime) -> Proxy<OrderService> {
    let store = runtime.memory_store().cloned().unwrap_or_default();
    runtime.proxy(
        OrderService {
            template: runtime.template(&store),
        },
        ComponentDescriptor::new("OrderService"),
    )
}

fn order_status(runtime: &TxRuntime, id: &str) -> Option<String> {
    runtime
        .memory_store()
        .and_then(|store| store.committed(&format!("order:{}", id)))
}

#[test]
fn successful_order_commits() {
    init_tracing();
    let runtime = TxRuntime::ephemeral();
    runtime.declare_component("OrderService", TransactionAttribute::new());
    let orders = order_service(&runtime);

    orders.invoke("order", |service| service.order("1", "normal")).unwrap();

    assert_eq!(order_status(&runtime, "1").as_deref(), Some("completed"));
}

#[test]
fn unchecked_failure_rolls_back() {
    init_tracing();
    let runtime = TxRuntime::ephemeral();
    runtime.declare_component("OrderService", TransactionAttribute::new());
    let orders = order_service(&runtime);

    let err = orders
        .invoke("order", |service| service.order("2", "error"))
        .unwrap_err();

    assert_eq!(err.severity(), Severity::Unchecked);
    assert_eq!(order_status(&runtime, "2"), None);
    assert_eq!(runtime.metrics().total_rolled_back, 1);
}

#[test]
fn checked_failure_commits_and_is_still_returned() {
    init_tracing();
    let runtime = TxRuntime::ephemeral();
    runtime.declare_component("OrderService", TransactionAttribute::new());
    let orders = order_service(&runtime);

    let err = orders
        .invoke("order", |service| service.order("3", "poor"))
        .unwrap_err();

    assert_eq!(err, Error::checked("order.not_enough_money", "balance too low"));
    assert_eq!(order_status(&runtime, "3").as_deref(), Some("waiting"));
    assert_eq!(runtime.metrics().total_committed, 1);
}

#[test]
fn declared_rule_forces_rollback_of_checked_failure() {
    init_tracing();
    let runtime = TxRuntime::ephemeral();
    runtime.declare_component(
        "OrderService",
        TransactionAttribute::new().rollback_for("order"),
    );
    let orders = order_service(&runtime);

    orders
        .invoke("order", |service| service.order("4", "poor"))
        .unwrap_err();

    assert_eq!(order_status(&runtime, "4"), None);
}

#[test]
fn more_specific_rule_wins() {
    init_tracing();
    let runtime = TxRuntime::ephemeral();
    runtime.declare_component(
        "OrderService",
        TransactionAttribute::new()
            .rollback_for("order")
            .no_rollback_for("order.system_failure"),
    );
    let orders = order_service(&runtime);

    orders
        .invoke("order", |service| service.order("5", "error"))
        .unwrap_err();
    orders
        .invoke("order", |service| service.order("6", "poor"))
        .unwrap_err();

    assert_eq!(order_status(&runtime, "5").as_deref(), Some("pending"));
    assert_eq!(order_status(&runtime, "6"), None);
}

#[test]
fn default_rules_apply_after_declared_rules() {
    init_tracing();
    let config = InterceptorConfig::new()
        .default_rollback_rule(RollbackRule::rollback_for("order.not_enough_money"));
    let runtime = TxRuntime::builder().config(config).build();
    runtime.declare_operation("OrderService", "order", TransactionAttribute::new());
    runtime.declare_operation(
        "OrderService",
        "order_leniently",
        TransactionAttribute::new().no_rollback_for("order.not_enough_money"),
    );
    let orders = order_service(&runtime);

    orders
        .invoke("order", |service| service.order("7", "poor"))
        .unwrap_err();
    orders
        .invoke("order_leniently", |service| service.order("8", "poor"))
        .unwrap_err();

    assert_eq!(order_status(&runtime, "7"), None);
    assert_eq!(order_status(&runtime, "8").as_deref(), Some("waiting"));
}

#[test]
fn declared_rule_beats_more_specific_default_rule() {
    init_tracing();
    let config = InterceptorConfig::new()
        .default_rollback_rule(RollbackRule::rollback_for("order.not_enough_money"));
    let runtime = TxRuntime::builder().config(config).build();
    runtime.declare_operation(
        "OrderService",
        "order",
        TransactionAttribute::new().no_rollback_for("order"),
    );
    let orders = order_service(&runtime);

    orders
        .invoke("order", |service| service.order("9", "poor"))
        .unwrap_err();

    assert_eq!(order_status(&runtime, "9").as_deref(), Some("waiting"));
    let metrics = runtime.metrics();
    assert_eq!(metrics.total_committed, 1);
    assert_eq!(metrics.total_rolled_back, 0);
}

#[test]
fn default_rule_applies_when_declared_rules_do_not_match() {
    init_tracing();
    let config = InterceptorConfig::new()
        .default_rollback_rule(RollbackRule::rollback_for("order.not_enough_money"));
    let runtime = TxRuntime::builder().config(config).build();
    runtime.declare_operation(
        "OrderService",
        "order",
        TransactionAttribute::new().no_rollback_for("payment"),
    );
    let orders = order_service(&runtime);

    orders
        .invoke("order", |service| service.order("10", "poor"))
        .unwrap_err();

    assert_eq!(order_status(&runtime, "10"), None);
}

#[test]
fn business_failure_code_is_preserved() {
    let err = Error::unchecked("order.system_failure", "system failure");
    assert_eq!(err.failure_code(), "order.system_failure");
}
