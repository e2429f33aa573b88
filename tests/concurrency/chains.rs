//! Random invocation chains always unwind to an empty registry

use crate::common::init_tracing;
use proptest::prelude::*;
use stratatx::{Error, MemoryTemplate, Propagation, TransactionDefinition, TxRuntime};

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Succeed,
    FailChecked,
    FailUnchecked,
    /// Ignore the callee's failure
    Swallow,
}

fn outcome() -> impl Strategy<Value = Outcome> {
    prop_oneof![
        Just(Outcome::Succeed),
        Just(Outcome::FailChecked),
        Just(Outcome::FailUnchecked),
        Just(Outcome::Swallow),
    ]
}

fn propagation() -> impl Strategy<Value = Propagation> {
    (0usize..Propagation::ALL.len()).prop_map(|i| Propagation::ALL[i])
}

fn call(
    runtime: &TxRuntime,
    template: &MemoryTemplate,
    steps: &[(Propagation, Outcome)],
    depth: usize,
) -> Result<(), Error> {
    let Some(((propagation, outcome), rest)) = steps.split_first() else {
        return Ok(());
    };
    let definition = TransactionDefinition::with_propagation(*propagation);
    runtime.execute(&definition, || {
        template.put(&format!("step:{}", depth), "done")?;
        let nested = call(runtime, template, rest, depth + 1);
        match outcome {
            Outcome::Swallow => {}
            _ => nested?,
        }
        match outcome {
            Outcome::FailChecked => Err(Error::checked("step.checked", "expected")),
            Outcome::FailUnchecked => Err(Error::unchecked("step.unchecked", "unexpected")),
            Outcome::Succeed | Outcome::Swallow => Ok(()),
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn chains_leave_no_transaction_behind(
        steps in proptest::collection::vec((propagation(), outcome()), 1..8)
    ) {
        init_tracing();
        let runtime = TxRuntime::ephemeral();
        let store = runtime.memory_store().cloned().unwrap_or_default();
        let template = runtime.template(&store);

        let before = runtime.status();
        let _ = call(&runtime, &template, &steps, 0);

        prop_assert_eq!(runtime.status(), before);
        prop_assert_eq!(store.stats().open_connections(), 0);
        let metrics = runtime.metrics();
        prop_assert_eq!(metrics.active_count, 0);
        prop_assert_eq!(metrics.total_begun, store.stats().connections_opened);
    }
}
