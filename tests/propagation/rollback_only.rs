//! Rollback-only markers raised by participants

use crate::common::{Fixture, Members};
use stratatx::{Error, Propagation, TransactionDefinition, TransactionError};

#[test]
fn swallowed_participant_failure_surfaces_as_unexpected_rollback() {
    let fx = Fixture::new();
    fx.declare_service(Propagation::Required);

    let err = fx.join_recovering_log("fail-shin").unwrap_err();

    assert!(err.is_unexpected_rollback());
    assert!(matches!(
        err,
        Error::Transaction(TransactionError::UnexpectedRollback { name: Some(ref n) }) if n == "MemberService.join_recovering_log"
    ));
    assert!(!fx.has_member("fail-shin"));
    assert!(!fx.has_log("fail-shin"));
    let metrics = fx.runtime.metrics();
    assert_eq!(metrics.total_unexpected_rollbacks, 1);
    assert_eq!(metrics.total_committed, 0);
    fx.assert_clean();
}

#[test]
fn marker_is_visible_to_owner_after_participant_finishes() {
    let fx = Fixture::new();

    let result: Result<(), Error> = fx.runtime.execute(&TransactionDefinition::new(), || {
        let _ = fx.members.invoke("save", |_| -> Result<(), Error> {
            Err(Error::unchecked("member.invalid", "rejected"))
        });
        let status = fx.runtime.status();
        assert!(status.active);
        assert!(status.rollback_only);
        Ok(())
    });

    assert!(result.unwrap_err().is_unexpected_rollback());
    fx.assert_clean();
}

#[test]
fn explicit_rollback_only_on_owner_rolls_back_silently() {
    let fx = Fixture::new();

    fx.runtime
        .execute(&TransactionDefinition::new(), || {
            fx.members.save("song")?;
            fx.runtime.set_rollback_only()?;
            Ok::<_, Error>(())
        })
        .unwrap();

    assert!(!fx.has_member("song"));
    let metrics = fx.runtime.metrics();
    assert_eq!(metrics.total_rolled_back, 1);
    assert_eq!(metrics.total_unexpected_rollbacks, 0);
    fx.assert_clean();
}

#[test]
fn explicit_rollback_only_in_participant_marks_owner() {
    let fx = Fixture::new();

    let result: Result<(), Error> = fx.runtime.execute(&TransactionDefinition::new(), || {
        fx.members.invoke("save", |repository| {
            repository.save("moon")?;
            fx.runtime.set_rollback_only()
        })
    });

    assert!(result.unwrap_err().is_unexpected_rollback());
    assert!(!fx.has_member("moon"));
    fx.assert_clean();
}
