//! Shared test utilities and demo services.
//!
//! Every suite pulls this in with `#[path = "../common/mod.rs"] mod common;`.
//! Not every suite uses every helper.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;
use stratatx::prelude::*;
use stratatx::{Propagation, TransactionManager};

/// Route tracing output through the test harness.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(
                    "stratatx=debug,stratatx_concurrency=debug,stratatx_engine=debug",
                )
            }),
        )
        .try_init();
}

// =============================================================================
// REPOSITORIES
// =============================================================================

/// Stores members under `member:<name>`
pub struct MemberRepository {
    template: MemoryTemplate,
}

impl MemberRepository {
    pub fn save(&self, name: &str) -> Result<()> {
        self.template.put(&format!("member:{}", name), name)?;
        Ok(())
    }

    pub fn find(&self, name: &str) -> Result<Option<String>> {
        Ok(self.template.get(&format!("member:{}", name))?)
    }
}

/// Capability contract of the member repository
pub trait Members {
    fn save(&self, name: &str) -> Result<()>;
    fn find(&self, name: &str) -> Result<Option<String>>;
}

impl Members for Proxy<MemberRepository> {
    fn save(&self, name: &str) -> Result<()> {
        self.invoke("save", |repository| repository.save(name))
    }

    fn find(&self, name: &str) -> Result<Option<String>> {
        self.invoke("find", |repository| repository.find(name))
    }
}

/// Stores audit messages under `log:<message>`
///
/// Messages containing `"fail"` are written and then rejected with an
/// unchecked failure.
pub struct LogRepository {
    template: MemoryTemplate,
}

impl LogRepository {
    pub fn save(&self, message: &str) -> Result<()> {
        self.template.put(&format!("log:{}", message), message)?;
        if message.contains("fail") {
            return Err(Error::unchecked("log.save_failed", format!("cannot store {}", message)));
        }
        Ok(())
    }
}

pub trait Logs {
    fn save(&self, message: &str) -> Result<()>;
}

impl Logs for Proxy<LogRepository> {
    fn save(&self, message: &str) -> Result<()> {
        self.invoke("save", |repository| repository.save(message))
    }
}

// =============================================================================
// MEMBER SERVICE
// =============================================================================

/// Joins a member and writes an audit log through two repositories
pub struct MemberService {
    members: Proxy<MemberRepository>,
    logs: Proxy<LogRepository>,
}

impl MemberService {
    pub fn join(&self, name: &str) -> Result<()> {
        self.members.save(name)?;
        self.logs.save(name)?;
        Ok(())
    }

    /// Swallows a log failure so the member is still saved
    pub fn join_recovering_log(&self, name: &str) -> Result<()> {
        self.members.save(name)?;
        if let Err(e) = self.logs.save(name) {
            tracing::info!(error = %e, "Log save failed; continuing");
        }
        Ok(())
    }
}

pub struct Fixture {
    pub runtime: TxRuntime,
    pub store: MemoryStore,
    pub members: Proxy<MemberRepository>,
    pub logs: Proxy<LogRepository>,
    pub service: Proxy<MemberService>,
}

impl Fixture {
    /// Runtime with member/log repositories declared `REQUIRED` and the
    /// member service left undeclared
    pub fn new() -> Self {
        init_tracing();
        let store = MemoryStore::new();
        let runtime = TxRuntime::builder().memory_store(store.clone()).build();

        runtime.declare_component("MemberRepository", TransactionAttribute::new());
        runtime.declare_component("LogRepository", TransactionAttribute::new());

        let members = runtime.proxy(
            MemberRepository {
                template: runtime.template(&store),
            },
            ComponentDescriptor::new("MemberRepository").implements("Members"),
        );
        let logs = runtime.proxy(
            LogRepository {
                template: runtime.template(&store),
            },
            ComponentDescriptor::new("LogRepository").implements("Logs"),
        );
        let service = runtime.proxy(
            MemberService {
                members: members.clone(),
                logs: logs.clone(),
            },
            ComponentDescriptor::new("MemberService"),
        );

        Fixture {
            runtime,
            store,
            members,
            logs,
            service,
        }
    }

    pub fn declare_service(&self, propagation: Propagation) {
        self.runtime.declare_component(
            "MemberService",
            TransactionAttribute::new().propagation(propagation),
        );
    }

    pub fn declare_log(&self, propagation: Propagation) {
        self.runtime.declare_component(
            "LogRepository",
            TransactionAttribute::new().propagation(propagation),
        );
    }

    pub fn join(&self, name: &str) -> Result<()> {
        self.service.invoke("join", |service| service.join(name))
    }

    pub fn join_recovering_log(&self, name: &str) -> Result<()> {
        self.service
            .invoke("join_recovering_log", |service| service.join_recovering_log(name))
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.store.committed(&format!("member:{}", name)).is_some()
    }

    pub fn has_log(&self, message: &str) -> bool {
        self.store.committed(&format!("log:{}", message)).is_some()
    }

    /// No transaction bound and no connection left open
    pub fn assert_clean(&self) {
        assert!(!self.runtime.status().active, "transaction still bound");
        assert_eq!(self.store.stats().open_connections(), 0, "connection leaked");
    }
}

// =============================================================================
// OBSERVING SERVICES
// =============================================================================

/// Transaction state seen from inside an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub operation: &'static str,
    pub active: bool,
    pub read_only: bool,
}

/// Records the transaction state each operation runs under
#[derive(Default)]
pub struct Observations {
    seen: Mutex<Vec<Observation>>,
}

impl Observations {
    pub fn record(&self, operation: &'static str, manager: &TransactionManager) {
        self.seen.lock().push(Observation {
            operation,
            active: manager.is_actual_transaction_active(),
            read_only: manager.is_current_transaction_read_only(),
        });
    }

    pub fn take(&self) -> Vec<Observation> {
        std::mem::take(&mut *self.seen.lock())
    }
}

/// `external` is undeclared and calls the declared `internal` on itself
pub struct CallService {
    pub manager: Arc<TransactionManager>,
    pub observations: Arc<Observations>,
}

impl CallService {
    pub fn external(&self) -> Result<()> {
        self.observations.record("external", &self.manager);
        self.internal()
    }

    pub fn internal(&self) -> Result<()> {
        self.observations.record("internal", &self.manager);
        Ok(())
    }
}

/// Holds `internal` on its own so callers reach it through a proxy
pub struct InternalService {
    pub manager: Arc<TransactionManager>,
    pub observations: Arc<Observations>,
}

impl InternalService {
    pub fn internal(&self) -> Result<()> {
        self.observations.record("internal", &self.manager);
        Ok(())
    }
}

/// Calls `internal` on a separately proxied component
pub struct SplitCallService {
    pub manager: Arc<TransactionManager>,
    pub observations: Arc<Observations>,
    pub internal: Proxy<InternalService>,
}

impl SplitCallService {
    pub fn external(&self) -> Result<()> {
        self.observations.record("external", &self.manager);
        self.internal.invoke("internal", |service| service.internal())
    }
}

/// Declared read-only as a whole, with `write` overriding it
pub struct LevelService {
    pub manager: Arc<TransactionManager>,
    pub observations: Arc<Observations>,
}

impl LevelService {
    pub fn write(&self) -> Result<()> {
        self.observations.record("write", &self.manager);
        Ok(())
    }

    pub fn read(&self) -> Result<()> {
        self.observations.record("read", &self.manager);
        Ok(())
    }
}

// =============================================================================
// ORDER SERVICE
// =============================================================================

/// Places orders; the outcome depends on the customer name
///
/// - `"error"`: unchecked failure `order.system_failure`
/// - `"poor"`: checked failure `order.not_enough_money`, with the order
///   left in state `waiting`
/// - anything else: order completed
pub struct OrderService {
    pub template: MemoryTemplate,
}

impl OrderService {
    pub fn order(&self, id: &str, customer: &str) -> Result<()> {
        let key = format!("order:{}", id);
        self.template.put(&key, "pending")?;
        match customer {
            "error" => Err(Error::unchecked("order.system_failure", "system failure")),
            "poor" => {
                self.template.put(&key, "waiting")?;
                Err(Error::checked("order.not_enough_money", "balance too low"))
            }
            _ => {
                self.template.put(&key, "completed")?;
                Ok(())
            }
        }
    }
}
