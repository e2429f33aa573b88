//! Component lifecycle hooks.
//!
//! Components registered with [`TxRuntime::register`](crate::TxRuntime::register)
//! get two hooks:
//!
//! - `init` runs on the raw component while it is being registered, before
//!   its proxy exists. It is never transactional, whatever is declared for
//!   the `init` operation.
//! - `on_ready` runs through the proxy when the runtime is started, so a
//!   declaration for the `on_ready` operation takes effect.

use crate::error::Result;
use stratatx_engine::ComponentDescriptor;

/// Operation name of the registration-time hook
pub const INIT_OPERATION: &str = "init";

/// Operation name of the start-time hook
pub const READY_OPERATION: &str = "on_ready";

/// A business component managed by the runtime
pub trait Component: Send + Sync + 'static {
    /// Names declarations are resolved against
    fn descriptor(&self) -> ComponentDescriptor;

    /// Called once during registration, on the raw component
    fn init(&self) -> Result<()> {
        Ok(())
    }

    /// Called once when the runtime starts, through the proxy
    fn on_ready(&self) -> Result<()> {
        Ok(())
    }
}

pub(crate) type ReadyHook = Box<dyn Fn() -> Result<()> + Send + Sync>;
