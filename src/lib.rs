//! # grantwatch
//!
//! Keeps a privileged desktop utility informed about the macOS privacy
//! permissions it depends on.
//!
//! ## Features
//!
//! - **Live state**: each permission is re-checked on a timer and whenever the
//!   app comes back to the foreground
//! - **Readiness**: one aggregate value (missing / has required / has all)
//! - **Waiting**: block until a permission is granted before using it
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use grantwatch::prelude::*;
//!
//! let coordinator = Coordinator::new(Hooks::default());
//! if let Some(ax) = coordinator.capability(CapabilityKind::Accessibility) {
//!     ax.request_access();
//!     ax.await_granted().wait();
//! }
//! grantwatch::ensure_required(&coordinator)?;
//! coordinator.stop_all();
//! # Ok::<(), grantwatch::Error>(())
//! ```

use std::time::Duration;

// Re-export the core
pub use grantwatch_core::*;

/// Prelude - import everything you need
pub mod prelude {
    pub use grantwatch_core::prelude::*;
}

/// Fail with a structured `PermissionDenied` error naming every required
/// permission that is not granted.
pub fn ensure_required(coordinator: &Coordinator) -> Result<()> {
    let missing = coordinator.missing_required();
    if missing.is_empty() {
        return Ok(());
    }
    tracing::debug!(?missing, "required permissions missing");
    Err(Error::missing(&missing))
}

/// Wait for one capability, optionally bounded.
pub fn wait_granted(capability: &Capability, timeout: Option<Duration>) -> Result<()> {
    let waiter = capability.await_granted();
    let outcome = match timeout {
        Some(t) => waiter
            .wait_timeout(t)
            .ok_or_else(|| Error::timeout(capability.kind(), t))?,
        None => waiter.wait(),
    };
    match outcome {
        WaitOutcome::Granted => Ok(()),
        WaitOutcome::Abandoned => Err(Error::abandoned(capability.kind())),
    }
}
