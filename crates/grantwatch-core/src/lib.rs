//! grantwatch-core - live tracking of OS-gated permissions
//!
//! A [`Capability`] owns one permission's grant flag and keeps it in sync
//! with the OS on a background loop. A [`Coordinator`] owns the fixed set of
//! four and folds them into one [`AggregateState`].
//!
//! ## Platform Support
//!
//! - **macOS**: Accessibility, Input Monitoring, Post Events, Screen Recording
//! - **Other**: no privacy gates; every built-in capability reports granted

pub mod builtin;
pub mod capability;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod kind;
pub mod observer;
pub mod platform;
pub mod reactivation;

pub use capability::{
    Capability, CapabilitySnapshot, CapabilitySpec, CheckFn, GrantWaiter, RequestFn, WaitOutcome,
};
pub use config::{Hooks, MonitorConfig, OpenUrlFn};
pub use coordinator::{Coordinator, CoordinatorSnapshot};
pub use error::{Error, ErrorCode, Result};
pub use kind::{AggregateState, CapabilityKind};
pub use observer::Subscription;
pub use platform::ActivationWatcher;
pub use reactivation::Reactivation;

pub mod prelude {
    pub use crate::capability::{Capability, CapabilitySpec, GrantWaiter, WaitOutcome};
    pub use crate::config::{Hooks, MonitorConfig};
    pub use crate::coordinator::Coordinator;
    pub use crate::error::{Error, ErrorCode, Result};
    pub use crate::kind::{AggregateState, CapabilityKind};
    pub use crate::platform::ActivationWatcher;
    pub use crate::reactivation::Reactivation;
}
