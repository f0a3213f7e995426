//! Platform abstraction layer
//!
//! OS permission queries, consent flows, deep-link opening and the
//! foreground-activation watcher.

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(not(target_os = "macos"))]
pub mod other;

// Re-export the current platform
#[cfg(target_os = "macos")]
pub use macos as current;

#[cfg(not(target_os = "macos"))]
pub use other as current;

pub use current::ActivationWatcher;
