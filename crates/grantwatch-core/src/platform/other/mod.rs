//! Hosts without TCC-style privacy gates
//!
//! Nothing needs to be granted, so every check reports true and every
//! request is a no-op.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::reactivation::Reactivation;

pub fn accessibility_check() -> bool {
    true
}

pub fn accessibility_request() {
    tracing::debug!("accessibility needs no grant on this platform");
}

pub fn input_monitoring_check() -> bool {
    true
}

pub fn input_monitoring_request() {
    tracing::debug!("input monitoring needs no grant on this platform");
}

pub fn post_events_check() -> bool {
    true
}

pub fn post_events_request() {
    tracing::debug!("posting events needs no grant on this platform");
}

pub fn screen_recording_check() -> bool {
    true
}

pub fn screen_recording_request() {
    tracing::debug!("screen recording needs no grant on this platform");
}

/// Best effort. Settings deep links are macOS URLs, so this usually fails
/// quietly elsewhere.
pub fn open_url(url: &str) {
    if let Err(e) = spawn_opener(url) {
        tracing::warn!(url, error = %e, "failed to open settings link");
    }
}

#[cfg(target_os = "windows")]
fn spawn_opener(url: &str) -> Result<()> {
    Command::new("cmd")
        .args(["/c", "start", url])
        .spawn()
        .context("Failed to open URL")?;
    Ok(())
}

#[cfg(not(target_os = "windows"))]
fn spawn_opener(url: &str) -> Result<()> {
    Command::new("xdg-open")
        .arg(url)
        .spawn()
        .context("Failed to open URL")?;
    Ok(())
}

/// No foreground notifications to watch here; holds nothing.
pub struct ActivationWatcher {
    _private: (),
}

impl ActivationWatcher {
    pub fn spawn(_hub: Reactivation, _interval: Duration) -> Self {
        Self { _private: () }
    }

    pub fn is_running(&self) -> bool {
        false
    }

    pub fn stop(self) {}
}
