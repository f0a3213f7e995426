//! macOS platform implementation
//!
//! Accessibility via AX, listen access via cidre's CG bindings, the rest
//! through direct IOKit/CoreGraphics calls. Every query folds failure into
//! "not granted".

mod activation;

pub use activation::ActivationWatcher;

use std::ffi::c_void;
use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result};
use cidre::ax;
use cidre::cg::event::access as cg_access;

// IOHIDRequestType
const HID_REQUEST_POST_EVENT: u32 = 0;
const HID_REQUEST_LISTEN_EVENT: u32 = 1;

// IOHIDAccessType
const HID_ACCESS_GRANTED: u32 = 0;
const HID_ACCESS_UNKNOWN: u32 = 2;

#[link(name = "IOKit", kind = "framework")]
extern "C" {
    fn IOHIDCheckAccess(request_type: u32) -> u32;
    fn IOHIDRequestAccess(request_type: u32) -> bool;
    fn IOHIDManagerCreate(allocator: *const c_void, options: u32) -> *mut c_void;
    fn IOHIDManagerSetDeviceMatching(manager: *mut c_void, matching: *const c_void);
    fn IOHIDManagerOpen(manager: *mut c_void, options: u32) -> i32;
}

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGPreflightPostEventAccess() -> bool;
    fn CGRequestPostEventAccess() -> bool;
    fn CGPreflightScreenCaptureAccess() -> bool;
    fn CGRequestScreenCaptureAccess() -> bool;
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFRelease(cf: *const c_void);
}

/// HID verdict, falling back to the legacy CG preflight when HID cannot tell.
fn collapse_hid(access: u32, legacy: impl FnOnce() -> bool) -> bool {
    match access {
        HID_ACCESS_GRANTED => true,
        HID_ACCESS_UNKNOWN => legacy(),
        _ => false,
    }
}

// ── Accessibility ───────────────────────────────────────────────────────────

pub fn accessibility_check() -> bool {
    ax::is_process_trusted()
}

/// Shows the trust prompt, then reveals the app in Finder so it can be
/// dragged into the list.
pub fn accessibility_request() {
    ax::is_process_trusted_with_prompt(true);
    reveal_app_bundle();
}

// ── Input Monitoring ────────────────────────────────────────────────────────

pub fn input_monitoring_check() -> bool {
    let access = unsafe { IOHIDCheckAccess(HID_REQUEST_LISTEN_EVENT) };
    collapse_hid(access, cg_access::listen_preflight)
}

/// Asks HID for listen access and opens a device manager so the app shows
/// up in the Input Monitoring list, then asks CG as well.
pub fn input_monitoring_request() {
    unsafe {
        IOHIDRequestAccess(HID_REQUEST_LISTEN_EVENT);
        let manager = IOHIDManagerCreate(std::ptr::null(), 0);
        if !manager.is_null() {
            IOHIDManagerSetDeviceMatching(manager, std::ptr::null());
            let status = IOHIDManagerOpen(manager, 0);
            tracing::debug!(status, "opened HID manager");
            CFRelease(manager);
        }
    }
    cg_access::listen_request();
    reveal_app_bundle();
}

// ── Post Events ─────────────────────────────────────────────────────────────

pub fn post_events_check() -> bool {
    let access = unsafe { IOHIDCheckAccess(HID_REQUEST_POST_EVENT) };
    collapse_hid(access, || unsafe { CGPreflightPostEventAccess() })
}

pub fn post_events_request() {
    unsafe {
        IOHIDRequestAccess(HID_REQUEST_POST_EVENT);
        CGRequestPostEventAccess();
    }
    reveal_app_bundle();
}

// ── Screen Recording ────────────────────────────────────────────────────────

/// Screen capture access, owned by the capture subsystem.
pub mod screen_capture {
    pub fn has_access() -> bool {
        unsafe { super::CGPreflightScreenCaptureAccess() }
    }

    /// First call shows the system dialog; later calls only report.
    pub fn request_access() -> bool {
        unsafe { super::CGRequestScreenCaptureAccess() }
    }
}

pub fn screen_recording_check() -> bool {
    screen_capture::has_access()
}

pub fn screen_recording_request() {
    let granted = screen_capture::request_access();
    tracing::debug!(granted, "screen capture request returned");
}

// ── Workspace ───────────────────────────────────────────────────────────────

/// Open a URL (settings deep link) without waiting. Failures are logged.
pub fn open_url(url: &str) {
    if let Err(e) = spawn_open(&[url]) {
        tracing::warn!(url, error = %e, "failed to open settings link");
    }
}

/// Select the running app's bundle in Finder.
pub fn reveal_app_bundle() {
    let Some(bundle) = app_bundle_path() else {
        tracing::debug!("not running from an app bundle, nothing to reveal");
        return;
    };
    let path = bundle.to_string_lossy();
    if let Err(e) = spawn_open(&["-R", path.as_ref()]) {
        tracing::warn!(path = %path, error = %e, "failed to reveal app bundle");
    }
}

fn spawn_open(args: &[&str]) -> Result<()> {
    Command::new("open")
        .args(args)
        .spawn()
        .context("Failed to run open")?;
    Ok(())
}

/// The enclosing `.app` directory of the current executable, if any.
fn app_bundle_path() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    exe.ancestors()
        .find(|p| p.extension().is_some_and(|ext| ext == "app"))
        .map(|p| p.to_path_buf())
}
