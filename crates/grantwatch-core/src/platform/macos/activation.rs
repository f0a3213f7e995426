//! Foreground activation watcher (polling-based for reliability)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cidre::ns;

use crate::reactivation::{ActivationEdge, Reactivation};

/// Notifies a [`Reactivation`] hub each time this process becomes the
/// active application.
pub struct ActivationWatcher {
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ActivationWatcher {
    pub fn spawn(hub: Reactivation, interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop1 = stop.clone();
        let thread = thread::Builder::new()
            .name("grantwatch-activation".into())
            .spawn(move || run(hub, stop1, interval))
            .map_err(|e| tracing::warn!(error = %e, "failed to spawn activation watcher"))
            .ok();
        Self { stop, thread }
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some() && !self.stop.load(Ordering::Relaxed)
    }

    pub fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

impl Drop for ActivationWatcher {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

fn run(hub: Reactivation, stop: Arc<AtomicBool>, interval: Duration) {
    let pid = std::process::id() as i32;
    let mut edge = ActivationEdge::new(is_active(pid));

    while !stop.load(Ordering::Relaxed) {
        if edge.observe(is_active(pid)) {
            tracing::debug!("app became active");
            hub.notify();
        }
        thread::sleep(interval);
    }
}

fn is_active(pid: i32) -> bool {
    let workspace = ns::Workspace::shared();
    let apps = workspace.running_apps();
    apps.iter().any(|app| app.pid() == pid && app.is_active())
}
