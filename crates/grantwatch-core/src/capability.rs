//! A single OS-gated permission with a live, continuously re-evaluated grant flag
//!
//! A [`Capability`] seeds its flag with one synchronous check, then keeps it in
//! sync on a worker thread. The loop ticks once immediately, then on every
//! `poll_interval` and on every reactivation event. Grants can flip without any
//! notification reaching the app, so polling is the only reliable signal.
//!
//! ## Threading
//!
//! State sits behind one mutex per capability. `check`, `request` and observers
//! always run with that mutex released. Check-and-assign is serialized per
//! capability, so observers see transitions in the order they happened.
//! Observers must not block.

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, never, select, tick, Receiver, Sender};
use parking_lot::{Mutex, ReentrantMutex};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use crate::config::Hooks;
use crate::kind::CapabilityKind;
use crate::observer::{ObserverList, Subscription};

/// Queries the OS. Must be fast and must report failures as `false`.
pub type CheckFn = Arc<dyn Fn() -> bool + Send + Sync>;

/// Starts the OS consent flow (prompt, listener registration, ...).
pub type RequestFn = Arc<dyn Fn() + Send + Sync>;

/// Static description of a capability plus its injected predicate pair.
#[derive(Clone)]
pub struct CapabilitySpec {
    pub kind: CapabilityKind,
    pub title: String,
    pub details: Vec<String>,
    pub required: bool,
    pub settings_url: Option<String>,
    pub check: CheckFn,
    pub request: RequestFn,
}

impl CapabilitySpec {
    pub fn new<C, R>(kind: CapabilityKind, check: C, request: R) -> Self
    where
        C: Fn() -> bool + Send + Sync + 'static,
        R: Fn() + Send + Sync + 'static,
    {
        Self {
            kind,
            title: kind.title().to_string(),
            details: Vec::new(),
            required: true,
            settings_url: None,
            check: Arc::new(check),
            request: Arc::new(request),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn details<I, S>(mut self, details: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.details = details.into_iter().map(Into::into).collect();
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn settings_url(mut self, url: impl Into<String>) -> Self {
        self.settings_url = Some(url.into());
        self
    }
}

impl fmt::Debug for CapabilitySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilitySpec")
            .field("kind", &self.kind)
            .field("title", &self.title)
            .field("required", &self.required)
            .field("settings_url", &self.settings_url)
            .finish_non_exhaustive()
    }
}

struct State {
    granted: bool,
    checked_at: DateTime<Utc>,
    /// Bumped on every start/stop; a loop whose epoch is stale may not assign.
    epoch: u64,
    monitor: Option<Monitor>,
    waiters: Vec<(u64, Sender<()>)>,
    next_waiter: u64,
}

/// Handle on a running loop. Dropping `_stop` ends it.
struct Monitor {
    _stop: Sender<()>,
    listener: u64,
}

/// Serializable view of one capability.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilitySnapshot {
    pub kind: CapabilityKind,
    pub title: String,
    pub details: Vec<String>,
    pub required: bool,
    pub granted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings_url: Option<String>,
    pub monitoring: bool,
    pub checked_at: DateTime<Utc>,
}

pub struct Capability {
    kind: CapabilityKind,
    title: String,
    details: Vec<String>,
    required: bool,
    settings_url: Option<String>,
    check: CheckFn,
    request: RequestFn,
    hooks: Hooks,
    state: Mutex<State>,
    /// Serializes check + assign + notify. Reentrant so an observer may refresh.
    gate: ReentrantMutex<()>,
    observers: ObserverList<bool>,
    this: Weak<Capability>,
}

impl Capability {
    /// Evaluates `check` once to seed the flag, then starts monitoring.
    pub fn new(spec: CapabilitySpec, hooks: Hooks) -> Arc<Self> {
        let granted = (spec.check)();
        let cap = Arc::new_cyclic(|this| Capability {
            kind: spec.kind,
            title: spec.title,
            details: spec.details,
            required: spec.required,
            settings_url: spec.settings_url,
            check: spec.check,
            request: spec.request,
            hooks,
            state: Mutex::new(State {
                granted,
                checked_at: Utc::now(),
                epoch: 0,
                monitor: None,
                waiters: Vec::new(),
                next_waiter: 0,
            }),
            gate: ReentrantMutex::new(()),
            observers: ObserverList::new(),
            this: this.clone(),
        });
        tracing::debug!(kind = %cap.kind, granted, "capability created");
        cap.start_monitoring();
        cap
    }

    pub fn kind(&self) -> CapabilityKind {
        self.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn details(&self) -> &[String] {
        &self.details
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn settings_url(&self) -> Option<&str> {
        self.settings_url.as_deref()
    }

    pub fn is_granted(&self) -> bool {
        self.state.lock().granted
    }

    pub fn is_monitoring(&self) -> bool {
        self.state.lock().monitor.is_some()
    }

    pub fn checked_at(&self) -> DateTime<Utc> {
        self.state.lock().checked_at
    }

    /// Number of registered change observers (waiters not included).
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Number of pending `await_granted` registrations.
    pub fn waiter_count(&self) -> usize {
        self.state.lock().waiters.len()
    }

    pub fn snapshot(&self) -> CapabilitySnapshot {
        let state = self.state.lock();
        CapabilitySnapshot {
            kind: self.kind,
            title: self.title.clone(),
            details: self.details.clone(),
            required: self.required,
            granted: state.granted,
            settings_url: self.settings_url.clone(),
            monitoring: state.monitor.is_some(),
            checked_at: state.checked_at,
        }
    }

    /// Register a change observer. Called with the new value, only when it differs.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.observers.add(observer)
    }

    /// Re-run the check now. Observers fire on this thread before it returns.
    pub fn refresh(&self) {
        self.evaluate(None);
    }

    /// No-op when granted. Otherwise runs the request flow and opens the
    /// settings pane without waiting on either.
    pub fn request_access(&self) {
        if self.is_granted() {
            return;
        }
        tracing::info!(kind = %self.kind, "requesting permission");
        (self.request)();
        if let Some(url) = &self.settings_url {
            (self.hooks.open_url)(url);
        }
    }

    /// Wait handle that resolves on the next true transition. Already granted
    /// returns a ready handle without registering anything.
    pub fn await_granted(&self) -> GrantWaiter {
        let mut state = self.state.lock();
        if state.granted {
            return GrantWaiter {
                kind: self.kind,
                pending: None,
            };
        }
        let (tx, rx) = bounded(1);
        let id = state.next_waiter;
        state.next_waiter += 1;
        state.waiters.push((id, tx));
        GrantWaiter {
            kind: self.kind,
            pending: Some(Pending {
                id,
                rx,
                owner: self.this.clone(),
            }),
        }
    }

    /// Arm the monitor loop. No-op if already running.
    pub fn start_monitoring(&self) {
        let (epoch, stop_rx, reactivated) = {
            let mut state = self.state.lock();
            if state.monitor.is_some() {
                return;
            }
            state.epoch += 1;
            let (stop, stop_rx) = bounded::<()>(0);
            let (listener, reactivated) = self.hooks.reactivation.subscribe();
            state.monitor = Some(Monitor { _stop: stop, listener });
            (state.epoch, stop_rx, reactivated)
        };

        let cap = self.this.clone();
        let interval = self.hooks.config.poll_interval;
        let spawned = thread::Builder::new()
            .name(format!("grantwatch-{}", self.kind))
            .spawn(move || run_monitor(cap, epoch, interval, reactivated, stop_rx));

        match spawned {
            Ok(_) => tracing::debug!(kind = %self.kind, epoch, "monitoring started"),
            Err(e) => {
                tracing::warn!(kind = %self.kind, error = %e, "failed to spawn monitor thread");
                let monitor = self.state.lock().monitor.take();
                if let Some(m) = monitor {
                    self.hooks.reactivation.unsubscribe(m.listener);
                }
            }
        }
    }

    /// Stop the loop and discard pending waiters. Idempotent.
    ///
    /// Waits for an in-flight check and its notifications to finish, so no
    /// observer runs for this capability after it returns.
    pub fn stop_monitoring(&self) {
        let _gate = self.gate.lock();
        let (monitor, discarded) = {
            let mut state = self.state.lock();
            state.epoch += 1;
            let discarded = std::mem::take(&mut state.waiters).len();
            (state.monitor.take(), discarded)
        };
        let was_running = monitor.is_some();
        if let Some(m) = monitor {
            self.hooks.reactivation.unsubscribe(m.listener);
        }
        if was_running || discarded > 0 {
            tracing::info!(kind = %self.kind, discarded, "monitoring stopped");
        }
    }

    /// Check and assign. With an epoch, only while that loop is still current.
    /// Returns false when the epoch went stale.
    fn evaluate(&self, epoch: Option<u64>) -> bool {
        let _gate = self.gate.lock();
        let granted = (self.check)();

        let waiters = {
            let mut state = self.state.lock();
            if epoch.is_some_and(|e| e != state.epoch) {
                return false;
            }
            state.checked_at = Utc::now();
            if state.granted == granted {
                return true;
            }
            state.granted = granted;
            if granted {
                std::mem::take(&mut state.waiters)
            } else {
                Vec::new()
            }
        };

        tracing::info!(kind = %self.kind, granted, "permission changed");
        for (_, tx) in waiters {
            let _ = tx.try_send(());
        }
        self.observers.emit(granted);
        true
    }

    fn remove_waiter(&self, id: u64) {
        self.state.lock().waiters.retain(|(i, _)| *i != id);
    }
}

impl Drop for Capability {
    fn drop(&mut self) {
        if let Some(m) = self.state.get_mut().monitor.take() {
            self.hooks.reactivation.unsubscribe(m.listener);
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Capability")
            .field("kind", &self.kind)
            .field("required", &self.required)
            .field("granted", &state.granted)
            .field("monitoring", &state.monitor.is_some())
            .finish()
    }
}

fn run_monitor(
    cap: Weak<Capability>,
    epoch: u64,
    interval: Duration,
    mut reactivated: Receiver<()>,
    stop: Receiver<()>,
) {
    let ticker = tick(interval);

    // Immediate tick: covers changes between construction and first observer.
    if !tick_once(&cap, epoch) {
        return;
    }

    loop {
        let mut hub_gone = false;
        select! {
            recv(ticker) -> _ => {}
            recv(reactivated) -> msg => hub_gone = msg.is_err(),
            recv(stop) -> _ => break,
        }
        if hub_gone {
            reactivated = never();
            continue;
        }
        if !tick_once(&cap, epoch) {
            break;
        }
    }
}

fn tick_once(cap: &Weak<Capability>, epoch: u64) -> bool {
    match cap.upgrade() {
        Some(cap) => cap.evaluate(Some(epoch)),
        None => false,
    }
}

/// Outcome of waiting on a [`GrantWaiter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The capability was granted.
    Granted,
    /// Monitoring stopped (or the capability was dropped) first. The
    /// registration is gone and will never fire.
    Abandoned,
}

struct Pending {
    id: u64,
    rx: Receiver<()>,
    owner: Weak<Capability>,
}

impl Drop for Pending {
    fn drop(&mut self) {
        if let Some(cap) = self.owner.upgrade() {
            cap.remove_waiter(self.id);
        }
    }
}

/// One-shot wait for a capability to become granted.
///
/// Resolves at most once. Dropping it (or calling [`cancel`](Self::cancel))
/// removes the registration without it firing. There is no built-in timeout;
/// [`wait_timeout`](Self::wait_timeout) races against an external deadline.
///
/// # Stopped monitoring
///
/// A plain "await granted" never resumes once monitoring stops. This handle
/// does not suspend forever in that case: [`Capability::stop_monitoring`]
/// discards the registration and a blocked [`wait`](Self::wait) returns
/// [`WaitOutcome::Abandoned`]. Treat `Abandoned` as "not granted, nothing
/// more will arrive". It is never reported after a real grant, and a later
/// `start_monitoring` does not revive it.
#[must_use = "a GrantWaiter does nothing unless waited on"]
pub struct GrantWaiter {
    kind: CapabilityKind,
    pending: Option<Pending>,
}

impl GrantWaiter {
    pub fn kind(&self) -> CapabilityKind {
        self.kind
    }

    /// True when the capability was already granted at registration.
    pub fn is_ready(&self) -> bool {
        self.pending.is_none()
    }

    /// Block until granted, or until monitoring stops and the wait is
    /// [`Abandoned`](WaitOutcome::Abandoned).
    pub fn wait(mut self) -> WaitOutcome {
        match self.pending.take() {
            None => WaitOutcome::Granted,
            Some(p) => match p.rx.recv() {
                Ok(()) => WaitOutcome::Granted,
                Err(_) => WaitOutcome::Abandoned,
            },
        }
    }

    /// Block for at most `timeout`. `None` means the deadline passed first;
    /// the registration is dropped either way.
    pub fn wait_timeout(mut self, timeout: Duration) -> Option<WaitOutcome> {
        match self.pending.take() {
            None => Some(WaitOutcome::Granted),
            Some(p) => match p.rx.recv_timeout(timeout) {
                Ok(()) => Some(WaitOutcome::Granted),
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => None,
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                    Some(WaitOutcome::Abandoned)
                }
            },
        }
    }

    /// Non-blocking poll. Once this returns `Some`, the waiter is spent.
    pub fn try_wait(&mut self) -> Option<WaitOutcome> {
        let p = match &self.pending {
            None => return Some(WaitOutcome::Granted),
            Some(p) => p,
        };
        let outcome = match p.rx.try_recv() {
            Ok(()) => WaitOutcome::Granted,
            Err(crossbeam_channel::TryRecvError::Empty) => return None,
            Err(crossbeam_channel::TryRecvError::Disconnected) => WaitOutcome::Abandoned,
        };
        self.pending = None;
        Some(outcome)
    }

    /// Drop the registration without it firing.
    pub fn cancel(self) {}
}

impl fmt::Debug for GrantWaiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrantWaiter")
            .field("kind", &self.kind)
            .field("ready", &self.is_ready())
            .finish()
    }
}
