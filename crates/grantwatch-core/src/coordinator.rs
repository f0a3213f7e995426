//! Owns the four capabilities and folds them into one readiness value
//!
//! The coordinator holds no timer of its own. It subscribes to each
//! capability's change signal and recomputes [`AggregateState`] whenever one
//! fires.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, ReentrantMutex};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::builtin;
use crate::capability::{Capability, CapabilitySnapshot, CapabilitySpec};
use crate::config::Hooks;
use crate::kind::{AggregateState, CapabilityKind};
use crate::observer::{ObserverList, Subscription};

/// Serializable view of the whole set.
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorSnapshot {
    pub state: AggregateState,
    pub capabilities: Vec<CapabilitySnapshot>,
    pub taken_at: DateTime<Utc>,
}

struct Shared {
    capabilities: [Arc<Capability>; 4],
    state: Mutex<AggregateState>,
    /// Keeps recompute + notify ordered across monitor threads.
    gate: ReentrantMutex<()>,
    observers: ObserverList<AggregateState>,
}

impl Shared {
    fn fold(&self) -> AggregateState {
        AggregateState::fold(
            self.capabilities
                .iter()
                .map(|c| (c.is_required(), c.is_granted())),
        )
    }

    fn recompute(&self) {
        let _gate = self.gate.lock();
        let next = self.fold();
        let prev = {
            let mut state = self.state.lock();
            std::mem::replace(&mut *state, next)
        };
        if prev != next {
            tracing::info!(from = %prev, to = %next, "permissions state changed");
            self.observers.emit(next);
        }
    }
}

pub struct Coordinator {
    shared: Arc<Shared>,
    _links: Vec<Subscription>,
}

impl Coordinator {
    /// Built-in capabilities for the current platform.
    pub fn new(hooks: Hooks) -> Self {
        Self::from_specs(builtin::all(), hooks)
    }

    /// Four capabilities in the given order. Each starts monitoring at once.
    pub fn from_specs(specs: [CapabilitySpec; 4], hooks: Hooks) -> Self {
        let capabilities = specs.map(|spec| Capability::new(spec, hooks.clone()));
        let initial = AggregateState::fold(
            capabilities
                .iter()
                .map(|c| (c.is_required(), c.is_granted())),
        );
        let shared = Arc::new(Shared {
            capabilities,
            state: Mutex::new(initial),
            gate: ReentrantMutex::new(()),
            observers: ObserverList::new(),
        });

        let links = shared
            .capabilities
            .iter()
            .map(|cap| {
                let weak: Weak<Shared> = Arc::downgrade(&shared);
                cap.subscribe(move |_| {
                    if let Some(shared) = weak.upgrade() {
                        shared.recompute();
                    }
                })
            })
            .collect();

        // a first tick may have landed before the links were in place
        shared.recompute();
        tracing::debug!(state = %shared.state.lock(), "coordinator ready");

        Self {
            shared,
            _links: links,
        }
    }

    /// Every capability, in fixed order.
    pub fn all_capabilities(&self) -> &[Arc<Capability>] {
        &self.shared.capabilities
    }

    pub fn required_capabilities(&self) -> Vec<&Arc<Capability>> {
        self.shared
            .capabilities
            .iter()
            .filter(|c| c.is_required())
            .collect()
    }

    pub fn capability(&self, kind: CapabilityKind) -> Option<&Arc<Capability>> {
        self.shared.capabilities.iter().find(|c| c.kind() == kind)
    }

    pub fn aggregate_state(&self) -> AggregateState {
        *self.shared.state.lock()
    }

    /// Required capabilities that are not granted right now.
    pub fn missing_required(&self) -> Vec<CapabilityKind> {
        self.shared
            .capabilities
            .iter()
            .filter(|c| c.is_required() && !c.is_granted())
            .map(|c| c.kind())
            .collect()
    }

    /// Observe aggregate transitions. Fires only when the value changes.
    /// The callback must not refresh capabilities synchronously from a
    /// monitor thread.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(AggregateState) + Send + Sync + 'static,
    {
        self.shared.observers.add(observer)
    }

    /// Refresh each capability in order, then recompute once.
    pub fn refresh_all(&self) {
        for cap in &self.shared.capabilities {
            cap.refresh();
        }
        self.shared.recompute();
    }

    pub fn stop_all(&self) {
        tracing::info!("stopping all permission checks");
        for cap in &self.shared.capabilities {
            cap.stop_monitoring();
        }
    }

    pub fn start_all(&self) {
        for cap in &self.shared.capabilities {
            cap.start_monitoring();
        }
    }

    pub fn snapshot(&self) -> CoordinatorSnapshot {
        CoordinatorSnapshot {
            state: self.aggregate_state(),
            capabilities: self
                .shared
                .capabilities
                .iter()
                .map(|c| c.snapshot())
                .collect(),
            taken_at: Utc::now(),
        }
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new(Hooks::default())
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("state", &self.aggregate_state())
            .field("capabilities", &self.shared.capabilities)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::WaitOutcome;
    use crate::config::MonitorConfig;
    use crate::reactivation::Reactivation;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    /// Four injectable predicates in coordinator order.
    struct Flags([Arc<AtomicBool>; 4]);

    impl Flags {
        fn new(initial: [bool; 4]) -> Self {
            Self(initial.map(|v| Arc::new(AtomicBool::new(v))))
        }

        fn set(&self, kind: CapabilityKind, v: bool) {
            let idx = CapabilityKind::ALL.iter().position(|k| *k == kind).unwrap();
            self.0[idx].store(v, Ordering::SeqCst);
        }

        fn set_required(&self, v: bool) {
            for kind in CapabilityKind::ALL {
                if kind != CapabilityKind::ScreenRecording {
                    self.set(kind, v);
                }
            }
        }

        fn specs(&self) -> [CapabilitySpec; 4] {
            let mut i = 0;
            CapabilityKind::ALL.map(|kind| {
                let flag = self.0[i].clone();
                i += 1;
                CapabilitySpec::new(kind, move || flag.load(Ordering::SeqCst), || {})
                    .required(kind != CapabilityKind::ScreenRecording)
            })
        }

        fn coordinator(&self, interval: Duration) -> Coordinator {
            let hooks = Hooks::new(MonitorConfig::default().poll_interval(interval))
                .with_open_url(|_| {});
            Coordinator::from_specs(self.specs(), hooks)
        }

        fn quiet(&self) -> Coordinator {
            self.coordinator(Duration::from_secs(3600))
        }
    }

    #[test]
    fn scenario_a_missing_to_required_to_all() {
        let flags = Flags::new([false; 4]);
        let coord = flags.quiet();
        assert_eq!(coord.aggregate_state(), AggregateState::Missing);

        flags.set_required(true);
        coord.refresh_all();
        assert_eq!(coord.aggregate_state(), AggregateState::HasRequired);

        flags.set(CapabilityKind::ScreenRecording, true);
        coord.refresh_all();
        assert_eq!(coord.aggregate_state(), AggregateState::HasAll);
        coord.stop_all();
    }

    #[test]
    fn scenario_b_stop_all_freezes_everything() {
        let flags = Flags::new([true, true, true, false]);
        let coord = flags.coordinator(Duration::from_millis(5));
        coord.refresh_all();
        let before: Vec<bool> = coord.all_capabilities().iter().map(|c| c.is_granted()).collect();
        let state = coord.aggregate_state();
        assert_eq!(state, AggregateState::HasRequired);

        coord.stop_all();
        flags.set_required(false);
        flags.set(CapabilityKind::ScreenRecording, true);
        thread::sleep(Duration::from_millis(60));

        let after: Vec<bool> = coord.all_capabilities().iter().map(|c| c.is_granted()).collect();
        assert_eq!(before, after);
        assert_eq!(coord.aggregate_state(), state);
        assert!(coord.all_capabilities().iter().all(|c| !c.is_monitoring()));
    }

    #[test]
    fn scenario_c_await_granted_is_immediate() {
        let flags = Flags::new([true; 4]);
        let coord = flags.quiet();
        coord.stop_all();
        let cap = coord.capability(CapabilityKind::Accessibility).unwrap();
        let observers = cap.observer_count();

        let waiter = cap.await_granted();
        assert!(waiter.is_ready());
        assert_eq!(cap.observer_count(), observers);
        assert_eq!(cap.waiter_count(), 0);
        assert_eq!(waiter.wait(), WaitOutcome::Granted);
    }

    #[test]
    fn single_capability_change_recomputes() {
        let flags = Flags::new([true, true, true, true]);
        let coord = flags.quiet();
        assert_eq!(coord.aggregate_state(), AggregateState::HasAll);

        flags.set(CapabilityKind::PostEvents, false);
        coord.capability(CapabilityKind::PostEvents).unwrap().refresh();
        assert_eq!(coord.aggregate_state(), AggregateState::Missing);
        assert_eq!(coord.missing_required(), vec![CapabilityKind::PostEvents]);
        coord.stop_all();
    }

    #[test]
    fn optional_alone_does_not_make_ready() {
        let flags = Flags::new([false, false, false, true]);
        let coord = flags.quiet();
        assert_eq!(coord.aggregate_state(), AggregateState::Missing);
        coord.stop_all();
    }

    #[test]
    fn aggregate_observers_see_transitions_once() {
        let flags = Flags::new([false; 4]);
        let coord = flags.quiet();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sub = {
            let seen = seen.clone();
            coord.subscribe(move |s| seen.lock().push(s))
        };

        coord.refresh_all();
        flags.set_required(true);
        coord.refresh_all();
        coord.refresh_all();
        flags.set(CapabilityKind::ScreenRecording, true);
        coord.refresh_all();

        assert_eq!(
            *seen.lock(),
            vec![AggregateState::HasRequired, AggregateState::HasAll]
        );
        drop(sub);
        coord.stop_all();
    }

    #[test]
    fn monitoring_drives_aggregate() {
        let flags = Flags::new([false; 4]);
        let coord = flags.coordinator(Duration::from_millis(10));
        flags.set_required(true);
        flags.set(CapabilityKind::ScreenRecording, true);

        let mut reached = false;
        for _ in 0..200 {
            if coord.aggregate_state() == AggregateState::HasAll {
                reached = true;
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(reached);
        coord.stop_all();
    }

    #[test]
    fn stop_all_waits_for_in_flight_recompute() {
        let flags = Flags::new([true, true, false, true]);
        let hub = Reactivation::new();
        let hooks = Hooks::new(MonitorConfig::default().poll_interval(Duration::from_secs(3600)))
            .with_open_url(|_| {})
            .with_reactivation(hub.clone());
        let coord = Coordinator::from_specs(flags.specs(), hooks);
        assert_eq!(coord.aggregate_state(), AggregateState::Missing);

        let (entered_tx, entered_rx) = crossbeam_channel::bounded(1);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sub = {
            let seen = seen.clone();
            coord.subscribe(move |s| {
                let _ = entered_tx.try_send(());
                thread::sleep(Duration::from_millis(50));
                seen.lock().push(s);
            })
        };
        flags.set(CapabilityKind::InputMonitoring, true);
        hub.notify();
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        coord.stop_all();
        assert_eq!(*seen.lock(), vec![AggregateState::HasAll]);
        assert_eq!(coord.aggregate_state(), AggregateState::HasAll);
        drop(sub);
    }

    #[test]
    fn lists_and_lookup() {
        let flags = Flags::new([false; 4]);
        let coord = flags.quiet();
        let kinds: Vec<CapabilityKind> = coord.all_capabilities().iter().map(|c| c.kind()).collect();
        assert_eq!(kinds, CapabilityKind::ALL.to_vec());
        assert_eq!(coord.required_capabilities().len(), 3);
        assert!(coord
            .required_capabilities()
            .iter()
            .all(|c| c.kind() != CapabilityKind::ScreenRecording));
        assert_eq!(
            coord.capability(CapabilityKind::InputMonitoring).unwrap().kind(),
            CapabilityKind::InputMonitoring
        );
        coord.stop_all();
    }

    #[test]
    fn start_all_rearms() {
        let flags = Flags::new([false; 4]);
        let coord = flags.coordinator(Duration::from_millis(5));
        coord.stop_all();
        flags.set_required(true);
        coord.start_all();
        assert!(coord.all_capabilities().iter().all(|c| c.is_monitoring()));

        let mut reached = false;
        for _ in 0..200 {
            if coord.aggregate_state() == AggregateState::HasRequired {
                reached = true;
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(reached);
        coord.stop_all();
    }

    #[test]
    fn snapshot_serializes() {
        let flags = Flags::new([true, true, true, false]);
        let coord = flags.quiet();
        let json = serde_json::to_value(coord.snapshot()).unwrap();
        assert_eq!(json["state"], "has_required");
        assert_eq!(json["capabilities"].as_array().unwrap().len(), 4);
        assert_eq!(json["capabilities"][3]["kind"], "screen_recording");
        assert_eq!(json["capabilities"][3]["granted"], false);
        coord.stop_all();
    }
}
