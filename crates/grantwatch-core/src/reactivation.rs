//! Reactivation events - "the host app came back to the foreground"
//!
//! Every monitor loop merges a receiver from this hub into its tick stream so
//! a user returning from System Settings sees the new state without waiting
//! for the next timer tick.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Clonable broadcast hub. Clones share the subscriber list.
#[derive(Clone, Default)]
pub struct Reactivation {
    subscribers: Arc<Mutex<Subscribers>>,
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    entries: Vec<(u64, Sender<()>)>,
}

impl Reactivation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new listener and return its id for [`unsubscribe`](Self::unsubscribe).
    /// Each receiver holds at most one pending event; bursts collapse into a
    /// single tick.
    pub fn subscribe(&self) -> (u64, Receiver<()>) {
        let (tx, rx) = bounded(1);
        let mut subs = self.subscribers.lock();
        let id = subs.next_id;
        subs.next_id += 1;
        subs.entries.push((id, tx));
        (id, rx)
    }

    /// Remove a listener. Its receiver disconnects. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: u64) {
        self.subscribers.lock().entries.retain(|(i, _)| *i != id);
    }

    /// Deliver one event to every live listener, pruning dropped ones.
    pub fn notify(&self) {
        let mut subs = self.subscribers.lock();
        subs.entries
            .retain(|(_, tx)| !matches!(tx.try_send(()), Err(TrySendError::Disconnected(_))));
        tracing::debug!(listeners = subs.entries.len(), "reactivation");
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().entries.len()
    }
}

impl fmt::Debug for Reactivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactivation")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Rising-edge detector over sampled "is the app active" values.
#[derive(Debug, Clone, Copy)]
pub struct ActivationEdge {
    active: bool,
}

impl ActivationEdge {
    pub fn new(active: bool) -> Self {
        Self { active }
    }

    /// Record a sample; true on an inactive to active transition.
    pub fn observe(&mut self, active: bool) -> bool {
        let rose = active && !self.active;
        self.active = active;
        rose
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_fires_on_rise_only() {
        let mut edge = ActivationEdge::new(true);
        let fired: Vec<bool> = [true, false, false, true, true, false, true]
            .into_iter()
            .map(|a| edge.observe(a))
            .collect();
        assert_eq!(fired, vec![false, false, false, true, false, false, true]);
    }

    #[test]
    fn fans_out_to_all() {
        let hub = Reactivation::new();
        let (_, a) = hub.subscribe();
        let (_, b) = hub.subscribe();
        hub.notify();
        assert!(a.try_recv().is_ok());
        assert!(b.try_recv().is_ok());
    }

    #[test]
    fn bursts_collapse() {
        let hub = Reactivation::new();
        let (_, rx) = hub.subscribe();
        hub.notify();
        hub.notify();
        hub.notify();
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn prunes_dropped_receivers() {
        let hub = Reactivation::new();
        let (_, keep) = hub.subscribe();
        drop(hub.subscribe());
        assert_eq!(hub.subscriber_count(), 2);
        hub.notify();
        assert_eq!(hub.subscriber_count(), 1);
        assert!(keep.try_recv().is_ok());
    }

    #[test]
    fn clones_share_subscribers() {
        let hub = Reactivation::new();
        let (_, rx) = hub.subscribe();
        hub.clone().notify();
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn unsubscribe_removes_only_that_listener() {
        let hub = Reactivation::new();
        let (first, gone) = hub.subscribe();
        let (_, kept) = hub.subscribe();
        hub.unsubscribe(first);
        hub.unsubscribe(first);
        assert_eq!(hub.subscriber_count(), 1);
        assert!(gone.recv().is_err());
        hub.notify();
        assert!(kept.try_recv().is_ok());
    }
}
