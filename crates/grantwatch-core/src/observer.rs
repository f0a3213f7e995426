//! Explicit observer registration
//!
//! Callbacks are invoked synchronously, in registration order, on whichever
//! thread performed the change. The list is never locked while a callback
//! runs, so a callback may subscribe, unsubscribe or trigger a refresh.

use parking_lot::Mutex;
use std::sync::{Arc, Weak};

type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

struct Entries<T> {
    next_id: u64,
    list: Vec<(u64, Callback<T>)>,
}

pub struct ObserverList<T> {
    entries: Arc<Mutex<Entries<T>>>,
}

impl<T: Copy + Send + 'static> ObserverList<T> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Entries {
                next_id: 0,
                list: Vec::new(),
            })),
        }
    }

    pub fn add<F>(&self, callback: F) -> Subscription
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let id = {
            let mut entries = self.entries.lock();
            let id = entries.next_id;
            entries.next_id += 1;
            entries.list.push((id, Arc::new(callback)));
            id
        };
        let weak: Weak<Mutex<Entries<T>>> = Arc::downgrade(&self.entries);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(entries) = weak.upgrade() {
                    entries.lock().list.retain(|(i, _)| *i != id);
                }
            })),
        }
    }

    pub fn emit(&self, value: T) {
        let callbacks: Vec<Callback<T>> = self
            .entries
            .lock()
            .list
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for cb in callbacks {
            cb(value);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Copy + Send + 'static> Default for ObserverList<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Registration handle. Dropping it deregisters the observer.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Deregister now.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Keep the observer registered for as long as the source lives.
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
