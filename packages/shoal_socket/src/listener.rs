//! Event-name → ordered-callbacks registry with synchronous fan-out.
//!
//! Backs both the socket's server-push delivery and the purely local
//! [`EventBus`](crate::EventBus). Subscriptions are ordered by
//! registration time; `publish` invokes the callbacks registered at the
//! moment it starts, so a callback may unsubscribe itself (or a sibling)
//! without skipping or double-invoking unrelated entries.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tracing::error;

/// Subscriber callback, invoked with `(payload, event)`.
///
/// Identity matters: unsubscribing compares `Arc` pointers, so the same
/// callback value registered twice counts as two subscriptions.
pub type Callback = Arc<dyn Fn(&Value, &str) + Send + Sync + 'static>;

/// What a panicking callback does to the rest of a fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanoutPolicy {
    /// Catch and log per callback, continue fan-out. Used for the
    /// transport-bound registry: one broken subscriber must not prevent
    /// delivery of a server push to the others.
    Isolate,
    /// Let the first panic unwind into the caller, aborting the rest of
    /// the fan-out. Used for the local bus, which runs synchronously in
    /// the publishing caller's context.
    Propagate,
}

type ListenerMap = HashMap<String, Vec<Callback>>;

/// Ordered pub/sub registry over event names.
#[derive(Clone)]
pub struct ListenerRegistry {
    inner: Arc<Mutex<ListenerMap>>,
    policy: FanoutPolicy,
}

impl ListenerRegistry {
    pub fn new(policy: FanoutPolicy) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            policy,
        }
    }

    /// Append `callback` to the list for `event`, creating the list if
    /// absent. Never fails. The returned handle removes exactly this
    /// subscription; dropping it leaves the subscription active.
    pub fn subscribe(&self, event: &str, callback: Callback) -> Subscription {
        let mut map = lock(&self.inner);
        map.entry(event.to_string())
            .or_default()
            .push(callback.clone());
        Subscription {
            inner: Arc::clone(&self.inner),
            event: event.to_string(),
            callback,
        }
    }

    /// Remove the first stored entry whose callback is the same `Arc` as
    /// `callback`, if any. No-op if absent, so registering the same
    /// callback twice and removing once leaves one subscription active.
    pub fn unsubscribe(&self, event: &str, callback: &Callback) {
        remove_first(&self.inner, event, callback);
    }

    /// Snapshot of the current callbacks for `event`, in registration
    /// order; empty if never subscribed. Later mutations are not
    /// reflected in the returned vector.
    pub fn callbacks(&self, event: &str) -> Vec<Callback> {
        lock(&self.inner).get(event).cloned().unwrap_or_default()
    }

    /// Invoke every currently-registered callback for `event`, in
    /// registration order, with `(payload, event)`. Runs to completion
    /// synchronously over a snapshot taken up front; the registry lock is
    /// not held while callbacks run.
    pub fn publish(&self, event: &str, payload: &Value) {
        for callback in self.callbacks(event) {
            match self.policy {
                FanoutPolicy::Propagate => callback(payload, event),
                FanoutPolicy::Isolate => {
                    let hook = AssertUnwindSafe(|| callback(payload, event));
                    if std::panic::catch_unwind(hook).is_err() {
                        error!(event, "listener callback panicked during fan-out");
                    }
                }
            }
        }
    }
}

/// Removal capability for one subscription.
///
/// Calling [`remove`](Subscription::remove) twice is a no-op the second
/// time: the entry is already gone and removal of an absent entry does
/// nothing.
pub struct Subscription {
    inner: Arc<Mutex<ListenerMap>>,
    event: String,
    callback: Callback,
}

impl Subscription {
    /// Unsubscribe the entry this handle was issued for.
    pub fn remove(&self) {
        remove_first(&self.inner, &self.event, &self.callback);
    }
}

fn remove_first(inner: &Arc<Mutex<ListenerMap>>, event: &str, callback: &Callback) {
    let mut map = lock(inner);
    if let Some(list) = map.get_mut(event)
        && let Some(index) = list.iter().position(|cb| Arc::ptr_eq(cb, callback))
    {
        list.remove(index);
    }
}

/// Callbacks never run under the lock, so poisoning can only come from a
/// panic inside this module; recover the data rather than cascading.
fn lock(inner: &Arc<Mutex<ListenerMap>>) -> std::sync::MutexGuard<'_, ListenerMap> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}
