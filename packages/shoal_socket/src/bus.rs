//! In-process event bus with no transport attached.
//!
//! Exposes the same `on`/`off`/`emit` surface as [`Socket`](crate::Socket)
//! so application code can subscribe to "a message arrived remotely" and
//! "a message was just sent locally" through one shape. Used for
//! optimistic local echo: the sender of a new message notifies
//! UI-adjacent listeners immediately, independent of the authoritative
//! server echo arriving over the socket.
//!
//! `emit` is purely synchronous local fan-out in the caller's context,
//! with the Propagate policy: a panicking subscriber unwinds into the
//! emitter, which may want to observe the failure.

use serde_json::Value;

use crate::listener::{Callback, FanoutPolicy, ListenerRegistry, Subscription};

/// Transport-less instance of the subscribe/publish abstraction.
#[derive(Clone)]
pub struct EventBus {
    listener: ListenerRegistry,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listener: ListenerRegistry::new(FanoutPolicy::Propagate),
        }
    }

    /// Subscribe `callback` to `event`.
    pub fn on(&self, event: &str, callback: Callback) -> Subscription {
        self.listener.subscribe(event, callback)
    }

    /// Unsubscribe the first matching registration of `callback`.
    pub fn off(&self, event: &str, callback: &Callback) {
        self.listener.unsubscribe(event, callback);
    }

    /// Broadcast `payload` to every subscriber of `event`, synchronously,
    /// in registration order. Takes the payload by value like
    /// [`Socket::emit`](crate::Socket::emit), so call sites stay
    /// interchangeable between the two sources.
    pub fn emit(&self, event: &str, payload: Value) {
        self.listener.publish(event, &payload);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[test]
    fn emit_fans_out_synchronously() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = seen.clone();
        bus.on(
            "message",
            Arc::new(move |payload, event| {
                seen_cb
                    .lock()
                    .unwrap()
                    .push((event.to_string(), payload.clone()));
            }),
        );

        bus.emit("message", json!({"content": "hi"}));

        // Synchronous: visible immediately after emit returns.
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "message");
        assert_eq!(seen[0].1["content"], "hi");
    }

    #[test]
    fn handle_remove_stops_delivery() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));
        let count_cb = count.clone();
        let handle = bus.on(
            "message",
            Arc::new(move |_, _| *count_cb.lock().unwrap() += 1),
        );

        bus.emit("message", Value::Null);
        handle.remove();
        bus.emit("message", Value::Null);

        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn off_removes_by_identity() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));
        let count_cb = count.clone();
        let cb: Callback = Arc::new(move |_, _| *count_cb.lock().unwrap() += 1);
        bus.on("message", cb.clone());

        bus.off("message", &cb);
        bus.emit("message", Value::Null);

        assert_eq!(*count.lock().unwrap(), 0);
    }

    #[test]
    fn emit_without_subscribers_is_noop() {
        let bus = EventBus::new();
        bus.emit("nobody_home", json!(42));
    }
}
