//! Connection manager: one WebSocket connection, event fan-out, heartbeat.
//!
//! Owns at most one transport connection at a time and translates its
//! lifecycle (opened, frame received, closed, errored) into named events
//! published through an internal [`ListenerRegistry`]. Every inbound
//! frame produces two fan-outs: the generic [`event::MESSAGE`] carrying
//! the whole envelope, and the envelope's own event name carrying the
//! inner payload.
//!
//! Liveness: while open, a `keep_connect` frame is emitted on a fixed
//! interval, and any inbound traffic (not just pongs) resets that
//! interval. No liveness verdict is drawn locally from a quiet or
//! receive-only link, and no automatic reconnection is attempted:
//! `disconnect`/`error` events are informational and resuming requires
//! an external `connect()` call.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::envelope::Envelope;
use crate::error::SocketError;
use crate::listener::{Callback, FanoutPolicy, ListenerRegistry, Subscription};

/// Event names the socket itself publishes (never sent by the peer).
pub mod event {
    /// The connection reached the open state.
    pub const CONNECTED: &str = "connected";
    /// The connection closed; payload carries `{code, reason}` when a
    /// close frame was seen, null otherwise.
    pub const DISCONNECT: &str = "disconnect";
    /// A transport error occurred; payload is the error display string.
    pub const ERROR: &str = "error";
    /// Generic inbound-frame notification carrying the whole envelope,
    /// published for every well-formed frame regardless of its inner
    /// event name.
    pub const MESSAGE: &str = "new_message";
    /// Client-to-server liveness frame; servers tolerate and ignore it.
    pub const KEEP_CONNECT: &str = "keep_connect";
}

/// Default period between `keep_connect` frames on an idle connection.
pub const DEFAULT_KEEP_CONNECT_INTERVAL: Duration = Duration::from_secs(10);

/// Lifecycle of the owned connection.
///
/// Transport errors do not transition this state machine; they clear the
/// open flag and are reported through [`event::ERROR`], with any
/// following stream termination still reaching `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Opening,
    Open,
    Closed,
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum Outbound {
    Frame(Message),
    Close,
}

/// State shared between the socket handle and its connection tasks.
struct Shared {
    state: Mutex<ConnectionState>,
    open: AtomicBool,
    /// Bumped per established connection; tasks compare before touching
    /// shared state so a replaced connection's late callbacks are inert.
    generation: AtomicU64,
    outbound: Mutex<Option<mpsc::UnboundedSender<Outbound>>>,
    cancel: Mutex<Option<CancellationToken>>,
}

impl Shared {
    fn set_state(&self, next: ConnectionState) {
        *lock(&self.state) = next;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// WebSocket client with a pub/sub surface over server-pushed events.
///
/// Construct once at application start and share by reference; all
/// methods take `&self`.
pub struct Socket {
    url: String,
    keep_connect_interval: Duration,
    // Isolate policy: one faulty subscriber must not prevent delivery of
    // a server push to unrelated subscribers.
    listener: ListenerRegistry,
    shared: Arc<Shared>,
}

impl Socket {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            keep_connect_interval: DEFAULT_KEEP_CONNECT_INTERVAL,
            listener: ListenerRegistry::new(FanoutPolicy::Isolate),
            shared: Arc::new(Shared {
                state: Mutex::new(ConnectionState::Idle),
                open: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                outbound: Mutex::new(None),
                cancel: Mutex::new(None),
            }),
        }
    }

    /// Override the heartbeat period (default 10s).
    pub fn with_keep_connect_interval(mut self, interval: Duration) -> Self {
        self.keep_connect_interval = interval;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> ConnectionState {
        *lock(&self.shared.state)
    }

    pub fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::SeqCst)
    }

    /// Open a connection to the configured URL.
    ///
    /// No-op while a connection is already opening or open; an explicit
    /// [`disconnect`](Self::disconnect) is required to force a reopen.
    /// On handshake failure, publishes [`event::ERROR`] and returns the
    /// error. On success, publishes [`event::CONNECTED`] before any
    /// inbound frame is delivered, and starts the heartbeat.
    pub async fn connect(&self) -> Result<(), SocketError> {
        {
            let mut state = lock(&self.shared.state);
            match *state {
                ConnectionState::Opening | ConnectionState::Open => {
                    debug!(url = %self.url, state = ?*state, "connect ignored; already connecting");
                    return Ok(());
                }
                _ => *state = ConnectionState::Opening,
            }
        }

        let ws = match tokio_tungstenite::connect_async(&self.url).await {
            Ok((ws, _response)) => ws,
            Err(e) => {
                self.shared.set_state(ConnectionState::Idle);
                self.listener.publish(event::ERROR, &json!(e.to_string()));
                return Err(e.into());
            }
        };

        // Detach any prior connection's tasks before wiring the new one.
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        if let Some(prev) = lock(&self.shared.cancel).replace(cancel.clone()) {
            prev.cancel();
        }

        let (mut sink, stream) = ws.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();
        *lock(&self.shared.outbound) = Some(tx.clone());

        self.shared.open.store(true, Ordering::SeqCst);
        self.shared.set_state(ConnectionState::Open);
        self.listener
            .publish(event::CONNECTED, &json!({ "url": self.url }));

        let writer_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    out = rx.recv() => match out {
                        Some(Outbound::Frame(frame)) => {
                            if let Err(e) = sink.send(frame).await {
                                debug!(error = %e, "outbound send failed");
                                break;
                            }
                        }
                        Some(Outbound::Close) => {
                            let _ = sink.send(Message::Close(None)).await;
                            break;
                        }
                        None => break,
                    },
                    () = writer_cancel.cancelled() => break,
                }
            }
        });

        let shared = Arc::clone(&self.shared);
        let listener = self.listener.clone();
        let interval = self.keep_connect_interval;
        tokio::spawn(async move {
            run_connection(stream, shared, listener, tx, generation, interval, cancel).await;
        });

        Ok(())
    }

    /// Serialize `{event, payload}` and hand it to the transport.
    ///
    /// Fails synchronously with [`SocketError::NotConnected`] when no
    /// open connection is held; nothing is queued for later delivery.
    pub fn emit(&self, event: &str, payload: Value) -> Result<(), SocketError> {
        if !self.is_open() {
            warn!(event, "emit while socket is not connected");
            return Err(SocketError::NotConnected);
        }
        let text = serde_json::to_string(&Envelope::new(event, payload))?;
        let outbound = lock(&self.shared.outbound);
        match outbound.as_ref() {
            Some(tx) if tx.send(Outbound::Frame(Message::Text(text.into()))).is_ok() => Ok(()),
            _ => {
                warn!(event, "emit while socket is not connected");
                Err(SocketError::NotConnected)
            }
        }
    }

    /// Close the held connection, if any. The close reaction (heartbeat
    /// stop, `Closed` state, one [`event::DISCONNECT`]) fires through the
    /// same path as a remote close.
    pub fn disconnect(&self) {
        let outbound = lock(&self.shared.outbound);
        if let Some(tx) = outbound.as_ref() {
            let _ = tx.send(Outbound::Close);
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

    pub fn on_connected(&self, callback: Callback) -> Subscription {
        self.on(event::CONNECTED, callback)
    }

    pub fn on_disconnected(&self, callback: Callback) -> Subscription {
        self.on(event::DISCONNECT, callback)
    }

    pub fn on_error(&self, callback: Callback) -> Subscription {
        self.on(event::ERROR, callback)
    }
}

/// Reader/heartbeat loop for one established connection.
async fn run_connection(
    mut stream: SplitStream<WsStream>,
    shared: Arc<Shared>,
    listener: ListenerRegistry,
    outbound: mpsc::UnboundedSender<Outbound>,
    generation: u64,
    keep_connect_interval: Duration,
    cancel: CancellationToken,
) {
    let start = tokio::time::Instant::now() + keep_connect_interval;
    let mut heartbeat = tokio::time::interval_at(start, keep_connect_interval);
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut close_details = Value::Null;
    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(message)) => {
                    // Any inbound traffic counts as proof of liveness.
                    heartbeat.reset();
                    match message {
                        Message::Text(text) => deliver(&listener, text.as_str()),
                        Message::Close(frame) => {
                            close_details = frame
                                .map(|f| {
                                    json!({
                                        "code": u16::from(f.code),
                                        "reason": f.reason.as_str(),
                                    })
                                })
                                .unwrap_or(Value::Null);
                            break;
                        }
                        // Ping/pong/binary reset the heartbeat, nothing more.
                        _ => {}
                    }
                }
                Some(Err(e)) => {
                    // Reported alongside whatever happens next; the state
                    // machine is not moved through Closed here, the stream
                    // ending below does that.
                    if shared.generation.load(Ordering::SeqCst) == generation {
                        shared.open.store(false, Ordering::SeqCst);
                    }
                    listener.publish(event::ERROR, &json!(e.to_string()));
                    break;
                }
                None => break,
            },
            _ = heartbeat.tick() => {
                // A timer racing a teardown is harmless: the frame is
                // dropped once the writer is gone.
                if shared.open.load(Ordering::SeqCst) {
                    match serde_json::to_string(&Envelope::new(event::KEEP_CONNECT, Value::Null)) {
                        Ok(text) => {
                            let _ = outbound.send(Outbound::Frame(Message::Text(text.into())));
                        }
                        Err(e) => debug!(error = %e, "failed to encode keep_connect"),
                    }
                }
            }
            () = cancel.cancelled() => {
                // Replaced by a newer connection; detach without touching
                // its state or publishing events.
                return;
            }
        }
    }

    if shared.generation.load(Ordering::SeqCst) != generation {
        return;
    }
    shared.open.store(false, Ordering::SeqCst);
    shared.set_state(ConnectionState::Closed);
    *lock(&shared.outbound) = None;
    listener.publish(event::DISCONNECT, &close_details);
}

/// Decode one text frame and fan it out: generic first, then specific.
fn deliver(listener: &ListenerRegistry, text: &str) {
    let envelope: Envelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "dropping malformed frame");
            return;
        }
    };

    let raw = json!({ "event": envelope.event, "payload": envelope.payload });
    listener.publish(event::MESSAGE, &raw);

    if envelope.event.is_empty() {
        debug!("inbound frame with empty event name");
    } else {
        listener.publish(&envelope.event, &envelope.payload);
    }
}
