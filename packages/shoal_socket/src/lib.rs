//! Real-time transport core for the Shoal chat client.
//!
//! Three pieces, composed rather than inherited:
//! - [`ListenerRegistry`]: event-name → ordered-callbacks mapping with
//!   synchronous fan-out, the shared subscribe/unsubscribe/publish
//!   abstraction.
//! - [`Socket`]: connection manager owning one WebSocket at a time,
//!   translating transport lifecycle into named events through its own
//!   registry and keeping the link alive with a traffic-reset heartbeat.
//! - [`EventBus`]: a standalone, transport-less registry instance with
//!   the same `on`/`off`/`emit` surface as `Socket`, for optimistic
//!   local echo before server confirmation.
//!
//! Construct the socket and bus once at application start and pass
//! references down; nothing here is a module-level singleton.

pub mod bus;
pub mod envelope;
pub mod error;
pub mod listener;
pub mod socket;

pub use bus::EventBus;
pub use envelope::Envelope;
pub use error::SocketError;
pub use listener::{Callback, FanoutPolicy, ListenerRegistry, Subscription};
pub use socket::{ConnectionState, DEFAULT_KEEP_CONNECT_INTERVAL, Socket, event};
