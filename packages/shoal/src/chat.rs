//! Interactive chat session: socket + local bus + REST client wired together.
//!
//! Delivery paths for a message in the open conversation:
//! - remote: server push over the socket (`message` event), printed and
//!   fed to the conversation-order tracker.
//! - local: after a successful REST send, the same payload shape is
//!   re-published on the local event bus, so the tracker reacts
//!   immediately without waiting for the authoritative server echo.
//!
//! One callback subscribed to both sources handles the tracker update;
//! the socket and the bus expose the same `on`/`emit` shape on purpose.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, bail};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use shoal_api::{ApiClient, Message};
use shoal_socket::{Callback, EventBus, Socket};

/// Server-pushed chat event (inner envelope event name).
const MESSAGE_EVENT: &str = "message";
/// Server push carrying this connection's session id.
const CONNECT_ID_EVENT: &str = "send_connect_id";
/// Client-to-server event binding the socket to the logged-in user.
const AUTHENTICATE_EVENT: &str = "authenticate";

/// Long-lived collaborators, constructed once in `main` and passed down.
pub struct ChatContext {
    pub api: Arc<ApiClient>,
    pub socket: Arc<Socket>,
    pub bus: Arc<EventBus>,
}

/// Most-recently-active-first conversation ordering, updated from both
/// the socket and the local bus.
#[derive(Default)]
struct ConversationOrder {
    ids: Mutex<Vec<u64>>,
}

impl ConversationOrder {
    fn bump(&self, conversation_id: u64) {
        let mut ids = self.ids.lock().unwrap_or_else(|e| e.into_inner());
        ids.retain(|id| *id != conversation_id);
        ids.insert(0, conversation_id);
    }

    fn snapshot(&self) -> Vec<u64> {
        self.ids.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

fn parse_pushed_message(payload: &Value) -> Option<Message> {
    match serde_json::from_value(payload.get("message")?.clone()) {
        Ok(message) => Some(message),
        Err(e) => {
            warn!(error = %e, "unparseable message push");
            None
        }
    }
}

/// Connect the socket and authenticate it with the REST token.
///
/// Re-authentication on every `connected` mirrors the server contract:
/// the socket connection is anonymous until an `authenticate` frame
/// binds it to a user, after which the server answers with
/// `send_connect_id`.
pub async fn open_socket(ctx: &ChatContext) -> Result<Arc<Mutex<Option<String>>>> {
    let connect_id = Arc::new(Mutex::new(None));

    let socket = Arc::clone(&ctx.socket);
    let api = Arc::clone(&ctx.api);
    ctx.socket.on_connected(Arc::new(move |_, _| {
        let Some(token) = api.token() else {
            warn!("socket connected without a login token");
            return;
        };
        if let Err(e) = socket.emit(AUTHENTICATE_EVENT, json!({ "token": token })) {
            warn!(error = %e, "failed to authenticate socket");
        }
    }));

    let connect_id_slot = Arc::clone(&connect_id);
    ctx.socket.on(
        CONNECT_ID_EVENT,
        Arc::new(move |payload, _| {
            let id = payload
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| payload.to_string());
            debug!(connect_id = %id, "session id assigned");
            *connect_id_slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(id);
        }),
    );

    ctx.socket.connect().await.context("socket connect failed")?;
    Ok(connect_id)
}

/// Run an interactive chat with `peer_username`.
pub async fn run(ctx: &ChatContext, peer_username: &str) -> Result<()> {
    let me = ctx.api.me().await.context("failed to load current user")?;
    let connect_id = open_socket(ctx).await?;

    let peer = ctx
        .api
        .users()
        .await?
        .into_iter()
        .find(|user| user.username == peer_username);
    let Some(peer) = peer else {
        bail!("no such user: {peer_username}");
    };

    let conversation = match ctx.api.conversation_for(peer.id).await {
        Ok(conversation) => conversation,
        Err(e) => {
            debug!(error = %e, "no existing conversation; creating one");
            ctx.api.create_conversation_for(peer.id).await?
        }
    };
    info!(conversation_id = conversation.id, peer = %peer.username, "conversation opened");

    // History arrives newest-first; print chronologically.
    let mut history = ctx.api.messages(conversation.id).await?;
    history.reverse();
    for message in &history {
        print_message(&me.username, &peer.username, me.id, message);
    }

    // Conversation-order tracking reacts to both delivery paths through
    // one callback with one shape.
    let order = Arc::new(ConversationOrder::default());
    let order_cb: Callback = {
        let order = Arc::clone(&order);
        Arc::new(move |payload, _| {
            if let Some(message) = parse_pushed_message(payload) {
                order.bump(message.conversation_id);
            }
        })
    };
    let _socket_order = ctx.socket.on(MESSAGE_EVENT, order_cb.clone());
    let _bus_order = ctx.bus.on(MESSAGE_EVENT, order_cb);

    // Printing is socket-only: local sends are echoed by the send loop.
    let _printer = {
        let my_name = me.username.clone();
        let peer_name = peer.username.clone();
        let my_id = me.id;
        let conversation_id = conversation.id;
        ctx.socket.on(
            MESSAGE_EVENT,
            Arc::new(move |payload, _| {
                let Some(message) = parse_pushed_message(payload) else {
                    return;
                };
                if message.conversation_id == conversation_id && message.sender_id != my_id {
                    print_message(&my_name, &peer_name, my_id, &message);
                }
            }),
        )
    };

    println!("chatting with {} -- /quit to leave", peer.username);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let content = line.trim();
        if content.is_empty() {
            continue;
        }
        if content == "/quit" {
            break;
        }

        let session_id = connect_id
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match ctx
            .api
            .send_message(conversation.id, content, session_id.as_deref())
            .await
        {
            Ok(message) => {
                print_message(&me.username, &peer.username, me.id, &message);
                // Optimistic local echo for everything watching the bus.
                match serde_json::to_value(&message) {
                    Ok(value) => ctx.bus.emit(MESSAGE_EVENT, json!({ "message": value })),
                    Err(e) => debug!(error = %e, "failed to encode local echo"),
                }
            }
            Err(e) => warn!(error = %e, "send failed"),
        }
    }

    // Sends counted here too, through the bus echo: both delivery paths
    // feed the same tracker.
    let recent = order.snapshot();
    if !recent.is_empty() {
        let ids = recent
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        println!("conversations with activity, most recent first: {ids}");
    }

    ctx.socket.disconnect();
    Ok(())
}

fn print_message(my_name: &str, peer_name: &str, my_id: u64, message: &Message) {
    let who = if message.sender_id == my_id {
        my_name
    } else {
        peer_name
    };
    println!("{}: {}", who, message.content);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_order_bumps_to_front() {
        let order = ConversationOrder::default();
        order.bump(1);
        order.bump(2);
        order.bump(1);
        assert_eq!(order.snapshot(), vec![1, 2]);
    }

    #[test]
    fn pushed_message_feeds_conversation_order() {
        let order = ConversationOrder::default();
        let payload = json!({
            "message": {
                "id": 3,
                "conversation_id": 5,
                "sender_id": 2,
                "content": "hi",
                "message_type": "text",
                "created_at": "2024-03-01T10:00:00Z",
                "updated_at": "2024-03-01T10:00:00Z"
            }
        });
        if let Some(message) = parse_pushed_message(&payload) {
            order.bump(message.conversation_id);
        }
        assert_eq!(order.snapshot(), vec![5]);
    }

    #[test]
    fn pushed_message_parses_inner_payload() {
        let payload = json!({
            "message": {
                "id": 3,
                "conversation_id": 9,
                "sender_id": 2,
                "content": "hi",
                "message_type": "text",
                "created_at": "2024-03-01T10:00:00Z",
                "updated_at": "2024-03-01T10:00:00Z"
            }
        });
        let message = parse_pushed_message(&payload).unwrap();
        assert_eq!(message.conversation_id, 9);
        assert_eq!(message.content, "hi");
    }

    #[test]
    fn pushed_message_without_inner_field_is_none() {
        assert!(parse_pushed_message(&json!({"other": 1})).is_none());
        assert!(parse_pushed_message(&Value::Null).is_none());
    }
}
