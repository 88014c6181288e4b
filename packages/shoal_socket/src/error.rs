//! Socket error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SocketError {
    /// `emit` was called with no live, open transport. Nothing was sent
    /// and nothing is queued for later delivery.
    #[error("socket is not connected")]
    NotConnected,

    /// The WebSocket handshake to the configured URL failed.
    #[error("websocket connect failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),

    /// The outbound envelope could not be serialized to JSON.
    #[error("failed to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_connected_display() {
        assert_eq!(
            SocketError::NotConnected.to_string(),
            "socket is not connected"
        );
    }

    #[test]
    fn encode_wraps_serde_error() {
        let serde_err = serde_json::from_str::<serde_json::Value>("").unwrap_err();
        let err = SocketError::from(serde_err);
        assert!(err.to_string().starts_with("failed to encode envelope"));
    }
}
