//! HTTP client for the chat backend's REST surface.
//!
//! Request/response collaborator of the socket core: the result of a
//! successful [`send_message`](ApiClient::send_message) is what the
//! application re-publishes on the local event bus, expecting the
//! authoritative echo to arrive later over the socket.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::error::ApiError;
use crate::models::{ApiResponse, AuthSession, Conversation, Credentials, Message, User};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    /// Bearer token attached to every request once present. Login and
    /// register store it; logout clears it regardless of the response.
    token: RwLock<Option<String>>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.into(),
            http,
            token: RwLock::new(None),
        })
    }

    pub fn set_token(&self, token: Option<String>) {
        *self
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<AuthSession, ApiError> {
        let session: AuthSession = self
            .send(self.request(Method::POST, "/login").json(credentials))
            .await?;
        self.set_token(Some(session.token.clone()));
        Ok(session)
    }

    pub async fn register(&self, credentials: &Credentials) -> Result<AuthSession, ApiError> {
        let session: AuthSession = self
            .send(self.request(Method::POST, "/register").json(credentials))
            .await?;
        self.set_token(Some(session.token.clone()));
        Ok(session)
    }

    pub async fn me(&self) -> Result<User, ApiError> {
        self.send(self.request(Method::GET, "/me")).await
    }

    pub async fn users(&self) -> Result<Vec<User>, ApiError> {
        self.send(self.request(Method::GET, "/users")).await
    }

    /// Best-effort server-side logout; the local token is cleared even
    /// when the request fails.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let result = self
            .request(Method::POST, "/logout")
            .send()
            .await
            .and_then(|response| response.error_for_status());
        self.set_token(None);
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                debug!(error = %e, "logout request failed");
                Err(e.into())
            }
        }
    }

    pub async fn conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        self.send(self.request(Method::GET, "/conversations")).await
    }

    pub async fn create_conversation_for(&self, user_id: u64) -> Result<Conversation, ApiError> {
        self.send(
            self.request(Method::POST, "/conversations")
                .json(&json!({ "user_id": user_id })),
        )
        .await
    }

    /// Look up the existing direct conversation with `user_id`.
    pub async fn conversation_for(&self, user_id: u64) -> Result<Conversation, ApiError> {
        self.send(self.request(Method::GET, &format!("/conversations/user/{user_id}")))
            .await
    }

    pub async fn messages(&self, conversation_id: u64) -> Result<Vec<Message>, ApiError> {
        self.send(self.request(
            Method::GET,
            &format!("/conversations/{conversation_id}/messages"),
        ))
        .await
    }

    /// Post a message; `session_id` is the socket connect id, used by
    /// the server to skip echoing the message back to the sender's own
    /// connection.
    pub async fn send_message(
        &self,
        conversation_id: u64,
        content: &str,
        session_id: Option<&str>,
    ) -> Result<Message, ApiError> {
        self.send(
            self.request(
                Method::POST,
                &format!("/conversations/{conversation_id}/messages"),
            )
            .json(&json!({ "content": content, "session_id": session_id })),
        )
        .await
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = self.token() {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = builder.send().await?;
        let wrapper: ApiResponse<T> = response.json().await?;
        wrapper.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_attached_after_set() {
        let client = ApiClient::new("http://localhost/api/v1").unwrap();
        assert!(client.token().is_none());
        client.set_token(Some("abc".to_string()));
        assert_eq!(client.token().as_deref(), Some("abc"));
        client.set_token(None);
        assert!(client.token().is_none());
    }
}
