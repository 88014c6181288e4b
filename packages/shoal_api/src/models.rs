//! API models mirroring the backend's JSON shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Standard response wrapper: `{code, message, data}` with `code == 200`
/// meaning success regardless of the HTTP status line.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default = "none")]
    pub data: Option<T>,
}

fn none<T>() -> Option<T> {
    None
}

impl<T> ApiResponse<T> {
    pub fn ok(&self) -> bool {
        self.code == 200
    }

    /// Unwrap the payload or convert the wrapper into an [`ApiError`].
    pub fn into_result(self) -> Result<T, ApiError> {
        if self.ok() {
            self.data.ok_or(ApiError::MissingData)
        } else {
            Err(ApiError::Api {
                code: self.code,
                message: self.message,
            })
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub user_ids: Vec<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub conversation_id: u64,
    pub sender_id: u64,
    pub content: String,
    #[serde(default)]
    pub message_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Echoed on server pushes so list views can reorder without a
    /// second fetch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<Conversation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Login/register credentials.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Successful login/register payload.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn response_wrapper_success() {
        let body = json!({"code": 200, "message": "Success", "data": {"token": "abc"}});
        let resp: ApiResponse<AuthSession> = serde_json::from_value(body).unwrap();
        assert!(resp.ok());
        assert_eq!(resp.into_result().unwrap().token, "abc");
    }

    #[test]
    fn response_wrapper_error_code() {
        let body = json!({"code": 401, "message": "Unauthorized", "data": null});
        let resp: ApiResponse<AuthSession> = serde_json::from_value(body).unwrap();
        assert!(!resp.ok());
        match resp.into_result() {
            Err(ApiError::Api { code, message }) => {
                assert_eq!(code, 401);
                assert_eq!(message, "Unauthorized");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn response_success_without_data_is_missing_data() {
        let body = json!({"code": 200, "message": "Success"});
        let resp: ApiResponse<User> = serde_json::from_value(body).unwrap();
        assert!(matches!(resp.into_result(), Err(ApiError::MissingData)));
    }

    #[test]
    fn user_deserializes_backend_shape() {
        let body = json!({
            "id": 7,
            "username": "ayu",
            "created_at": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-01T10:00:00Z"
        });
        let user: User = serde_json::from_value(body).unwrap();
        assert_eq!(user.id, 7);
        assert_eq!(user.username, "ayu");
    }

    #[test]
    fn conversation_type_field_maps_to_kind() {
        let body = json!({
            "id": 1,
            "type": "direct",
            "name": "",
            "user_ids": [1, 2],
            "created_at": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-01T10:00:00Z"
        });
        let conversation: Conversation = serde_json::from_value(body).unwrap();
        assert_eq!(conversation.kind, "direct");
        assert_eq!(conversation.user_ids, vec![1, 2]);
    }

    #[test]
    fn message_optional_fields_default() {
        let body = json!({
            "id": 3,
            "conversation_id": 1,
            "sender_id": 2,
            "content": "hello",
            "message_type": "text",
            "created_at": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-01T10:00:00Z"
        });
        let message: Message = serde_json::from_value(body).unwrap();
        assert!(message.session_id.is_none());
        assert!(message.conversation.is_none());
    }
}
