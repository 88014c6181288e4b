//! REST client for the Shoal chat backend.
//!
//! Covers the request/response side of the application: auth, user and
//! conversation listings, message history, and sends. Real-time delivery
//! is the `shoal_socket` crate's job; this crate only produces the
//! values the application feeds into it.

pub mod client;
pub mod error;
pub mod models;

pub use client::ApiClient;
pub use error::ApiError;
pub use models::{ApiResponse, AuthSession, Conversation, Credentials, Message, User};
