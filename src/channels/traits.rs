//! Channel Trait Definitions
//!
//! The transport surface the bot needs: fetch new messages, reply, delete
//! recent messages and enumerate members.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Error types for channel operations
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u64),

    #[error("Missing privileges: {0}")]
    Forbidden(String),

    #[error("Not supported: {0}")]
    Unsupported(String),

    #[error("Channel not ready")]
    NotReady,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// A member known to the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    /// Display name
    pub name: String,
}

impl Member {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    /// Chat mention markup for this member
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

/// Inbound text message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Platform message id
    pub id: String,

    /// Channel the message was posted in
    pub channel_id: String,

    pub author: Member,

    /// Message text
    pub content: String,

    /// Unix timestamp
    pub timestamp: i64,
}

impl ChannelMessage {
    /// Create a simple text message
    pub fn text(channel_id: &str, author: Member, content: &str) -> Self {
        Self {
            id: String::new(),
            channel_id: channel_id.to_string(),
            author,
            content: content.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Channel trait - implement for each platform
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel name identifier
    fn name(&self) -> &str;

    /// Is the channel connected and ready?
    fn is_ready(&self) -> bool;

    /// Connect and return the bot's own account
    async fn connect(&self) -> Result<Member, ChannelError>;

    /// Messages posted since the previous poll, oldest first
    async fn poll(&self) -> Result<Vec<ChannelMessage>, ChannelError>;

    /// Send a text reply, returning the new message id
    async fn send_text(&self, channel_id: &str, text: &str) -> Result<String, ChannelError>;

    /// Delete up to `count` of the most recent messages, returning how many went
    async fn delete_recent(&self, channel_id: &str, count: usize) -> Result<usize, ChannelError>;

    /// Every member the bot can see
    async fn members(&self) -> Result<Vec<Member>, ChannelError>;
}
