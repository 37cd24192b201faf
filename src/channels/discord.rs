//! Discord Channel Implementation
//!
//! Talks to the Discord REST API directly with reqwest. Inbound messages are
//! polled per watched channel; the first poll of a channel only records the
//! newest message id so history is never replayed.
//!
//! # Configuration
//!
//! Environment variables (read by [`crate::config::Config`]):
//! - `DISCORD_BOT_TOKEN`: Discord bot token
//! - `DISCORD_GUILD_ID`: guild used for member lookups
//! - `DISCORD_CHANNELS`: comma-separated channel ids to watch

use super::traits::*;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info};

const API_BASE: &str = "https://discord.com/api/v10";

/// Discord limit for a single bulk delete / message fetch
pub const MAX_FETCH: usize = 100;

/// Permissions requested by the invite link (read, send, manage messages)
const INVITE_PERMISSIONS: u64 = 43008;

/// Discord channel configuration
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    /// Bot token
    pub bot_token: String,
    /// Guild whose members can be targeted
    pub guild_id: Option<String>,
    /// Channels polled for commands
    pub channel_ids: Vec<String>,
    /// Maximum message length (Discord limit: 2000)
    pub max_message_length: usize,
}

impl DiscordConfig {
    pub fn new(bot_token: &str) -> Self {
        Self {
            bot_token: bot_token.to_string(),
            guild_id: None,
            channel_ids: Vec::new(),
            max_message_length: 2000,
        }
    }
}

/// OAuth link for adding the bot to a server
pub fn invite_url(client_id: &str) -> String {
    format!(
        "https://discord.com/oauth2/authorize?client_id={}&scope=bot&permissions={}",
        client_id, INVITE_PERMISSIONS
    )
}

/// Discord channel implementation
pub struct DiscordChannel {
    config: DiscordConfig,
    client: reqwest::Client,
    ready: AtomicBool,
    bot_user: RwLock<Option<Member>>,
    /// Newest seen message id per watched channel
    last_seen: Mutex<HashMap<String, String>>,
}

impl DiscordChannel {
    pub fn new(config: DiscordConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            ready: AtomicBool::new(false),
            bot_user: RwLock::new(None),
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    /// Bot account, known after [`Channel::connect`]
    pub fn bot_user(&self) -> Option<Member> {
        self.bot_user.read().clone()
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header("Authorization", format!("Bot {}", self.config.bot_token))
    }

    /// Map non-success statuses to channel errors
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ChannelError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status.as_u16() {
            401 => ChannelError::AuthenticationFailed(body),
            403 => ChannelError::Forbidden(body),
            429 => {
                let retry_after = serde_json::from_str::<RateLimitBody>(&body)
                    .map(|b| b.retry_after.ceil() as u64)
                    .unwrap_or(5);
                ChannelError::RateLimited(retry_after)
            }
            _ => ChannelError::SendFailed(format!("Discord error {}: {}", status, body)),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ChannelError> {
        let response = self
            .authorized(self.client.get(url))
            .send()
            .await
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| ChannelError::Internal(e.to_string()))
    }

    async fn fetch_messages(
        &self,
        channel_id: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<DiscordMessageEvent>, ChannelError> {
        let mut url = format!("{}/channels/{}/messages?limit={}", API_BASE, channel_id, limit.min(MAX_FETCH));
        if let Some(after) = after {
            url.push_str(&format!("&after={}", after));
        }

        let mut events: Vec<DiscordMessageEvent> = self.get_json(&url).await?;
        events.sort_by_key(|e| e.id.parse::<u64>().unwrap_or_default());
        Ok(events)
    }

    /// Send one message via Discord API
    async fn send_discord_message(&self, channel_id: &str, content: &str) -> Result<String, ChannelError> {
        let url = format!("{}/channels/{}/messages", API_BASE, channel_id);

        let response = self
            .authorized(self.client.post(&url))
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;

        let result: DiscordMessageResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| ChannelError::Internal(e.to_string()))?;

        Ok(result.id)
    }

    /// Split long messages
    fn split_message(&self, content: &str) -> Vec<String> {
        let max_len = self.config.max_message_length;
        if content.len() <= max_len {
            return vec![content.to_string()];
        }

        let mut chunks = Vec::new();
        let mut current = String::new();

        for line in content.lines() {
            if !current.is_empty() && current.len() + line.len() + 1 > max_len {
                chunks.push(std::mem::take(&mut current));
            }

            let mut line = line;
            while line.len() > max_len {
                let mut cut = max_len;
                while !line.is_char_boundary(cut) {
                    cut -= 1;
                }
                chunks.push(line[..cut].to_string());
                line = &line[cut..];
            }

            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
        }

        if !current.is_empty() {
            chunks.push(current);
        }

        chunks
    }

    /// Convert a Discord message into a ChannelMessage
    pub fn parse_message(&self, event: &DiscordMessageEvent) -> ChannelMessage {
        let name = event
            .member
            .as_ref()
            .and_then(|m| m.nick.clone())
            .unwrap_or_else(|| event.author.username.clone());

        ChannelMessage {
            id: event.id.clone(),
            channel_id: event.channel_id.clone(),
            author: Member::new(&event.author.id, &name),
            content: event.content.clone(),
            timestamp: chrono::DateTime::parse_from_rfc3339(&event.timestamp)
                .map(|t| t.timestamp())
                .unwrap_or_else(|_| chrono::Utc::now().timestamp()),
        }
    }
}

#[async_trait]
impl Channel for DiscordChannel {
    fn name(&self) -> &str {
        "discord"
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<Member, ChannelError> {
        let user: DiscordUser = self
            .get_json(&format!("{}/users/@me", API_BASE))
            .await
            .map_err(|e| match e {
                ChannelError::AuthenticationFailed(_) => {
                    ChannelError::AuthenticationFailed("Invalid Discord bot token".to_string())
                }
                other => other,
            })?;

        let member = Member::new(&user.id, &user.username);
        *self.bot_user.write() = Some(member.clone());
        self.ready.store(true, Ordering::SeqCst);
        info!("Discord channel connected as {} ({})", member.name, member.id);
        Ok(member)
    }

    async fn poll(&self) -> Result<Vec<ChannelMessage>, ChannelError> {
        if !self.is_ready() {
            return Err(ChannelError::NotReady);
        }

        let mut messages = Vec::new();
        let mut last_seen = self.last_seen.lock().await;

        for channel_id in &self.config.channel_ids {
            let after = last_seen.get(channel_id).cloned();
            let limit = if after.is_some() { 50 } else { 1 };
            let events = self.fetch_messages(channel_id, after.as_deref(), limit).await?;

            if let Some(newest) = events.last() {
                last_seen.insert(channel_id.clone(), newest.id.clone());
            }
            if after.is_none() {
                debug!("Primed Discord channel {}", channel_id);
                continue;
            }

            messages.extend(events.iter().map(|e| self.parse_message(e)));
        }

        Ok(messages)
    }

    async fn send_text(&self, channel_id: &str, text: &str) -> Result<String, ChannelError> {
        if !self.is_ready() {
            return Err(ChannelError::NotReady);
        }

        let chunks = self.split_message(text);
        let mut last_id = String::new();

        for (i, chunk) in chunks.iter().enumerate() {
            last_id = self.send_discord_message(channel_id, chunk).await?;

            // Respect rate limits
            if i < chunks.len() - 1 {
                tokio::time::sleep(tokio::time::Duration::from_millis(250)).await;
            }
        }

        Ok(last_id)
    }

    async fn delete_recent(&self, channel_id: &str, count: usize) -> Result<usize, ChannelError> {
        let events = self.fetch_messages(channel_id, None, count).await?;
        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();

        let request = match ids.as_slice() {
            [] => return Ok(0),
            [single] => self
                .client
                .delete(format!("{}/channels/{}/messages/{}", API_BASE, channel_id, single)),
            many => self
                .client
                .post(format!("{}/channels/{}/messages/bulk-delete", API_BASE, channel_id))
                .json(&serde_json::json!({ "messages": many })),
        };

        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;
        Self::check(response).await?;

        debug!("Deleted {} messages in {}", ids.len(), channel_id);
        Ok(ids.len())
    }

    async fn members(&self) -> Result<Vec<Member>, ChannelError> {
        let guild_id = self
            .config
            .guild_id
            .as_deref()
            .ok_or_else(|| ChannelError::Unsupported("DISCORD_GUILD_ID not set".to_string()))?;

        let members: Vec<DiscordGuildMember> = self
            .get_json(&format!("{}/guilds/{}/members?limit=1000", API_BASE, guild_id))
            .await?;

        Ok(members
            .into_iter()
            .map(|m| {
                let name = m.nick.unwrap_or_else(|| m.user.username.clone());
                Member::new(&m.user.id, &name)
            })
            .collect())
    }
}

/// Discord message object
#[derive(Debug, Deserialize, Serialize)]
pub struct DiscordMessageEvent {
    pub id: String,
    pub channel_id: String,
    pub author: DiscordUser,
    pub content: String,
    #[serde(default)]
    pub timestamp: String,
    pub member: Option<DiscordPartialMember>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DiscordUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DiscordPartialMember {
    pub nick: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DiscordGuildMember {
    user: DiscordUser,
    nick: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DiscordMessageResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RateLimitBody {
    retry_after: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(max_message_length: usize) -> DiscordChannel {
        let mut config = DiscordConfig::new("test");
        config.max_message_length = max_message_length;
        DiscordChannel::new(config)
    }

    #[test]
    fn test_message_splitting() {
        let channel = channel(20);

        let short = channel.split_message("short");
        assert_eq!(short, vec!["short".to_string()]);

        let text = "first line here\nsecond line here\nthird";
        let chunks = channel.split_message(text);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= 20));
        assert_eq!(chunks.join("\n"), text);
    }

    #[test]
    fn test_long_line_is_cut() {
        let channel = channel(10);
        let chunks = channel.split_message(&"日本語".repeat(5));

        assert!(chunks.iter().all(|c| c.len() <= 10));
        assert_eq!(chunks.concat(), "日本語".repeat(5));
    }

    #[test]
    fn test_parse_message_prefers_nick() {
        let channel = channel(2000);
        let event: DiscordMessageEvent = serde_json::from_value(serde_json::json!({
            "id": "1",
            "channel_id": "99",
            "author": { "id": "123456789012345678", "username": "cooldude" },
            "content": "$help",
            "timestamp": "2024-01-01T00:00:00+00:00",
            "member": { "nick": "Cool" }
        }))
        .unwrap();

        let message = channel.parse_message(&event);
        assert_eq!(message.author, Member::new("123456789012345678", "Cool"));
        assert_eq!(message.content, "$help");
        assert_eq!(message.timestamp, 1704067200);
    }

    #[test]
    fn test_invite_url() {
        assert_eq!(
            invite_url("42"),
            "https://discord.com/oauth2/authorize?client_id=42&scope=bot&permissions=43008"
        );
    }
}
