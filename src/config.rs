//! Configuration management

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

use crate::dispatcher::DEFAULT_PREFIX;
use crate::store::DEFAULT_AUTOSAVE_INTERVAL;

/// Bot configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Prefix every command starts with
    pub prefix: String,

    /// Directory holding the JSON data files
    pub data_dir: PathBuf,

    /// How often dirty documents are written
    pub autosave_interval: Duration,

    /// Discord bot token (falls back to properties.json)
    pub discord_token: Option<String>,

    /// Guild used to validate permission targets
    pub discord_guild_id: Option<String>,

    /// Channels watched for commands
    pub discord_channels: Vec<String>,

    /// Delay between channel polls
    pub poll_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let prefix = std::env::var("SCRIPTY_PREFIX")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PREFIX.to_string());

        let data_dir = std::env::var("SCRIPTY_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::data_local_dir()
                    .map(|d| d.join("scripty-bot"))
                    .unwrap_or_else(|| PathBuf::from("data"))
            });

        let autosave_interval = std::env::var("SCRIPTY_AUTOSAVE_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|secs: &u64| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_AUTOSAVE_INTERVAL);

        let discord_token = std::env::var("DISCORD_BOT_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());

        let discord_guild_id = std::env::var("DISCORD_GUILD_ID").ok();

        let discord_channels = std::env::var("DISCORD_CHANNELS")
            .map(|s| {
                s.split(',')
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let poll_interval = std::env::var("SCRIPTY_POLL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(2000));

        Ok(Self {
            prefix,
            data_dir,
            autosave_interval,
            discord_token,
            discord_guild_id,
            discord_channels,
            poll_interval,
        })
    }

    /// Defaults rooted at `data_dir`, without a transport
    pub fn local(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            data_dir: data_dir.into(),
            autosave_interval: DEFAULT_AUTOSAVE_INTERVAL,
            discord_token: None,
            discord_guild_id: None,
            discord_channels: Vec::new(),
            poll_interval: Duration::from_millis(2000),
        }
    }
}
