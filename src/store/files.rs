//! Bot data files
//!
//! The three JSON documents the bot keeps under its data directory:
//! - `properties.json`: bot configuration (`{"token": null}`)
//! - `users.json`: permission assignments
//! - `commands.json`: custom command name → response

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use super::document::{JsonDocument, StoreError};
use crate::permissions::UserRoles;

pub const PROPERTIES_FILE: &str = "properties.json";
pub const USERS_FILE: &str = "users.json";
pub const COMMANDS_FILE: &str = "commands.json";

/// Persisted bot configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Properties {
    /// Transport token saved after the first successful login
    #[serde(default)]
    pub token: Option<String>,
}

/// Custom command name → response
pub type CustomCommands = BTreeMap<String, String>;

/// All persisted documents
pub struct DataFiles {
    pub properties: JsonDocument<Properties>,
    pub users: JsonDocument<UserRoles>,
    pub commands: JsonDocument<CustomCommands>,
}

impl DataFiles {
    /// Open every document under `dir` without autosave
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            properties: JsonDocument::open(dir.join(PROPERTIES_FILE), Properties::default())?,
            users: JsonDocument::open(dir.join(USERS_FILE), UserRoles::default())?,
            commands: JsonDocument::open(dir.join(COMMANDS_FILE), CustomCommands::new())?,
        })
    }

    /// Open every document and autosave each one every `period`
    pub fn open_with_autosave(dir: &Path, period: Duration) -> Result<Self, StoreError> {
        let files = Self::open(dir)?;
        files.properties.start_autosave(period);
        files.users.start_autosave(period);
        files.commands.start_autosave(period);
        info!("Data files in {} autosaving every {:?}", dir.display(), period);
        Ok(files)
    }

    /// Close all documents, writing each one last time
    ///
    /// Every document is closed even if an earlier one fails; the first
    /// error is returned.
    pub async fn close(&self) -> Result<(), StoreError> {
        let results = [
            self.properties.close().await,
            self.users.close().await,
            self.commands.close().await,
        ];

        for result in &results {
            if let Err(e) = result {
                warn!("Failed to close data file: {}", e);
            }
        }
        results.into_iter().collect()
    }
}
