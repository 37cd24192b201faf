//! Permission System
//!
//! Three ranked access levels for command execution:
//! - **Default**: Everyone on the server, only explicitly open commands
//! - **User**: General commands (random, choose, custom command creation)
//! - **Superuser**: Everything, including moderation and logout
//!
//! Assignments are persisted in `users.json` as one id list per non-default
//! level, keyed by the plural label (`superusers`, `users`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Permission level of a caller or the minimum level a command requires
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    /// Lowest level, held by every member
    #[default]
    Default = 0,
    /// Can run general commands
    User = 1,
    /// Can run any command
    Superuser = 2,
}

impl PermissionLevel {
    /// All levels, lowest first
    pub const ALL: [PermissionLevel; 3] = [
        PermissionLevel::Default,
        PermissionLevel::User,
        PermissionLevel::Superuser,
    ];

    /// Numeric rank used for ordering
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Stable lowercase label used in storage keys and replies
    pub fn label(self) -> &'static str {
        match self {
            PermissionLevel::Default => "default",
            PermissionLevel::User => "user",
            PermissionLevel::Superuser => "superuser",
        }
    }

    /// Look up a level by its label
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.label() == label)
    }

    /// Whether a caller at this level may run something requiring `required`
    pub fn satisfies(self, required: PermissionLevel) -> bool {
        self.value() >= required.value()
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Label that does not name a permission level
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown permission label: {0}")]
pub struct UnknownPermission(pub String);

impl FromStr for PermissionLevel {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| UnknownPermission(s.to_string()))
    }
}

/// Persisted permission assignments (`users.json`)
///
/// Default-level members are never stored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserRoles {
    #[serde(default)]
    pub superusers: Vec<String>,
    #[serde(default)]
    pub users: Vec<String>,
}

/// Outcome of [`UserRoles::assign`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleChange {
    /// The member already had the requested level
    Unchanged,
    /// The member moved from `previous` to the requested level
    Changed { previous: PermissionLevel },
}

impl UserRoles {
    fn list(&self, level: PermissionLevel) -> Option<&Vec<String>> {
        match level {
            PermissionLevel::Default => None,
            PermissionLevel::User => Some(&self.users),
            PermissionLevel::Superuser => Some(&self.superusers),
        }
    }

    fn list_mut(&mut self, level: PermissionLevel) -> Option<&mut Vec<String>> {
        match level {
            PermissionLevel::Default => None,
            PermissionLevel::User => Some(&mut self.users),
            PermissionLevel::Superuser => Some(&mut self.superusers),
        }
    }

    /// Resolve the stored level of a member id
    pub fn level_of(&self, user_id: &str) -> PermissionLevel {
        PermissionLevel::ALL
            .into_iter()
            .rev()
            .find(|level| {
                self.list(*level)
                    .is_some_and(|ids| ids.iter().any(|id| id == user_id))
            })
            .unwrap_or(PermissionLevel::Default)
    }

    /// Move a member to `level`, keeping them in at most one list
    pub fn assign(&mut self, user_id: &str, level: PermissionLevel) -> RoleChange {
        let previous = self.level_of(user_id);
        if previous == level {
            return RoleChange::Unchanged;
        }

        if let Some(ids) = self.list_mut(previous) {
            ids.retain(|id| id != user_id);
        }
        if let Some(ids) = self.list_mut(level) {
            ids.push(user_id.to_string());
        }

        tracing::info!("Member {} moved from {} to {}", user_id, previous, level);
        RoleChange::Changed { previous }
    }

    pub fn has_superuser(&self) -> bool {
        !self.superusers.is_empty()
    }
}
