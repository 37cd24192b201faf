//! Command definitions
//!
//! A [`Command`] is a pattern plus the metadata needed to list and gate it,
//! and an optional handler that runs when the pattern matches. Custom
//! commands are a restricted kind: a single literal word answered with a
//! fixed response.

use futures_util::future::BoxFuture;
use std::cmp::Ordering;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use super::pattern::match_pattern;
use crate::bot::Bot;
use crate::channels::Member;
use crate::keywords::{KeywordSet, MatchedValue};
use crate::permissions::PermissionLevel;

/// Command construction errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Improper command name '{0}': must be a single word without keywords")]
    ImproperName(String),
}

/// Grouping used for listing and traversal order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Standard,
    Moderation,
    /// User made
    Custom,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Standard => "Standard",
            Category::Moderation => "Moderation",
            Category::Custom => "Custom",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a command invocation came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Host console, always superuser
    Console,
    /// Message posted in a transport channel
    Channel { channel_id: String, author: Member },
}

impl Origin {
    pub fn is_console(&self) -> bool {
        matches!(self, Origin::Console)
    }

    pub fn channel_id(&self) -> Option<&str> {
        match self {
            Origin::Console => None,
            Origin::Channel { channel_id, .. } => Some(channel_id),
        }
    }

    /// Display name of the caller
    pub fn caller_name(&self) -> &str {
        match self {
            Origin::Console => "console",
            Origin::Channel { author, .. } => &author.name,
        }
    }
}

/// Everything a handler receives for one matched command
pub struct Invocation {
    pub bot: Arc<Bot>,
    /// Keyword values in pattern order; the response for custom commands
    pub values: Vec<MatchedValue>,
    pub permission: PermissionLevel,
    pub origin: Origin,
}

impl Invocation {
    /// Reply through the console or the originating channel
    pub async fn reply(&self, text: &str) -> anyhow::Result<()> {
        self.bot.reply(&self.origin, text).await
    }

    pub fn text(&self, index: usize) -> Option<&str> {
        self.values.get(index).and_then(MatchedValue::as_text)
    }
}

/// Async command handler stored on a command
pub type Handler = Arc<dyn Fn(Invocation) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Wrap an async fn as a [`Handler`]
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Invocation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |invocation| Box::pin(f(invocation)))
}

/// Pattern-driven or fixed-response behaviour
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    /// Tokenized pattern with keyword extraction
    Pattern,
    /// Single-word name answered with `response`
    Custom { response: String },
}

/// A matchable command
#[derive(Clone)]
pub struct Command {
    pattern: String,
    description: String,
    usage: Option<String>,
    category: Category,
    minimum_permission: PermissionLevel,
    kind: CommandKind,
    handler: Option<Handler>,
}

impl Command {
    /// Create a standard command open to every level
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.trim().to_string(),
            description: "No description provided".to_string(),
            usage: None,
            category: Category::Standard,
            minimum_permission: PermissionLevel::Default,
            kind: CommandKind::Pattern,
            handler: None,
        }
    }

    /// Create a custom command answering `name` with `response`
    pub fn custom(name: &str, response: &str) -> Result<Self, CommandError> {
        let name = name.trim();
        let is_keyword_like = name.starts_with('<') && name.ends_with('>');
        if name.is_empty() || name.contains(char::is_whitespace) || is_keyword_like {
            return Err(CommandError::ImproperName(name.to_string()));
        }

        Ok(Self {
            pattern: name.to_string(),
            description: "A custom command".to_string(),
            usage: None,
            category: Category::Custom,
            minimum_permission: PermissionLevel::Default,
            kind: CommandKind::Custom {
                response: response.to_string(),
            },
            handler: None,
        })
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.trim().to_string();
        self
    }

    pub fn usage(mut self, usage: &str) -> Self {
        self.usage = Some(usage.trim().to_string());
        self
    }

    /// Ignored for custom commands, which always live in [`Category::Custom`]
    pub fn category(mut self, category: Category) -> Self {
        if !self.is_custom() {
            self.category = category;
        }
        self
    }

    /// Ignored for custom commands, which are open to every level
    pub fn minimum_permission(mut self, level: PermissionLevel) -> Self {
        if !self.is_custom() {
            self.minimum_permission = level;
        }
        self
    }

    pub fn handler(mut self, handler: Handler) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn get_description(&self) -> &str {
        &self.description
    }

    /// Usage text, the pattern unless set explicitly
    pub fn get_usage(&self) -> &str {
        self.usage.as_deref().unwrap_or(&self.pattern)
    }

    pub fn get_category(&self) -> Category {
        self.category
    }

    pub fn required_level(&self) -> PermissionLevel {
        self.minimum_permission
    }

    pub fn kind(&self) -> &CommandKind {
        &self.kind
    }

    pub fn is_custom(&self) -> bool {
        matches!(self.kind, CommandKind::Custom { .. })
    }

    /// Fixed response of a custom command
    pub fn response(&self) -> Option<&str> {
        match &self.kind {
            CommandKind::Custom { response } => Some(response),
            CommandKind::Pattern => None,
        }
    }

    pub fn get_handler(&self) -> Option<&Handler> {
        self.handler.as_ref()
    }

    /// `usage: description`
    pub fn help_line(&self) -> String {
        format!("{}: {}", self.get_usage(), self.description)
    }

    /// `` `usage` description`` for chat rendering
    pub fn help_line_decorated(&self) -> String {
        format!("`{}` {}", self.get_usage(), self.description)
    }

    /// Structural match, ignoring permissions
    pub fn match_text(&self, text: &str, keywords: &KeywordSet) -> Option<Vec<MatchedValue>> {
        match &self.kind {
            CommandKind::Pattern => match_pattern(&self.pattern, text, keywords),
            CommandKind::Custom { response } => {
                (text.trim() == self.pattern).then(|| vec![MatchedValue::Text(response.clone())])
            }
        }
    }

    /// Match `text` for a caller at `level`
    pub fn matches(
        &self,
        text: &str,
        level: PermissionLevel,
        keywords: &KeywordSet,
    ) -> Option<Vec<MatchedValue>> {
        if !level.satisfies(self.minimum_permission) {
            return None;
        }
        self.match_text(text, keywords)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("pattern", &self.pattern)
            .field("category", &self.category)
            .field("minimum_permission", &self.minimum_permission)
            .field("kind", &self.kind)
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

impl PartialEq for Command {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for Command {}

impl PartialOrd for Command {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Command {
    fn cmp(&self, other: &Self) -> Ordering {
        self.pattern.cmp(&other.pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_command_name_validation() {
        assert_eq!(
            Command::custom("add command", "hi").unwrap_err(),
            CommandError::ImproperName("add command".to_string())
        );
        assert!(Command::custom("", "hi").is_err());
        assert!(Command::custom("<word>", "hi").is_err());

        let command = Command::custom("addcommand", "hi").unwrap();
        assert_eq!(command.pattern(), "addcommand");
        assert_eq!(command.response(), Some("hi"));
    }

    #[test]
    fn test_custom_command_restrictions() {
        let command = Command::custom("hello", "Why hello there")
            .unwrap()
            .category(Category::Moderation)
            .minimum_permission(PermissionLevel::Superuser);

        assert_eq!(command.get_category(), Category::Custom);
        assert_eq!(command.required_level(), PermissionLevel::Default);
    }

    #[test]
    fn test_custom_command_returns_response() {
        let keywords = KeywordSet::builtin();
        let command = Command::custom("hello", "Why hello there").unwrap();

        assert_eq!(
            command.matches(" hello ", PermissionLevel::Default, &keywords),
            Some(vec![MatchedValue::Text("Why hello there".to_string())])
        );
        assert_eq!(command.matches("hello you", PermissionLevel::Default, &keywords), None);
    }

    #[test]
    fn test_permission_gate() {
        let keywords = KeywordSet::builtin();
        let command = Command::new("purge <number>").minimum_permission(PermissionLevel::Superuser);

        assert!(command.matches("purge 10", PermissionLevel::User, &keywords).is_none());
        assert!(command.matches("purge 10", PermissionLevel::Superuser, &keywords).is_some());
        assert!(command.match_text("purge 10", &keywords).is_some());
    }

    #[test]
    fn test_usage_defaults_to_pattern() {
        let command = Command::new("random <number>").description("Random number");
        assert_eq!(command.get_usage(), "random <number>");
        assert_eq!(command.help_line(), "random <number>: Random number");

        let command = command.usage("random 10");
        assert_eq!(command.help_line_decorated(), "`random 10` Random number");
    }

    #[test]
    fn test_ordering_by_pattern() {
        let mut commands = vec![Command::new("user <user>"), Command::new("help"), Command::new("purge <number>")];
        commands.sort();

        let patterns: Vec<&str> = commands.iter().map(Command::pattern).collect();
        assert_eq!(patterns, vec!["help", "purge <number>", "user <user>"]);
        assert_eq!(Command::new("help"), Command::new("help").description("other"));
    }
}
