//! Command Dispatcher
//!
//! Turns a raw line and the caller's level into a dispatch outcome.
//! Transport independent: invoking the handler and replying is left to the
//! caller (see [`crate::bot::Bot`]).

use tracing::debug;

use crate::commands::{Command, CommandMatch, CommandRegistry};
use crate::permissions::PermissionLevel;

/// Default command prefix
pub const DEFAULT_PREFIX: &str = "$";

/// Result of dispatching one line
#[derive(Debug)]
pub enum Dispatch<'a> {
    /// The line does not start with the prefix
    NotCommand,
    /// A permitted command matched
    Matched(CommandMatch<'a>),
    /// The line fits a command the caller may not run
    Denied(&'a Command),
    /// Prefixed, but nothing fits
    Unrecognized,
}

impl Dispatch<'_> {
    pub fn is_match(&self) -> bool {
        matches!(self, Dispatch::Matched(_))
    }
}

/// Prefix stripping and registry lookup
#[derive(Debug, Clone)]
pub struct Dispatcher {
    prefix: String,
}

impl Dispatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Line without the prefix, or `None` if it is not a command
    pub fn strip_prefix<'t>(&self, raw: &'t str) -> Option<&'t str> {
        raw.strip_prefix(self.prefix.as_str())
    }

    pub fn dispatch<'r>(&self, registry: &'r CommandRegistry, raw: &str, level: PermissionLevel) -> Dispatch<'r> {
        let Some(text) = self.strip_prefix(raw) else {
            return Dispatch::NotCommand;
        };

        if let Some(found) = registry.match_first(text, level) {
            debug!("'{}' matched '{}'", text, found.command.pattern());
            return Dispatch::Matched(found);
        }

        match registry.find_denied(text, level) {
            Some(command) => {
                debug!("'{}' denied for {} (needs {})", text, level, command.required_level());
                Dispatch::Denied(command)
            }
            None => Dispatch::Unrecognized,
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}
