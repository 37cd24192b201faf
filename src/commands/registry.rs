//! Command Registry
//!
//! Commands grouped by category, insertion order preserved within each
//! category. Traversal order is category order (Standard, Moderation, Custom)
//! then insertion order. Patterns are unique across the whole registry.

use std::collections::BTreeMap;
use tracing::{debug, info};

use super::command::{Category, Command};
use crate::keywords::{KeywordSet, MatchedValue};
use crate::permissions::PermissionLevel;

/// A command that matched, with its extracted values
#[derive(Debug, Clone)]
pub struct CommandMatch<'a> {
    pub command: &'a Command,
    pub values: Vec<MatchedValue>,
}

/// Ordered, deduplicated command collection
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    commands: BTreeMap<Category, Vec<Command>>,
    keywords: KeywordSet,
}

impl CommandRegistry {
    /// Empty registry using the built-in keywords
    pub fn new() -> Self {
        Self::with_keywords(KeywordSet::builtin())
    }

    pub fn with_keywords(keywords: KeywordSet) -> Self {
        Self {
            commands: BTreeMap::new(),
            keywords,
        }
    }

    pub fn keywords(&self) -> &KeywordSet {
        &self.keywords
    }

    /// Position of a command with the same pattern
    pub fn find(&self, command: &Command) -> Option<(Category, usize)> {
        self.find_pattern(command.pattern())
    }

    pub fn find_pattern(&self, pattern: &str) -> Option<(Category, usize)> {
        self.commands.iter().find_map(|(category, commands)| {
            commands
                .iter()
                .position(|c| c.pattern() == pattern)
                .map(|index| (*category, index))
        })
    }

    pub fn get(&self, pattern: &str) -> Option<&Command> {
        let (category, index) = self.find_pattern(pattern)?;
        self.commands.get(&category).and_then(|commands| commands.get(index))
    }

    /// Append a command to its category; false if the pattern is taken
    pub fn add(&mut self, command: Command) -> bool {
        if self.find(&command).is_some() {
            debug!("Rejected duplicate command '{}'", command.pattern());
            return false;
        }

        info!("Registered {} command '{}'", command.get_category(), command.pattern());
        self.commands.entry(command.get_category()).or_default().push(command);
        true
    }

    /// Add several commands, returning how many were accepted
    pub fn add_all(&mut self, commands: impl IntoIterator<Item = Command>) -> usize {
        let mut added = 0;
        for command in commands {
            if self.add(command) {
                added += 1;
            }
        }
        added
    }

    pub fn remove(&mut self, command: &Command) -> bool {
        self.remove_by_pattern(command.pattern())
    }

    pub fn remove_by_pattern(&mut self, pattern: &str) -> bool {
        let Some((category, index)) = self.find_pattern(pattern) else {
            return false;
        };

        if let Some(commands) = self.commands.get_mut(&category) {
            commands.remove(index);
            if commands.is_empty() {
                self.commands.remove(&category);
            }
        }
        info!("Removed command '{}'", pattern);
        true
    }

    pub fn len(&self) -> usize {
        self.commands.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All commands in traversal order
    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.values().flatten()
    }

    pub fn in_category(&self, category: Category) -> &[Command] {
        self.commands.get(&category).map(Vec::as_slice).unwrap_or_default()
    }

    /// Commands a caller at `level` may run, grouped by category
    ///
    /// Categories without any eligible command are omitted.
    pub fn list_for_permission(&self, level: PermissionLevel) -> Vec<(Category, Vec<&Command>)> {
        self.commands
            .iter()
            .filter_map(|(category, commands)| {
                let permitted: Vec<&Command> = commands
                    .iter()
                    .filter(|c| level.satisfies(c.required_level()))
                    .collect();
                (!permitted.is_empty()).then_some((*category, permitted))
            })
            .collect()
    }

    /// First command matching `text` that a caller at `level` may run
    pub fn match_first(&self, text: &str, level: PermissionLevel) -> Option<CommandMatch<'_>> {
        self.iter().find_map(|command| {
            command
                .matches(text, level, &self.keywords)
                .map(|values| CommandMatch { command, values })
        })
    }

    /// First command that matches `text` structurally but requires more
    /// than `level`
    pub fn find_denied(&self, text: &str, level: PermissionLevel) -> Option<&Command> {
        self.iter().find(|command| {
            !level.satisfies(command.required_level())
                && command.match_text(text, &self.keywords).is_some()
        })
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}
