//! Bot
//!
//! Owns the command registry, the dispatcher, the data files and the
//! optional transport. Console lines and channel messages both enter through
//! [`Bot::run_command`]; every reply leaves through [`Bot::reply`].

use anyhow::{Context, Result};
use parking_lot::{RwLock, RwLockReadGuard};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::channels::{Channel, ChannelError, ChannelMessage, Member};
use crate::commands::{Category, Command, CommandError, CommandRegistry, Handler, Invocation, Origin};
use crate::config::Config;
use crate::dispatcher::{Dispatch, Dispatcher};
use crate::handlers;
use crate::keywords::MatchedValue;
use crate::permissions::{PermissionLevel, RoleChange};
use crate::store::DataFiles;

/// What to do after the registry lock is released
enum Action {
    Run {
        handler: Handler,
        values: Vec<MatchedValue>,
        pattern: String,
    },
    Deny {
        usage: String,
    },
}

pub struct Bot {
    config: Config,
    dispatcher: Dispatcher,
    registry: RwLock<CommandRegistry>,
    files: DataFiles,
    channel: Option<Arc<dyn Channel>>,
    /// Our own account on the transport, ignored as a command author
    self_id: RwLock<Option<String>>,
    shutdown: watch::Sender<bool>,
}

impl Bot {
    /// Build a bot with the built-in commands and stored custom commands
    pub fn new(config: Config, files: DataFiles, channel: Option<Arc<dyn Channel>>) -> Arc<Self> {
        let mut registry = CommandRegistry::new();
        registry.add_all(handlers::builtin_commands());

        let (shutdown, _) = watch::channel(false);
        let bot = Arc::new(Self {
            dispatcher: Dispatcher::new(config.prefix.clone()),
            config,
            registry: RwLock::new(registry),
            files,
            channel,
            self_id: RwLock::new(None),
            shutdown,
        });

        let loaded = bot.load_custom_commands();
        info!("Loaded {} custom commands", loaded);
        bot
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn prefix(&self) -> &str {
        self.dispatcher.prefix()
    }

    pub fn files(&self) -> &DataFiles {
        &self.files
    }

    pub fn channel(&self) -> Option<&Arc<dyn Channel>> {
        self.channel.as_ref()
    }

    pub fn registry(&self) -> RwLockReadGuard<'_, CommandRegistry> {
        self.registry.read()
    }

    /// Connect the transport, if any, and remember our own id
    pub async fn connect(&self) -> Result<Option<Member>> {
        let Some(channel) = &self.channel else {
            return Ok(None);
        };

        let me = channel.connect().await?;
        *self.self_id.write() = Some(me.id.clone());
        Ok(Some(me))
    }

    /// Level of whoever is behind `origin`
    pub fn permission_of(&self, origin: &Origin) -> PermissionLevel {
        match origin {
            Origin::Console => PermissionLevel::Superuser,
            Origin::Channel { author, .. } => self.files.users.read(|roles| roles.level_of(&author.id)),
        }
    }

    /// Entry point for console lines (already prefixed)
    pub async fn handle_console(self: &Arc<Self>, line: &str) -> Result<()> {
        self.run_command(Origin::Console, line).await
    }

    /// Entry point for transport messages
    pub async fn handle_message(self: &Arc<Self>, message: ChannelMessage) -> Result<()> {
        let is_own = self.self_id.read().as_deref() == Some(message.author.id.as_str());
        if is_own {
            return Ok(());
        }

        let origin = Origin::Channel {
            channel_id: message.channel_id,
            author: message.author,
        };
        self.run_command(origin, &message.content).await
    }

    /// Dispatch `text` and run the matched handler
    pub async fn run_command(self: &Arc<Self>, origin: Origin, text: &str) -> Result<()> {
        let permission = self.permission_of(&origin);

        let action = {
            let registry = self.registry.read();
            match self.dispatcher.dispatch(&registry, text, permission) {
                Dispatch::NotCommand => return Ok(()),
                Dispatch::Unrecognized => {
                    debug!("Unrecognized command from {}: {}", origin.caller_name(), text);
                    return Ok(());
                }
                Dispatch::Denied(command) => Action::Deny {
                    usage: command.get_usage().to_string(),
                },
                Dispatch::Matched(found) => match found.command.get_handler() {
                    Some(handler) => Action::Run {
                        handler: Arc::clone(handler),
                        values: found.values,
                        pattern: found.command.pattern().to_string(),
                    },
                    None => {
                        debug!("'{}' has no handler", found.command.pattern());
                        return Ok(());
                    }
                },
            }
        };

        match action {
            Action::Deny { usage } => {
                info!("{} denied '{}' at {}", origin.caller_name(), usage, permission);
                let reply = format!("You don't have permission to use `{}{}`", self.prefix(), usage);
                self.reply(&origin, &reply).await
            }
            Action::Run { handler, values, pattern } => {
                info!("{} ran '{}'", origin.caller_name(), pattern);
                let invocation = Invocation {
                    bot: Arc::clone(self),
                    values,
                    permission,
                    origin,
                };
                handler(invocation)
                    .await
                    .with_context(|| format!("Command '{}' failed", pattern))
            }
        }
    }

    /// Print on the console or send to the originating channel
    pub async fn reply(&self, origin: &Origin, text: &str) -> Result<()> {
        match origin {
            Origin::Console => {
                println!("{}", text);
                Ok(())
            }
            Origin::Channel { channel_id, .. } => {
                let Some(channel) = &self.channel else {
                    warn!("No channel to reply in {}: {}", channel_id, text);
                    return Ok(());
                };
                channel.send_text(channel_id, text).await?;
                Ok(())
            }
        }
    }

    /// Commands available at `permission`, one per line, grouped by category
    pub fn help_text(&self, permission: PermissionLevel, decorated: bool) -> String {
        let registry = self.registry.read();
        let mut text = String::new();

        for (category, commands) in registry.list_for_permission(permission) {
            if decorated {
                text.push_str(&format!("__{}__\n", category));
            } else {
                text.push_str(&format!("{}:\n", category));
            }
            for command in commands {
                let line = if decorated {
                    command.help_line_decorated()
                } else {
                    format!("  {}", command.help_line())
                };
                text.push_str(&line);
                text.push('\n');
            }
        }

        text
    }

    /// Find a member by id; without a transport any id is accepted
    pub async fn resolve_member(&self, user_id: &str) -> Result<Option<Member>> {
        let Some(channel) = &self.channel else {
            return Ok(Some(Member::new(user_id, user_id)));
        };

        let members = channel.members().await?;
        Ok(members.into_iter().find(|m| m.id == user_id))
    }

    /// Change a member's level, returning the reply text
    pub async fn set_user_permission(&self, user_id: &str, level: PermissionLevel) -> Result<String> {
        let member = match self.resolve_member(user_id).await {
            Ok(member) => member,
            Err(e) => match e.downcast_ref::<ChannelError>() {
                Some(ChannelError::Unsupported(reason)) => {
                    return Ok(format!("Can't look up members: {}", reason));
                }
                _ => return Err(e),
            },
        };

        let Some(member) = member else {
            return Ok(format!(
                "Invalid or non-existent user. ex. {}{} @exampleuser",
                self.prefix(),
                level
            ));
        };

        let change = self.files.users.update(|roles| roles.assign(&member.id, level));
        Ok(match change {
            RoleChange::Unchanged => format!("{} is already a {}", member.name, level),
            RoleChange::Changed { .. } => format!("{} is now a {}", member.name, level),
        })
    }

    /// Register a custom command and persist the custom command list
    pub fn add_custom_command(&self, name: &str, response: &str) -> Result<bool, CommandError> {
        let command = Command::custom(name, response)?.handler(handlers::custom_response());

        let added = self.registry.write().add(command);
        if added {
            self.save_custom_commands();
        }
        Ok(added)
    }

    /// Remove a custom command; built-in commands are left alone
    pub fn remove_custom_command(&self, name: &str) -> bool {
        let removed = {
            let mut registry = self.registry.write();
            let is_custom = registry.get(name).is_some_and(Command::is_custom);
            is_custom && registry.remove_by_pattern(name)
        };

        if removed {
            self.save_custom_commands();
        }
        removed
    }

    /// Replace `commands.json` with the registry's custom commands
    pub fn save_custom_commands(&self) {
        let custom: BTreeMap<String, String> = self
            .registry
            .read()
            .in_category(Category::Custom)
            .iter()
            .filter_map(|c| c.response().map(|r| (c.pattern().to_string(), r.to_string())))
            .collect();

        debug!("Saving {} custom commands", custom.len());
        self.files.commands.set(custom);
    }

    /// Register every stored custom command, skipping invalid entries
    pub fn load_custom_commands(&self) -> usize {
        let stored = self.files.commands.get();
        let mut registry = self.registry.write();
        let mut loaded = 0;

        for (name, response) in stored {
            match Command::custom(&name, &response) {
                Ok(command) => {
                    if registry.add(command.handler(handlers::custom_response())) {
                        loaded += 1;
                    } else {
                        warn!("Stored custom command '{}' clashes with an existing command", name);
                    }
                }
                Err(e) => warn!("Skipping stored custom command: {}", e),
            }
        }

        loaded
    }

    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Close every data file and signal the loops to stop
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down");
        let closed = self.files.close().await;
        self.shutdown.send_replace(true);
        closed.context("Failed to close data files")
    }

    /// Resolves once shutdown was requested
    pub async fn wait_for_shutdown(&self) {
        let mut shutdown = self.subscribe_shutdown();
        let _ = shutdown.wait_for(|stop| *stop).await;
    }

    /// Poll the transport and dispatch messages until shutdown
    pub async fn run_channel(self: Arc<Self>) -> Result<()> {
        let Some(channel) = self.channel.clone() else {
            return Ok(());
        };

        info!("Polling {} every {:?}", channel.name(), self.config.poll_interval);
        let mut shutdown = self.subscribe_shutdown();
        let mut ticker = tokio::time::interval(self.config.poll_interval);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    match channel.poll().await {
                        Ok(messages) => {
                            for message in messages {
                                if let Err(e) = self.handle_message(message).await {
                                    warn!("{:#}", e);
                                }
                            }
                        }
                        Err(ChannelError::RateLimited(secs)) => {
                            warn!("Rate limited by {}, waiting {}s", channel.name(), secs);
                            tokio::time::sleep(std::time::Duration::from_secs(secs)).await;
                        }
                        Err(e) => warn!("Polling {} failed: {}", channel.name(), e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Stopped polling {}", channel.name());
        Ok(())
    }
}
