//! Scripty Bot
//!
//! Prefix command dispatcher for chat servers with write-back JSON state.
//!
//! # Features
//!
//! - **Pattern commands**: literal words mixed with typed keywords
//!   (`<user>`, `<number>`, `<string>`, `<options>`, `<word>`)
//! - **Permissions**: default / user / superuser, persisted per member
//! - **Custom commands**: one-word commands created at runtime, persisted
//! - **Write-back store**: JSON documents flushed on a timer and on close
//! - **Two sources**: host console (superuser) and Discord channels
//!
//! # Architecture
//!
//! ```text
//! Console ──┐                      ┌── CommandRegistry (keywords, patterns)
//!           ├──► Bot ──► Dispatcher┤
//! Discord ──┘     │                └── Handlers ──► reply (console / channel)
//!                 │
//!                 └── DataFiles (properties / users / commands .json)
//! ```

pub mod bot;
pub mod channels;
pub mod commands;
pub mod config;
pub mod console;
pub mod dispatcher;
pub mod handlers;
pub mod keywords;
pub mod permissions;
pub mod store;

pub use bot::Bot;
pub use channels::{Channel, ChannelError, ChannelMessage, DiscordChannel, DiscordConfig, Member};
pub use commands::{Category, Command, CommandError, CommandRegistry, Invocation, Origin};
pub use config::Config;
pub use console::Console;
pub use dispatcher::{Dispatch, Dispatcher};
pub use keywords::{KeywordSet, KeywordSpec, MatchedValue};
pub use permissions::{PermissionLevel, UserRoles};
pub use store::{DataFiles, JsonDocument, StoreError};
