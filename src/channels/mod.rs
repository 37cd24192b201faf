//! Chat Transport
//!
//! The bot only depends on the [`Channel`] trait. Discord is the shipped
//! implementation; tests use an in-memory double.

pub mod discord;
pub mod traits;

pub use discord::{DiscordChannel, DiscordConfig};
pub use traits::{Channel, ChannelError, ChannelMessage, Member};
