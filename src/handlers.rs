//! Built-in commands
//!
//! The command table registered on every bot, and the handler bodies behind it.
//! Handlers reply through [`Invocation::reply`] so the same code answers the
//! console and chat channels.

use anyhow::Result;
use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

use crate::channels::ChannelError;
use crate::commands::{handler, Category, Command, Handler, Invocation};
use crate::permissions::PermissionLevel;

/// Most messages `purge` removes at once
pub const MAX_PURGE: i64 = 100;

const FACT_URL: &str = "http://numbersapi.com/random";

const CHOICE_SENTENCES: [&str; 4] = [
    "The option chosen is {}",
    "Obviously I'd choose {}",
    "Definitely {}",
    "Of course {}",
];

const EIGHT_BALL_ANSWERS: [&str; 20] = [
    "It is certain",
    "It is decidedly so",
    "Without a doubt",
    "Yes definitely",
    "You may rely on it",
    "As I see it, yes",
    "Most likely",
    "Outlook good",
    "Yes",
    "Signs point to yes",
    "Reply hazy try again",
    "Ask again later",
    "Better not tell you now",
    "Cannot predict now",
    "Concentrate and ask again",
    "Don't count on it",
    "My reply is no",
    "My sources say no",
    "Outlook not so good",
    "Very doubtful",
];

/// Every built-in command, in registration order
pub fn builtin_commands() -> Vec<Command> {
    vec![
        Command::new("help")
            .description("lists the available commands for the user")
            .handler(handler(help)),
        Command::new("test")
            .description("get a reply back, used for testing...")
            .handler(handler(test_reply)),
        Command::new("permission")
            .description("gets the permission level of the user")
            .handler(handler(permission)),
        Command::new("random <number>")
            .description("Gets a random number between 0 and 'number'")
            .handler(handler(random_number)),
        Command::new("fact")
            .description("Gets random number facts")
            .handler(handler(random_fact)),
        Command::new("choose <options>")
            .description("Chooses a random option out of the options given")
            .usage("choose <option> | <option> ...")
            .handler(handler(choose)),
        Command::new("8ball <string>")
            .description("Answers any yes or no question")
            .usage("8ball <question>")
            .handler(handler(eight_ball)),
        Command::new("command add <word> <string>")
            .description("Creates a custom command")
            .usage("command add <name> <response>")
            .minimum_permission(PermissionLevel::User)
            .handler(handler(command_add)),
        Command::new("command remove <word>")
            .description("Removes a custom command")
            .usage("command remove <name>")
            .minimum_permission(PermissionLevel::Superuser)
            .handler(handler(command_remove)),
        Command::new("logout")
            .description("shuts down the bot")
            .minimum_permission(PermissionLevel::Superuser)
            .handler(handler(logout)),
        Command::new("superuser <user>")
            .description("sets the permission level of 'user' to superuser")
            .category(Category::Moderation)
            .minimum_permission(PermissionLevel::Superuser)
            .handler(handler(set_superuser)),
        Command::new("user <user>")
            .description("sets the permission level of 'user' to user")
            .category(Category::Moderation)
            .minimum_permission(PermissionLevel::Superuser)
            .handler(handler(set_user)),
        Command::new("default <user>")
            .description("sets the permission level of 'user' to default")
            .category(Category::Moderation)
            .minimum_permission(PermissionLevel::Superuser)
            .handler(handler(set_default)),
        Command::new("purge <number>")
            .description("Removes 'number' amount of messages from this channel (max 100)")
            .category(Category::Moderation)
            .minimum_permission(PermissionLevel::Superuser)
            .handler(handler(purge)),
    ]
}

/// Handler shared by every custom command: relay the stored response
pub fn custom_response() -> Handler {
    handler(|inv: Invocation| async move {
        let response = inv.text(0).unwrap_or_default().to_string();
        inv.reply(&response).await
    })
}

async fn help(inv: Invocation) -> Result<()> {
    if inv.origin.is_console() {
        let text = inv.bot.help_text(inv.permission, false);
        return inv.reply(text.trim_end()).await;
    }

    let text = format!(
        "**Available commands for {}:**\n{}\n*NOTE that all commands begin with '{}'*",
        inv.origin.caller_name(),
        inv.bot.help_text(inv.permission, true),
        inv.bot.prefix()
    );
    inv.reply(&text).await
}

async fn test_reply(inv: Invocation) -> Result<()> {
    inv.reply("Test successful!").await
}

async fn permission(inv: Invocation) -> Result<()> {
    let text = format!("{}'s permission level is {}", inv.origin.caller_name(), inv.permission);
    inv.reply(&text).await
}

async fn logout(inv: Invocation) -> Result<()> {
    if !inv.origin.is_console() {
        inv.reply("Logging out ...").await?;
    }
    info!("Logging out (requested by {})", inv.origin.caller_name());
    inv.bot.shutdown().await
}

async fn set_superuser(inv: Invocation) -> Result<()> {
    set_permission(inv, PermissionLevel::Superuser).await
}

async fn set_user(inv: Invocation) -> Result<()> {
    set_permission(inv, PermissionLevel::User).await
}

async fn set_default(inv: Invocation) -> Result<()> {
    set_permission(inv, PermissionLevel::Default).await
}

async fn set_permission(inv: Invocation, level: PermissionLevel) -> Result<()> {
    let Some(user_id) = inv.values.first().and_then(|v| v.as_user()) else {
        return Ok(());
    };

    let reply = inv.bot.set_user_permission(user_id, level).await?;
    inv.reply(&reply).await
}

async fn purge(inv: Invocation) -> Result<()> {
    let Some(channel_id) = inv.origin.channel_id() else {
        return inv.reply("This command cannot be used from the console.").await;
    };
    let Some(channel) = inv.bot.channel().cloned() else {
        return Ok(());
    };

    let requested = inv.values.first().and_then(|v| v.as_number()).unwrap_or(0.0);
    let amount = purge_amount(requested);
    if amount == 0 {
        return inv.reply("Give a number of messages between 1 and 100").await;
    }

    // one extra for the purge command itself
    match channel.delete_recent(channel_id, amount + 1).await {
        Ok(deleted) => {
            info!("Purged {} messages from {}", deleted, channel_id);
            inv.reply(&format!("Removed {} messages", purged_count(deleted))).await
        }
        Err(ChannelError::Forbidden(reason)) => {
            warn!("Purge in {} forbidden: {}", channel_id, reason);
            inv.reply("I do not have the privileges to do that on this server or channel")
                .await
        }
        Err(e) => Err(e.into()),
    }
}

async fn random_number(inv: Invocation) -> Result<()> {
    let max = inv.values.first().and_then(|v| v.as_number()).unwrap_or(0.0);
    let reply = random_reply(max, &mut rand::thread_rng());
    inv.reply(&reply).await
}

async fn random_fact(inv: Invocation) -> Result<()> {
    let reply = match fetch_fact().await {
        Ok(fact) => fact,
        Err(e) => {
            warn!("Failed to fetch a number fact: {}", e);
            "I couldn't find a fact right now, try again later".to_string()
        }
    };
    inv.reply(&reply).await
}

async fn choose(inv: Invocation) -> Result<()> {
    let options = inv.values.first().and_then(|v| v.as_options()).unwrap_or_default();
    let reply = choose_reply(options, &mut rand::thread_rng());
    inv.reply(&reply).await
}

async fn eight_ball(inv: Invocation) -> Result<()> {
    let answer = EIGHT_BALL_ANSWERS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("Ask again later");
    inv.reply(answer).await
}

async fn command_add(inv: Invocation) -> Result<()> {
    let name = inv.text(0).unwrap_or_default();
    let response = inv.text(1).unwrap_or_default();

    let reply = match inv.bot.add_custom_command(name, response) {
        Ok(true) => format!("Added '{}' to the list of commands", name),
        Ok(false) => "A command with that name already exists!".to_string(),
        Err(_) => "The command name can't contain any spaces! Ex. command add Hello Why hello there".to_string(),
    };
    inv.reply(&reply).await
}

async fn command_remove(inv: Invocation) -> Result<()> {
    let name = inv.text(0).unwrap_or_default();

    let reply = if inv.bot.remove_custom_command(name) {
        format!("Removed '{}' from the list of commands", name)
    } else {
        format!("There is no custom command named '{}'", name)
    };
    inv.reply(&reply).await
}

/// Requested purge size, truncated and clamped to `0..=MAX_PURGE`
pub fn purge_amount(requested: f64) -> usize {
    (requested.trunc() as i64).clamp(0, MAX_PURGE) as usize
}

/// Messages removed besides the purge command itself
pub fn purged_count(deleted: usize) -> usize {
    deleted.saturating_sub(1)
}

/// Reply for `random <number>`: uniform in `0..=max`
pub fn random_reply(max: f64, rng: &mut impl Rng) -> String {
    let max = max.trunc() as i64;
    if max < 0 {
        return "Invalid range, must be at least 0".to_string();
    }
    format!("The random number is {}", rng.gen_range(0..=max))
}

/// Reply for `choose <options>`
pub fn choose_reply(options: &[String], rng: &mut impl Rng) -> String {
    let Some(option) = options.choose(rng) else {
        return "Give me some options to choose from".to_string();
    };
    let sentence = CHOICE_SENTENCES.choose(rng).copied().unwrap_or("{}");
    sentence.replacen("{}", option, 1)
}

async fn fetch_fact() -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let body = client
        .get(FACT_URL)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    Ok(unescape_html(body.trim()))
}

fn unescape_html(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandRegistry;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_builtin_patterns_are_unique() {
        let commands = builtin_commands();
        let mut registry = CommandRegistry::new();
        assert_eq!(registry.add_all(commands.clone()), commands.len());
        assert!(commands.iter().all(|c| c.get_handler().is_some()));
    }

    #[test]
    fn test_moderation_commands_need_superuser() {
        let registry = {
            let mut r = CommandRegistry::new();
            r.add_all(builtin_commands());
            r
        };

        let moderation = registry.in_category(Category::Moderation);
        assert_eq!(moderation.len(), 4);
        assert!(moderation
            .iter()
            .all(|c| c.required_level() == PermissionLevel::Superuser));

        assert!(registry.match_first("purge 5", PermissionLevel::User).is_none());
        assert!(registry.match_first("purge 5", PermissionLevel::Superuser).is_some());
    }

    #[test]
    fn test_purge_amount_clamped() {
        assert_eq!(purge_amount(10.0), 10);
        assert_eq!(purge_amount(10.9), 10);
        assert_eq!(purge_amount(250.0), 100);
        assert_eq!(purge_amount(-3.0), 0);
    }

    #[test]
    fn test_purged_count_excludes_command() {
        assert_eq!(purged_count(6), 5);
        assert_eq!(purged_count(100), 99);
        assert_eq!(purged_count(0), 0);
    }

    #[test]
    fn test_random_reply_range() {
        let mut rng = StdRng::seed_from_u64(7);

        assert_eq!(random_reply(-1.0, &mut rng), "Invalid range, must be at least 0");
        assert_eq!(random_reply(0.0, &mut rng), "The random number is 0");

        for _ in 0..50 {
            let reply = random_reply(3.0, &mut rng);
            let n: i64 = reply.trim_start_matches("The random number is ").parse().unwrap();
            assert!((0..=3).contains(&n));
        }
    }

    #[test]
    fn test_choose_reply_picks_an_option() {
        let mut rng = StdRng::seed_from_u64(1);
        let options = vec!["cats".to_string(), "dogs".to_string()];

        for _ in 0..20 {
            let reply = choose_reply(&options, &mut rng);
            assert!(reply.ends_with("cats") || reply.ends_with("dogs"), "{}", reply);
            assert!(!reply.contains("{}"));
        }
        assert_eq!(choose_reply(&[], &mut rng), "Give me some options to choose from");
    }

    #[test]
    fn test_unescape_html() {
        assert_eq!(unescape_html("5 is &quot;odd&quot; &amp; prime"), "5 is \"odd\" & prime");
    }
}
