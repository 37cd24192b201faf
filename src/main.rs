//! Scripty Bot - Entry Point
//!
//! Modes:
//! - Default: Discord bot with the host console attached
//! - --console / -c: console only, no chat connection

use anyhow::Context;
use scripty_bot::channels::discord::invite_url;
use scripty_bot::{Bot, Channel, Config, Console, DataFiles, DiscordChannel, DiscordConfig};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Parse args
    let args: Vec<String> = std::env::args().collect();
    let console_only = args.iter().any(|a| a == "--console" || a == "-c");
    let help_mode = args.iter().any(|a| a == "--help" || a == "-h");

    if help_mode {
        println!("Scripty Bot v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage: scripty-bot [OPTIONS]");
        println!();
        println!("Options:");
        println!("  --console, -c      Run from the console only, without Discord");
        println!("  --help, -h         Show this help");
        println!();
        println!("Environment variables:");
        println!("  DISCORD_BOT_TOKEN      Discord bot token (else properties.json, else prompt)");
        println!("  DISCORD_GUILD_ID       Guild whose members can be given permissions");
        println!("  DISCORD_CHANNELS       Comma-separated channel ids to watch");
        println!("  SCRIPTY_PREFIX         Command prefix (default: $)");
        println!("  SCRIPTY_DATA_DIR       Directory for the JSON data files");
        println!("  SCRIPTY_AUTOSAVE_SECS  Data file save interval (default: 5)");
        println!("  SCRIPTY_POLL_MS        Channel poll interval (default: 2000)");
        println!("  SCRIPTY_LOG_JSON       Set to 1 for JSON logs");
        return Ok(());
    }

    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    // Logs go to stderr so replies on stdout stay readable
    if std::env::var("SCRIPTY_LOG_JSON").is_ok_and(|v| v == "1") {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    info!("Scripty Bot v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    let files = DataFiles::open_with_autosave(&config.data_dir, config.autosave_interval)
        .with_context(|| format!("Failed to open data files in {}", config.data_dir.display()))?;

    let mut stdin = BufReader::new(tokio::io::stdin());

    let mut token = None;
    let channel: Option<Arc<dyn Channel>> = if console_only {
        None
    } else {
        let found = match config
            .discord_token
            .clone()
            .or_else(|| files.properties.read(|p| p.token.clone()))
        {
            Some(found) => found,
            None => prompt_token(&mut stdin).await?,
        };

        let mut discord = DiscordConfig::new(&found);
        token = Some(found);
        discord.guild_id = config.discord_guild_id.clone();
        discord.channel_ids = config.discord_channels.clone();
        if discord.channel_ids.is_empty() {
            warn!("DISCORD_CHANNELS is empty, no channel will be watched");
        }
        Some(Arc::new(DiscordChannel::new(discord)))
    };

    let bot = Bot::new(config, files, channel);

    match bot.connect().await {
        Ok(Some(me)) => {
            info!("Logged in as {} ({})", me.name, me.id);
            bot.files().properties.update(|p| p.token = token);
            info!("Invite link: {}", invite_url(&me.id));
        }
        Ok(None) => info!("Running from the console only"),
        Err(e) => {
            error!("Failed to connect: {:#}", e);
            eprintln!("Invalid token. Put a valid bot token in DISCORD_BOT_TOKEN or properties.json, or run with --console.");
            bot.files().properties.update(|p| p.token = None);
            bot.shutdown().await?;
            return Err(e);
        }
    }

    let console_bot = Arc::clone(&bot);
    let console = tokio::spawn(async move {
        let result = Console::new(Arc::clone(&console_bot), stdin).run().await;
        if console_bot.channel().is_none() && !console_bot.is_shutting_down() {
            // nothing else can issue commands
            if let Err(e) = console_bot.shutdown().await {
                error!("{:#}", e);
            }
        }
        result
    });
    let poller = tokio::spawn(Arc::clone(&bot).run_channel());

    tokio::select! {
        _ = bot.wait_for_shutdown() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            bot.shutdown().await?;
        }
    }

    match poller.await {
        Ok(Err(e)) => error!("Channel loop failed: {:#}", e),
        Err(e) => error!("Channel loop panicked: {}", e),
        Ok(Ok(())) => {}
    }
    if console.is_finished() {
        if let Ok(Err(e)) = console.await {
            error!("Console failed: {:#}", e);
        }
    }

    info!("Goodbye");
    // a pending blocking stdin read would keep the runtime alive
    std::process::exit(0);
}

/// Ask for the bot token on the console
async fn prompt_token<R: AsyncBufRead + Unpin>(stdin: &mut R) -> anyhow::Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(b"No bot token found. Enter the Discord bot token: ")
        .await?;
    stdout.flush().await?;

    let mut line = String::new();
    stdin.read_line(&mut line).await?;
    let token = line.trim().to_string();
    anyhow::ensure!(!token.is_empty(), "No bot token given");
    Ok(token)
}
