//! Host console
//!
//! Reads commands line by line and runs them as the console origin, which is
//! always superuser. The prefix is optional on the console.

use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::bot::Bot;
use crate::permissions::PermissionLevel;

const PROMPT: &str = "$ ";

/// Console line as a dispatchable command, `None` for blank lines
pub fn to_command_line(prefix: &str, line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if line.starts_with(prefix) {
        Some(line.to_string())
    } else {
        Some(format!("{}{}", prefix, line))
    }
}

/// Console reader bound to a bot
pub struct Console<R> {
    bot: Arc<Bot>,
    reader: R,
    prompt: bool,
}

impl<R: AsyncBufRead + Unpin> Console<R> {
    pub fn new(bot: Arc<Bot>, reader: R) -> Self {
        Self {
            bot,
            reader,
            prompt: true,
        }
    }

    /// Disable the `$ ` prompt (for piped input)
    pub fn without_prompt(mut self) -> Self {
        self.prompt = false;
        self
    }

    async fn show_prompt(&self, text: &str) -> Result<()> {
        if self.prompt {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(text.as_bytes()).await?;
            stdout.flush().await?;
        }
        Ok(())
    }

    /// Next trimmed line, `None` on EOF
    async fn next_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let bytes_read = self.reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Ask the host for a first superuser when nobody holds the level yet
    pub async fn bootstrap_superuser(&mut self) -> Result<()> {
        if self.bot.channel().is_none() {
            return Ok(());
        }
        if self.bot.files().users.read(|roles| roles.has_superuser()) {
            return Ok(());
        }

        self.show_prompt("No superuser is set. Enter the user id to promote (blank to skip): ")
            .await?;
        let Some(user_id) = self.next_line().await? else {
            return Ok(());
        };
        if user_id.is_empty() {
            info!("Skipped superuser bootstrap");
            return Ok(());
        }

        let reply = self
            .bot
            .set_user_permission(&user_id, PermissionLevel::Superuser)
            .await?;
        println!("{}", reply);
        Ok(())
    }

    /// Run commands until EOF or shutdown
    pub async fn run(mut self) -> Result<()> {
        self.bootstrap_superuser().await?;

        let mut shutdown = self.bot.subscribe_shutdown();
        info!("Console ready");

        loop {
            if *shutdown.borrow() {
                break;
            }
            self.show_prompt(PROMPT).await?;

            let line = tokio::select! {
                line = self.next_line() => line?,
                _ = shutdown.changed() => break,
            };

            let Some(line) = line else {
                debug!("Console closed (EOF)");
                break;
            };
            let Some(command) = to_command_line(self.bot.prefix(), &line) else {
                continue;
            };

            if let Err(e) = self.bot.handle_console(&command).await {
                warn!("{:#}", e);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_command_line() {
        assert_eq!(to_command_line("$", "help"), Some("$help".to_string()));
        assert_eq!(to_command_line("$", "  $random 4 "), Some("$random 4".to_string()));
        assert_eq!(to_command_line("!", "purge 3"), Some("!purge 3".to_string()));
        assert_eq!(to_command_line("$", "   "), None);
    }
}
