//! End-to-end dispatch through a recording channel

use async_trait::async_trait;
use parking_lot::Mutex;
use scripty_bot::{Bot, Channel, ChannelError, ChannelMessage, Config, DataFiles, Member, PermissionLevel};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

const CHANNEL: &str = "900000000000000000";
const BOT_ID: &str = "100000000000000000";
const ADMIN_ID: &str = "111111111111111111";
const BOB_ID: &str = "222222222222222222";
const STRANGER_ID: &str = "333333333333333333";

#[derive(Default)]
struct RecordingChannel {
    inbox: Mutex<Vec<ChannelMessage>>,
    sent: Mutex<Vec<(String, String)>>,
    deleted: Mutex<Vec<(String, usize)>>,
    forbid_delete: AtomicBool,
}

impl RecordingChannel {
    fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, text)| text.clone()).collect()
    }

    fn last_sent(&self) -> Option<String> {
        self.sent.lock().last().map(|(_, text)| text.clone())
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    fn is_ready(&self) -> bool {
        true
    }

    async fn connect(&self) -> Result<Member, ChannelError> {
        Ok(Member::new(BOT_ID, "scripty"))
    }

    async fn poll(&self) -> Result<Vec<ChannelMessage>, ChannelError> {
        Ok(std::mem::take(&mut *self.inbox.lock()))
    }

    async fn send_text(&self, channel_id: &str, text: &str) -> Result<String, ChannelError> {
        let mut sent = self.sent.lock();
        sent.push((channel_id.to_string(), text.to_string()));
        Ok(sent.len().to_string())
    }

    async fn delete_recent(&self, channel_id: &str, count: usize) -> Result<usize, ChannelError> {
        if self.forbid_delete.load(Ordering::SeqCst) {
            return Err(ChannelError::Forbidden("Missing Permissions".to_string()));
        }
        self.deleted.lock().push((channel_id.to_string(), count));
        // same cap as a single Discord fetch
        Ok(count.min(100))
    }

    async fn members(&self) -> Result<Vec<Member>, ChannelError> {
        Ok(vec![
            Member::new(BOT_ID, "scripty"),
            Member::new(ADMIN_ID, "Admin"),
            Member::new(BOB_ID, "Bob"),
        ])
    }
}

fn admin() -> Member {
    Member::new(ADMIN_ID, "Admin")
}

fn bob() -> Member {
    Member::new(BOB_ID, "Bob")
}

fn message(author: Member, content: &str) -> ChannelMessage {
    ChannelMessage::text(CHANNEL, author, content)
}

async fn start(dir: &std::path::Path) -> (Arc<Bot>, Arc<RecordingChannel>) {
    let channel = Arc::new(RecordingChannel::default());
    let files = DataFiles::open(dir).unwrap();
    files.users.update(|roles| roles.assign(ADMIN_ID, PermissionLevel::Superuser));

    let mut config = Config::local(dir);
    config.poll_interval = Duration::from_millis(10);

    let bot = Bot::new(config, files, Some(channel.clone() as Arc<dyn Channel>));
    bot.connect().await.unwrap();
    (bot, channel)
}

#[tokio::test]
async fn test_custom_command_added_and_persisted() {
    let dir = tempdir().unwrap();
    let (bot, channel) = start(dir.path()).await;

    bot.handle_message(message(admin(), "$command add hello Why hello there"))
        .await
        .unwrap();
    assert_eq!(channel.last_sent().unwrap(), "Added 'hello' to the list of commands");

    bot.handle_message(message(bob(), "$hello")).await.unwrap();
    assert_eq!(channel.last_sent().unwrap(), "Why hello there");

    bot.handle_message(message(admin(), "$command add hello again"))
        .await
        .unwrap();
    assert_eq!(channel.last_sent().unwrap(), "A command with that name already exists!");

    bot.handle_message(message(admin(), "$command add help shadowing"))
        .await
        .unwrap();
    assert_eq!(channel.last_sent().unwrap(), "A command with that name already exists!");

    bot.shutdown().await.unwrap();

    let stored: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("commands.json")).unwrap()).unwrap();
    assert_eq!(stored, serde_json::json!({"hello": "Why hello there"}));

    // a fresh bot picks the command up again
    let (bot, channel) = start(dir.path()).await;
    bot.handle_message(message(bob(), "$hello")).await.unwrap();
    assert_eq!(channel.last_sent().unwrap(), "Why hello there");
}

#[tokio::test]
async fn test_command_add_requires_user_level() {
    let dir = tempdir().unwrap();
    let (bot, channel) = start(dir.path()).await;

    bot.handle_message(message(bob(), "$command add hi there"))
        .await
        .unwrap();
    assert_eq!(
        channel.last_sent().unwrap(),
        "You don't have permission to use `$command add <name> <response>`"
    );
    assert!(bot.files().commands.get().is_empty());
}

#[tokio::test]
async fn test_command_remove_only_removes_custom_commands() {
    let dir = tempdir().unwrap();
    let (bot, channel) = start(dir.path()).await;

    bot.add_custom_command("wave", "o/").unwrap();
    assert!(bot.files().commands.get().contains_key("wave"));

    bot.handle_message(message(admin(), "$command remove help"))
        .await
        .unwrap();
    assert_eq!(channel.last_sent().unwrap(), "There is no custom command named 'help'");

    bot.handle_message(message(admin(), "$command remove wave"))
        .await
        .unwrap();
    assert_eq!(channel.last_sent().unwrap(), "Removed 'wave' from the list of commands");
    assert!(bot.files().commands.get().is_empty());

    let before = channel.sent.lock().len();
    bot.handle_message(message(admin(), "$wave")).await.unwrap();
    assert_eq!(channel.sent.lock().len(), before);
}

#[tokio::test]
async fn test_denied_and_unknown_commands() {
    let dir = tempdir().unwrap();
    let (bot, channel) = start(dir.path()).await;

    bot.handle_message(message(bob(), "$purge 5")).await.unwrap();
    assert_eq!(
        channel.last_sent().unwrap(),
        "You don't have permission to use `$purge <number>`"
    );
    assert!(channel.deleted.lock().is_empty());

    bot.handle_message(message(bob(), "$nonsense")).await.unwrap();
    bot.handle_message(message(bob(), "$purge five")).await.unwrap();
    bot.handle_message(message(bob(), "hello there")).await.unwrap();
    assert_eq!(channel.sent.lock().len(), 1);
}

#[tokio::test]
async fn test_permission_assignment() {
    let dir = tempdir().unwrap();
    let (bot, channel) = start(dir.path()).await;

    bot.handle_message(message(admin(), &format!("$user <@{}>", STRANGER_ID)))
        .await
        .unwrap();
    assert_eq!(
        channel.last_sent().unwrap(),
        "Invalid or non-existent user. ex. $user @exampleuser"
    );

    bot.handle_message(message(admin(), &format!("$user <@{}>", BOB_ID)))
        .await
        .unwrap();
    assert_eq!(channel.last_sent().unwrap(), "Bob is now a user");

    bot.handle_message(message(admin(), &format!("$user {}", BOB_ID)))
        .await
        .unwrap();
    assert_eq!(channel.last_sent().unwrap(), "Bob is already a user");

    bot.handle_message(message(bob(), "$permission")).await.unwrap();
    assert_eq!(channel.last_sent().unwrap(), "Bob's permission level is user");

    // console runs as superuser
    bot.handle_console(&format!("$superuser {}", BOB_ID)).await.unwrap();
    let level = bot.files().users.read(|roles| roles.level_of(BOB_ID));
    assert_eq!(level, PermissionLevel::Superuser);
    let users = bot.files().users.get();
    assert!(users.superusers.contains(&BOB_ID.to_string()));
    assert!(!users.users.contains(&BOB_ID.to_string()));

    bot.handle_console(&format!("$default {}", BOB_ID)).await.unwrap();
    let users = bot.files().users.get();
    assert!(!users.superusers.contains(&BOB_ID.to_string()));
    assert!(!users.users.contains(&BOB_ID.to_string()));
}

#[tokio::test]
async fn test_purge() {
    let dir = tempdir().unwrap();
    let (bot, channel) = start(dir.path()).await;

    bot.handle_message(message(admin(), "$purge 5")).await.unwrap();
    assert_eq!(channel.deleted.lock().last().cloned(), Some((CHANNEL.to_string(), 6)));
    assert_eq!(channel.last_sent().unwrap(), "Removed 5 messages");

    bot.handle_message(message(admin(), "$purge 500")).await.unwrap();
    assert_eq!(channel.deleted.lock().last().cloned(), Some((CHANNEL.to_string(), 101)));
    assert_eq!(channel.last_sent().unwrap(), "Removed 99 messages");

    channel.forbid_delete.store(true, Ordering::SeqCst);
    bot.handle_message(message(admin(), "$purge 2")).await.unwrap();
    assert_eq!(
        channel.last_sent().unwrap(),
        "I do not have the privileges to do that on this server or channel"
    );

    // console replies are printed, nothing reaches the channel
    let before = channel.sent.lock().len();
    bot.handle_console("$purge 2").await.unwrap();
    assert_eq!(channel.sent.lock().len(), before);
    assert_eq!(channel.deleted.lock().len(), 2);
}

#[tokio::test]
async fn test_own_messages_are_ignored() {
    let dir = tempdir().unwrap();
    let (bot, channel) = start(dir.path()).await;

    bot.handle_message(message(Member::new(BOT_ID, "scripty"), "$test"))
        .await
        .unwrap();
    assert!(channel.sent.lock().is_empty());

    bot.handle_message(message(bob(), "$test")).await.unwrap();
    assert_eq!(channel.sent_texts(), vec!["Test successful!".to_string()]);
}

#[tokio::test]
async fn test_help_lists_permitted_commands() {
    let dir = tempdir().unwrap();
    let (bot, channel) = start(dir.path()).await;

    bot.handle_message(message(bob(), "$help")).await.unwrap();
    let help = channel.last_sent().unwrap();
    assert!(help.starts_with("**Available commands for Bob:**"));
    assert!(help.contains("__Standard__"));
    assert!(help.contains("`help` lists the available commands for the user"));
    assert!(!help.contains("purge"));
    assert!(help.ends_with("*NOTE that all commands begin with '$'*"));

    bot.handle_message(message(admin(), "$help")).await.unwrap();
    let help = channel.last_sent().unwrap();
    assert!(help.contains("__Moderation__"));
    assert!(help.contains("`purge <number>`"));
}

#[tokio::test]
async fn test_logout_closes_files() {
    let dir = tempdir().unwrap();
    let (bot, channel) = start(dir.path()).await;

    bot.handle_message(message(bob(), "$logout")).await.unwrap();
    assert!(!bot.is_shutting_down());

    bot.handle_message(message(admin(), "$logout")).await.unwrap();
    assert_eq!(channel.last_sent().unwrap(), "Logging out ...");
    assert!(bot.is_shutting_down());
    assert!(bot.files().users.is_closed());

    let users: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("users.json")).unwrap()).unwrap();
    assert_eq!(users["superusers"], serde_json::json!([ADMIN_ID]));
}

#[tokio::test]
async fn test_channel_loop_dispatches_until_shutdown() {
    let dir = tempdir().unwrap();
    let (bot, channel) = start(dir.path()).await;

    channel.inbox.lock().extend([
        message(bob(), "$test"),
        message(bob(), "just chatting"),
        message(bob(), "$choose cats | dogs"),
    ]);

    let poller = tokio::spawn(bot.clone().run_channel());

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while channel.sent.lock().len() < 2 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let sent = channel.sent_texts();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], "Test successful!");
    assert!(sent[1].ends_with("cats") || sent[1].ends_with("dogs"));

    bot.shutdown().await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), poller)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
