//! Outbound Telegram channel.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::BotCommand;
use tracing::{info, warn};

/// Telegram's per-message character ceiling.
pub const TELEGRAM_LIMIT: usize = 4096;

/// Recipient-addressed send primitive.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), String>;
}

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Publishes the command menu shown by Telegram clients.
    pub async fn set_commands(&self, commands: &[(String, String)]) -> Result<(), String> {
        let commands: Vec<BotCommand> = commands
            .iter()
            .map(|(name, description)| BotCommand::new(name.clone(), description.clone()))
            .collect();
        info!("📋 Registering {} bot commands", commands.len());

        self.bot.set_my_commands(commands).await.map(|_| ()).map_err(|e| {
            let msg = format!("Failed to set commands: {e}");
            warn!("{}", msg);
            msg
        })
    }
}

#[async_trait]
impl MessageSender for TelegramClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), String> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .map(|_| ())
            .map_err(|e| {
                let msg = format!("Failed to send to {chat_id}: {e}");
                warn!("{}", msg);
                msg
            })
    }
}

/// Splits `text` into chunks of at most `limit` characters, on char
/// boundaries. Empty text yields no chunks.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;

    for ch in text.chars() {
        if count == limit {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
        current.push(ch);
        count += 1;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Sends `text` in [`TELEGRAM_LIMIT`]-sized chunks, in order. The first
/// failing chunk aborts the rest.
pub async fn send_long(sender: &dyn MessageSender, chat_id: i64, text: &str) -> Result<(), String> {
    for chunk in split_message(text, TELEGRAM_LIMIT) {
        sender.send_message(chat_id, &chunk).await?;
    }
    Ok(())
}
