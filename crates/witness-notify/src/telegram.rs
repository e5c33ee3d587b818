//! Telegram bot alerts

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use teloxide::prelude::*;
use teloxide::types::{ChatId, Recipient};

use crate::{NotificationChannel, NotifyError, ReportAlert};

/// Bot credentials and destination
#[derive(Debug)]
pub struct TelegramConfig {
    pub token: SecretString,
    /// Numeric chat id or `@channelusername`
    pub chat_id: String,
}

/// Posts alerts to one chat
pub struct TelegramChannel {
    bot: Bot,
    chat: Recipient,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Self {
        let chat = parse_recipient(&config.chat_id);
        tracing::info!(chat = %config.chat_id, "Telegram alerts enabled");
        Self {
            bot: Bot::new(config.token.expose_secret()),
            chat,
        }
    }
}

/// Numeric ids address chats directly; anything else is a channel username.
pub fn parse_recipient(raw: &str) -> Recipient {
    let raw = raw.trim();
    match raw.parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) if raw.starts_with('@') => Recipient::ChannelUsername(raw.to_string()),
        Err(_) => Recipient::ChannelUsername(format!("@{}", raw)),
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, alert: &ReportAlert) -> Result<(), NotifyError> {
        self.bot
            .send_message(self.chat.clone(), alert.chat_text())
            .await?;
        Ok(())
    }
}
