//! Telegram adapter (teloxide).
//!
//! This crate implements the `drill-core` ports over the Telegram Bot API:
//! [`TelegramMessenger`] for outbound messages and [`updates::TelegramUpdates`]
//! for long polling.

use std::path::Path;

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile},
};

use tokio::time::sleep;

pub mod router;
pub mod updates;

use drill_core::{
    domain::ChatId,
    errors::Error,
    messaging::{port::MessagingPort, types::InlineKeyboard},
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    pub(crate) fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    fn markup(keyboard: &InlineKeyboard) -> Result<InlineKeyboardMarkup> {
        let rows = keyboard
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|b| Ok(InlineKeyboardButton::callback(b.label.clone(), b.callback_data()?)))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(InlineKeyboardMarkup::new(rows))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        tracing::debug!(retry_after = ?d, "telegram rate limit hit, retrying");
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.with_retry(|| self.bot.send_message(Self::tg_chat(chat_id), text.to_string()))
            .await?;
        Ok(())
    }

    async fn send_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: &InlineKeyboard,
    ) -> Result<()> {
        let markup = Self::markup(keyboard)?;
        self.with_retry(|| {
            self.bot
                .send_message(Self::tg_chat(chat_id), text.to_string())
                .reply_markup(markup.clone())
        })
        .await?;
        Ok(())
    }

    async fn send_media(
        &self,
        chat_id: ChatId,
        media: &Path,
        caption: &str,
        keyboard: &InlineKeyboard,
    ) -> Result<()> {
        if !media.is_file() {
            return Err(Error::External(format!(
                "media file not found: {}",
                media.display()
            )));
        }
        let markup = Self::markup(keyboard)?;
        self.with_retry(|| {
            self.bot
                .send_photo(Self::tg_chat(chat_id), InputFile::file(media.to_path_buf()))
                .caption(caption.to_string())
                .reply_markup(markup.clone())
        })
        .await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<()> {
        self.with_retry(|| self.bot.answer_callback_query(callback_id.to_string()))
            .await?;
        Ok(())
    }
}
