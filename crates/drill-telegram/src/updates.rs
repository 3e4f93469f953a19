use std::time::Duration;

use async_trait::async_trait;
use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message, Update, UpdateKind},
};

use drill_core::{
    domain::{ChatId, UserId},
    errors::Error,
    events::{RawPayload, RawUpdate},
    ports::UpdateSource,
    Result,
};

use crate::TelegramMessenger;

/// Long-polling update source backed by `getUpdates`.
///
/// Passing `cursor` as the offset confirms every update below it.
pub struct TelegramUpdates {
    bot: Bot,
    timeout: Duration,
}

impl TelegramUpdates {
    pub fn new(bot: Bot, timeout: Duration) -> Self {
        Self { bot, timeout }
    }
}

#[async_trait]
impl UpdateSource for TelegramUpdates {
    async fn fetch(&self, cursor: i64, limit: u8) -> Result<Vec<RawUpdate>> {
        let offset = i32::try_from(cursor)
            .map_err(|_| Error::External(format!("update cursor out of range: {cursor}")))?;
        let timeout = u32::try_from(self.timeout.as_secs()).unwrap_or(u32::MAX);

        let updates = self
            .bot
            .get_updates()
            .offset(offset)
            .limit(limit)
            .timeout(timeout)
            .await
            .map_err(TelegramMessenger::map_err)?;

        Ok(updates.into_iter().map(to_raw).collect())
    }
}

fn user_of(msg: &Message) -> Option<UserId> {
    msg.from().map(|u| UserId(u.id.0 as i64))
}

fn to_raw(update: Update) -> RawUpdate {
    let id = i64::from(update.id);
    let payload = match &update.kind {
        UpdateKind::Message(msg) => match user_of(msg) {
            Some(user_id) => RawPayload::Message {
                chat_id: ChatId(msg.chat.id.0),
                user_id,
                text: msg.text().map(str::to_string),
            },
            None => other(&update),
        },
        UpdateKind::CallbackQuery(q) => callback(q).unwrap_or_else(|| other(&update)),
        _ => other(&update),
    };
    RawUpdate { id, payload }
}

fn callback(q: &CallbackQuery) -> Option<RawPayload> {
    let chat = q.message.as_ref()?.chat.id;
    Some(RawPayload::Callback {
        callback_id: q.id.clone(),
        chat_id: ChatId(chat.0),
        user_id: UserId(q.from.id.0 as i64),
        data: q.data.clone(),
    })
}

fn other(update: &Update) -> RawPayload {
    RawPayload::Other {
        chat_id: update.chat().map(|c| ChatId(c.id.0)),
        user_id: update.user().map(|u| UserId(u.id.0 as i64)),
    }
}
