//! Normalized inbound events.
//!
//! Adapters convert platform updates into [`RawUpdate`]s; the core only ever
//! looks at [`Event`]s built from them.

use crate::domain::{ChatId, UserId};

/// One platform update as fetched by an [`crate::ports::UpdateSource`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawUpdate {
    /// Monotonic update id; the next cursor is `id + 1`.
    pub id: i64,
    pub payload: RawPayload,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawPayload {
    Message {
        chat_id: ChatId,
        user_id: UserId,
        text: Option<String>,
    },
    Callback {
        callback_id: String,
        chat_id: ChatId,
        user_id: UserId,
        data: Option<String>,
    },
    /// Anything else: edits, stickers sent outside a chat, channel posts...
    Other {
        chat_id: Option<ChatId>,
        user_id: Option<UserId>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Message,
    Callback,
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    /// Message text, or the raw callback data for callbacks.
    pub text: String,
    pub chat_id: ChatId,
    pub user_id: UserId,
    /// Platform id used to acknowledge a button press.
    pub callback_id: Option<String>,
}

impl Event {
    pub fn message(chat_id: ChatId, user_id: UserId, text: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Message,
            text: text.into(),
            chat_id,
            user_id,
            callback_id: None,
        }
    }

    pub fn callback(
        chat_id: ChatId,
        user_id: UserId,
        callback_id: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Self {
            kind: EventKind::Callback,
            text: data.into(),
            chat_id,
            user_id,
            callback_id: Some(callback_id.into()),
        }
    }

    /// Normalize a raw update. Returns `None` when there is no chat to answer in.
    pub fn from_raw(update: RawUpdate) -> Option<Self> {
        match update.payload {
            RawPayload::Message {
                chat_id,
                user_id,
                text: Some(text),
            } => Some(Self::message(chat_id, user_id, text)),
            RawPayload::Message {
                chat_id,
                user_id,
                text: None,
            } => Some(Self::unknown(chat_id, user_id, None)),
            RawPayload::Callback {
                callback_id,
                chat_id,
                user_id,
                data: Some(data),
            } => Some(Self::callback(chat_id, user_id, callback_id, data)),
            RawPayload::Callback {
                callback_id,
                chat_id,
                user_id,
                data: None,
            } => Some(Self::unknown(chat_id, user_id, Some(callback_id))),
            RawPayload::Other {
                chat_id: Some(chat_id),
                user_id,
            } => Some(Self::unknown(chat_id, user_id.unwrap_or(UserId(chat_id.0)), None)),
            RawPayload::Other { chat_id: None, .. } => None,
        }
    }

    fn unknown(chat_id: ChatId, user_id: UserId, callback_id: Option<String>) -> Self {
        Self {
            kind: EventKind::Unknown,
            text: String::new(),
            chat_id,
            user_id,
            callback_id,
        }
    }
}
