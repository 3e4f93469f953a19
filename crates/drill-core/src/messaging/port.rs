use std::path::Path;

use async_trait::async_trait;

use crate::{domain::ChatId, messaging::types::InlineKeyboard, Result};

/// Outbound messaging port.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()>;

    async fn send_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: &InlineKeyboard,
    ) -> Result<()>;

    /// Photo with caption and keyboard. Callers fall back to
    /// [`MessagingPort::send_keyboard`] when this fails.
    async fn send_media(
        &self,
        chat_id: ChatId,
        media: &Path,
        caption: &str,
        keyboard: &InlineKeyboard,
    ) -> Result<()>;

    /// Acknowledge a button press so the client stops its spinner.
    async fn answer_callback(&self, callback_id: &str) -> Result<()>;
}
