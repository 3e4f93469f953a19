//! Hand-written fakes shared by unit tests.

use std::{
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;

use crate::{
    domain::{ChatId, Debt, DebtId, UserId},
    errors::Error,
    messaging::{port::MessagingPort, types::InlineKeyboard},
    ports::DebtStore,
    store::MemoryDebtStore,
    Result,
};

#[derive(Clone, Debug)]
pub struct Sent {
    pub chat_id: ChatId,
    pub text: String,
    pub keyboard: Option<InlineKeyboard>,
    pub media: bool,
}

#[derive(Default)]
pub struct FakeMessenger {
    sent: Mutex<Vec<Sent>>,
    answered: Mutex<Vec<String>>,
    failing_chat: Option<ChatId>,
    media_fails: bool,
}

impl FakeMessenger {
    pub fn failing_for(chat_id: ChatId) -> Self {
        Self {
            failing_chat: Some(chat_id),
            ..Self::default()
        }
    }

    pub fn without_media() -> Self {
        Self {
            media_fails: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last(&self) -> Sent {
        self.sent
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("nothing sent")
    }

    pub fn answered(&self) -> Vec<String> {
        self.answered.lock().unwrap().clone()
    }

    fn record(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
        media: bool,
    ) -> Result<()> {
        if self.failing_chat == Some(chat_id) {
            return Err(Error::External("chat is unreachable".to_string()));
        }
        self.sent.lock().unwrap().push(Sent {
            chat_id,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
            media,
        });
        Ok(())
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.record(chat_id, text, None, false)
    }

    async fn send_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: &InlineKeyboard,
    ) -> Result<()> {
        self.record(chat_id, text, Some(keyboard), false)
    }

    async fn send_media(
        &self,
        chat_id: ChatId,
        _media: &Path,
        caption: &str,
        keyboard: &InlineKeyboard,
    ) -> Result<()> {
        if self.media_fails {
            return Err(Error::External("photo not found".to_string()));
        }
        self.record(chat_id, caption, Some(keyboard), true)
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<()> {
        self.answered.lock().unwrap().push(callback_id.to_string());
        Ok(())
    }
}

/// Debt store that can be switched to fail writes or hang every call.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryDebtStore,
    fail_writes: AtomicBool,
    hang: AtomicBool,
}

impl FlakyStore {
    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    pub fn hang(&self, on: bool) {
        self.hang.store(on, Ordering::SeqCst);
    }

    async fn before_read(&self) {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }

    async fn before_write(&self) -> Result<()> {
        self.before_read().await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::External("store is down".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DebtStore for FlakyStore {
    async fn save(&self, debt: &Debt) -> Result<DebtId> {
        self.before_write().await?;
        self.inner.save(debt).await
    }

    async fn get(&self, id: DebtId) -> Result<Debt> {
        self.before_read().await;
        self.inner.get(id).await
    }

    async fn list_by_owner(&self, owner: UserId) -> Result<Vec<Debt>> {
        self.before_read().await;
        self.inner.list_by_owner(owner).await
    }

    async fn update(&self, debt: &Debt) -> Result<()> {
        self.before_write().await?;
        self.inner.update(debt).await
    }

    async fn delete(&self, id: DebtId) -> Result<()> {
        self.before_write().await?;
        self.inner.delete(id).await
    }
}
