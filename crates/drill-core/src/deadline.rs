//! Cancellable deadlines for collaborator calls.
//!
//! Every outbound transport and store call runs under a [`Deadline`]: it fails
//! with `Error::Timeout` after the configured duration, or `Error::Cancelled`
//! as soon as shutdown is requested.

use std::{future::Future, path::Path, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{ChatId, Debt, DebtId, UserId},
    errors::Error,
    messaging::{port::MessagingPort, types::InlineKeyboard},
    ports::DebtStore,
    Result,
};

#[derive(Clone, Debug)]
pub struct Deadline {
    timeout: Duration,
    cancel: CancellationToken,
}

impl Deadline {
    pub fn new(timeout: Duration, cancel: CancellationToken) -> Self {
        Self { timeout, cancel }
    }

    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            res = tokio::time::timeout(self.timeout, fut) => match res {
                Ok(out) => out,
                Err(_) => Err(Error::Timeout(self.timeout)),
            },
        }
    }
}

pub struct DeadlineMessenger {
    inner: Arc<dyn MessagingPort>,
    deadline: Deadline,
}

impl DeadlineMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, deadline: Deadline) -> Self {
        Self { inner, deadline }
    }
}

#[async_trait]
impl MessagingPort for DeadlineMessenger {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.deadline.run(self.inner.send_text(chat_id, text)).await
    }

    async fn send_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: &InlineKeyboard,
    ) -> Result<()> {
        self.deadline
            .run(self.inner.send_keyboard(chat_id, text, keyboard))
            .await
    }

    async fn send_media(
        &self,
        chat_id: ChatId,
        media: &Path,
        caption: &str,
        keyboard: &InlineKeyboard,
    ) -> Result<()> {
        self.deadline
            .run(self.inner.send_media(chat_id, media, caption, keyboard))
            .await
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<()> {
        self.deadline.run(self.inner.answer_callback(callback_id)).await
    }
}

pub struct DeadlineStore {
    inner: Arc<dyn DebtStore>,
    deadline: Deadline,
}

impl DeadlineStore {
    pub fn new(inner: Arc<dyn DebtStore>, deadline: Deadline) -> Self {
        Self { inner, deadline }
    }
}

#[async_trait]
impl DebtStore for DeadlineStore {
    async fn save(&self, debt: &Debt) -> Result<DebtId> {
        self.deadline.run(self.inner.save(debt)).await
    }

    async fn get(&self, id: DebtId) -> Result<Debt> {
        self.deadline.run(self.inner.get(id)).await
    }

    async fn list_by_owner(&self, owner: UserId) -> Result<Vec<Debt>> {
        self.deadline.run(self.inner.list_by_owner(owner)).await
    }

    async fn update(&self, debt: &Debt) -> Result<()> {
        self.deadline.run(self.inner.update(debt)).await
    }

    async fn delete(&self, id: DebtId) -> Result<()> {
        self.deadline.run(self.inner.delete(id)).await
    }
}
