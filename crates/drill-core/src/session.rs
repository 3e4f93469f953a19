use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    codec::{CallbackToken, FlowId, StepId},
    domain::{Debt, UserId},
    Result,
};

/// A `(flow, step)` pair a sub-flow can hand control to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Route {
    pub flow: FlowId,
    pub step: StepId,
}

impl Route {
    pub const fn new(flow: FlowId, step: StepId) -> Self {
        Self { flow, step }
    }

    pub fn is_ignore(&self) -> bool {
        self.flow == FlowId::Ignore || self.step == StepId::Ignore
    }

    pub fn token(&self) -> CallbackToken {
        CallbackToken::new(self.flow, self.step, "")
    }
}

/// Date composed so far by the date picker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PartialDate {
    Year(i32),
    Month { year: i32, month: u32 },
    Day(NaiveDate),
}

impl PartialDate {
    pub fn year(&self) -> i32 {
        use chrono::Datelike;
        match *self {
            PartialDate::Year(y) => y,
            PartialDate::Month { year, .. } => year,
            PartialDate::Day(d) => d.year(),
        }
    }

    pub fn complete(&self) -> Option<NaiveDate> {
        match *self {
            PartialDate::Day(d) => Some(d),
            _ => None,
        }
    }
}

/// State of an active date sub-flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatePick {
    /// Where "back" and "cancel" return to.
    pub back: Route,
    /// Where the "lock date" button continues.
    pub next: Route,
    /// Working copy of the entity the date is for.
    pub parent: Debt,
    pub picked: Option<PartialDate>,
}

/// Flow-specific conversation state. Closed set; each variant is one shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlowState {
    /// Choosing an entry from a list; `next` receives the chosen one.
    Selecting { back: Route, next: Route },
    /// Working copy being created or edited.
    Editing(Debt),
    /// Payment entered, waiting for confirmation.
    Paying { debt: Debt, payment: i64 },
    PickingDate(DatePick),
}

/// Per-user conversation state. Presence means "mid-flow".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub owner: FlowId,
    pub step: StepId,
    pub state: FlowState,
}

impl Session {
    pub fn new(owner: FlowId, step: StepId, state: FlowState) -> Self {
        Self { owner, step, state }
    }
}

/// Authoritative session storage, keyed by user.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, user: UserId) -> Result<Option<Session>>;
    async fn set(&self, user: UserId, session: Session) -> Result<()>;
    /// Deleting a missing session is not an error.
    async fn delete(&self, user: UserId) -> Result<()>;
}

#[derive(Default)]
pub struct MemorySessionStore {
    inner: Mutex<HashMap<UserId, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, user: UserId) -> Result<Option<Session>> {
        Ok(self.inner.lock().await.get(&user).cloned())
    }

    async fn set(&self, user: UserId, session: Session) -> Result<()> {
        self.inner.lock().await.insert(user, session);
        Ok(())
    }

    async fn delete(&self, user: UserId) -> Result<()> {
        self.inner.lock().await.remove(&user);
        Ok(())
    }
}

/// Serializes turns per user. Different users never wait on each other.
#[derive(Default)]
pub struct UserLocks {
    inner: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub async fn lock_user(&self, user: UserId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            // Entries nobody holds or waits on are only referenced by the map.
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            map.entry(user)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
