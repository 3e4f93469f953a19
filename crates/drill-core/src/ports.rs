use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{
    domain::{Debt, DebtId, UserId},
    events::RawUpdate,
    Result,
};

/// Persistent record store for debts.
///
/// Ownership is enforced by the flows before any mutation; the store trusts
/// its callers.
#[async_trait]
pub trait DebtStore: Send + Sync {
    /// Persist a new debt and return its id. `debt.id` is ignored.
    async fn save(&self, debt: &Debt) -> Result<DebtId>;
    /// Fails with `Error::NotFound` when the id is unknown.
    async fn get(&self, id: DebtId) -> Result<Debt>;
    async fn list_by_owner(&self, owner: UserId) -> Result<Vec<Debt>>;
    async fn update(&self, debt: &Debt) -> Result<()>;
    /// Delete-if-exists.
    async fn delete(&self, id: DebtId) -> Result<()>;
}

/// Inbound long-poll source.
///
/// Delivery is at-least-once; the consumer advances `cursor` past every
/// update it has processed. An empty batch means "nothing yet".
#[async_trait]
pub trait UpdateSource: Send + Sync {
    async fn fetch(&self, cursor: i64, limit: u8) -> Result<Vec<RawUpdate>>;
}

/// Source of "today" for past-date checks and due-date status.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Utc::now().date_naive()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
