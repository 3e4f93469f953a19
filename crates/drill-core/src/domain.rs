use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

/// Store-assigned debt id. Zero means "not saved yet".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DebtId(pub i64);

impl std::fmt::Display for DebtId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tracked obligation. Amount is in minor units and always positive once saved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Debt {
    pub id: DebtId,
    pub owner: UserId,
    pub description: String,
    pub amount: i64,
    pub due: Option<NaiveDate>,
}

impl Debt {
    /// Empty working copy for the add flow.
    pub fn draft(owner: UserId) -> Self {
        Self {
            id: DebtId::default(),
            owner,
            description: String::new(),
            amount: 0,
            due: None,
        }
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.due.is_some_and(|d| d < today)
    }
}
