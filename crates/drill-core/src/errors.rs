use crate::domain::DebtId;

/// Core error type.
///
/// Adapter crates map their specific errors into this type so the dispatcher
/// can tell user-facing failures from interruptions.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),

    #[error("debt {0} not found")]
    NotFound(DebtId),

    #[error("malformed callback token: {0:?}")]
    MalformedToken(String),

    #[error("callback token is {0} bytes, limit is 64")]
    TokenTooLong(usize),

    #[error("deadline exceeded after {0:?}")]
    Timeout(std::time::Duration),

    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Deadline or shutdown, as opposed to a real failure.
    pub fn is_interruption(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
