//! Error taxonomy for poll operations and the durable store.

use crate::types::{PollId, PollStatus};
use thiserror::Error;

/// Failures reported by a [`crate::store::PollStore`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Unique (poll, voter) constraint violated
    #[error("{voter} already voted on poll {poll_id}")]
    DuplicateVote { poll_id: PollId, voter: String },

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Rejections from the poll lifecycle and queue operations.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("{0}")]
    Validation(String),

    #[error("No active poll")]
    NoActivePoll,

    #[error("Poll {got} is not the active poll ({expected})")]
    PollMismatch { expected: PollId, got: PollId },

    #[error("Time expired")]
    TimeExpired,

    #[error("You can only vote once")]
    AlreadyVoted,

    #[error("Poll {0} not found")]
    NotFound(PollId),

    #[error("Poll {id} is {status:?}")]
    InvalidTransition { id: PollId, status: PollStatus },

    #[error("Storage failure: {0}")]
    Store(StoreError),
}

impl From<StoreError> for PollError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateVote { .. } => PollError::AlreadyVoted,
            other => PollError::Store(other),
        }
    }
}

impl PollError {
    /// Stable code sent to clients in `error` replies
    pub fn code(&self) -> &'static str {
        match self {
            PollError::Validation(_) => "VALIDATION_ERROR",
            PollError::NoActivePoll => "NO_ACTIVE_POLL",
            PollError::PollMismatch { .. } => "POLL_MISMATCH",
            PollError::TimeExpired => "TIME_EXPIRED",
            PollError::AlreadyVoted => "ALREADY_VOTED",
            PollError::NotFound(_) => "NOT_FOUND",
            PollError::InvalidTransition { .. } => "INVALID_TRANSITION",
            PollError::Store(_) => "STORE_ERROR",
        }
    }
}

pub type PollResult<T> = Result<T, PollError>;
pub type StoreResult<T> = Result<T, StoreError>;
