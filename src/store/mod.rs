//! Durable storage for polls and votes.
//!
//! The lifecycle manager only talks to [`PollStore`]; backends decide how
//! records are kept. Every backend must enforce uniqueness of
//! (poll id, voter name) itself and report violations as
//! [`StoreError::DuplicateVote`](crate::error::StoreError::DuplicateVote),
//! since concurrent vote submissions race past any application-level check.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::StoreResult;
use crate::types::{Poll, PollStatus, Vote};
use async_trait::async_trait;

#[async_trait]
pub trait PollStore: Send + Sync {
    async fn insert_poll(&self, poll: &Poll) -> StoreResult<()>;

    async fn get_poll(&self, id: &str) -> StoreResult<Option<Poll>>;

    /// Persist status and start time changes. Returns false if the poll is unknown.
    async fn update_poll(&self, poll: &Poll) -> StoreResult<bool>;

    /// Delete a poll and its votes. Returns false if the poll is unknown.
    async fn delete_poll(&self, id: &str) -> StoreResult<bool>;

    /// Polls in the given status, oldest insertion first
    async fn polls_with_status(&self, status: PollStatus) -> StoreResult<Vec<Poll>>;

    /// Every poll, oldest insertion first
    async fn all_polls(&self) -> StoreResult<Vec<Poll>>;

    async fn insert_vote(&self, vote: &Vote) -> StoreResult<()>;

    async fn votes_for_poll(&self, poll_id: &str) -> StoreResult<Vec<Vote>>;

    async fn find_vote(&self, poll_id: &str, voter_name: &str) -> StoreResult<Option<Vote>>;
}
