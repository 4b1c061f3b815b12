use super::PollStore;
use crate::error::{StoreError, StoreResult};
use crate::types::{Poll, PollStatus, Vote};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct Records {
    /// Kept in insertion order so queue reads are FIFO
    polls: Vec<Poll>,
    votes: Vec<Vote>,
}

/// Process-local store, used in tests and as the fallback when SQLite
/// cannot be opened.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Records>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with `StoreError::Unavailable` (outage simulation)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "memory store switched off".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl PollStore for MemoryStore {
    async fn insert_poll(&self, poll: &Poll) -> StoreResult<()> {
        self.check_available()?;
        let mut records = self.records.write().await;
        if records.polls.iter().any(|p| p.id == poll.id) {
            return Err(StoreError::Corrupt(format!("duplicate poll id {}", poll.id)));
        }
        records.polls.push(poll.clone());
        Ok(())
    }

    async fn get_poll(&self, id: &str) -> StoreResult<Option<Poll>> {
        self.check_available()?;
        let records = self.records.read().await;
        Ok(records.polls.iter().find(|p| p.id == id).cloned())
    }

    async fn update_poll(&self, poll: &Poll) -> StoreResult<bool> {
        self.check_available()?;
        let mut records = self.records.write().await;
        match records.polls.iter_mut().find(|p| p.id == poll.id) {
            Some(existing) => {
                existing.status = poll.status;
                existing.start_time = poll.start_time;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_poll(&self, id: &str) -> StoreResult<bool> {
        self.check_available()?;
        let mut records = self.records.write().await;
        let before = records.polls.len();
        records.polls.retain(|p| p.id != id);
        let removed = records.polls.len() != before;
        if removed {
            records.votes.retain(|v| v.poll_id != id);
        }
        Ok(removed)
    }

    async fn polls_with_status(&self, status: PollStatus) -> StoreResult<Vec<Poll>> {
        self.check_available()?;
        let records = self.records.read().await;
        Ok(records
            .polls
            .iter()
            .filter(|p| p.status == status)
            .cloned()
            .collect())
    }

    async fn all_polls(&self) -> StoreResult<Vec<Poll>> {
        self.check_available()?;
        Ok(self.records.read().await.polls.clone())
    }

    async fn insert_vote(&self, vote: &Vote) -> StoreResult<()> {
        self.check_available()?;
        // Check and insert under one write lock so racing voters cannot both pass
        let mut records = self.records.write().await;
        if records
            .votes
            .iter()
            .any(|v| v.poll_id == vote.poll_id && v.voter_name == vote.voter_name)
        {
            return Err(StoreError::DuplicateVote {
                poll_id: vote.poll_id.clone(),
                voter: vote.voter_name.clone(),
            });
        }
        records.votes.push(vote.clone());
        Ok(())
    }

    async fn votes_for_poll(&self, poll_id: &str) -> StoreResult<Vec<Vote>> {
        self.check_available()?;
        let records = self.records.read().await;
        Ok(records
            .votes
            .iter()
            .filter(|v| v.poll_id == poll_id)
            .cloned()
            .collect())
    }

    async fn find_vote(&self, poll_id: &str, voter_name: &str) -> StoreResult<Option<Vote>> {
        self.check_available()?;
        let records = self.records.read().await;
        Ok(records
            .votes
            .iter()
            .find(|v| v.poll_id == poll_id && v.voter_name == voter_name)
            .cloned())
    }
}
