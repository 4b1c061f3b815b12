//! Queue of polls waiting to be launched, FIFO by creation order.

use super::poll::PollManager;
use crate::error::{PollError, PollResult};
use crate::types::*;

impl PollManager {
    /// Park a poll in the queue; it gets a start time only when launched
    pub async fn enqueue(&self, draft: PollDraft) -> PollResult<PollSnapshot> {
        self.create_poll(draft, PollStatus::Queued).await
    }

    /// Queued polls, oldest first
    pub async fn queue(&self) -> PollResult<Vec<Poll>> {
        Ok(self.store().polls_with_status(PollStatus::Queued).await?)
    }

    /// Launch a specific queued poll. It leaves the queue because its status changes.
    pub async fn launch(&self, poll_id: &str) -> PollResult<PollSnapshot> {
        self.activate_poll(poll_id).await
    }

    /// Remove a poll from the queue without launching it
    pub async fn delete_queued(&self, poll_id: &str) -> PollResult<()> {
        // Serialize with launches so a poll cannot be deleted mid-activation
        let _slot = self.active.lock().await;

        let poll = self
            .store()
            .get_poll(poll_id)
            .await?
            .ok_or_else(|| PollError::NotFound(poll_id.to_string()))?;
        if poll.status != PollStatus::Queued {
            return Err(PollError::InvalidTransition {
                id: poll.id,
                status: poll.status,
            });
        }

        if !self.store().delete_poll(poll_id).await? {
            return Err(PollError::NotFound(poll_id.to_string()));
        }
        tracing::info!("Deleted queued poll {}", poll_id);
        Ok(())
    }

    /// Launch the queue head, but only if `current` is still the active poll.
    ///
    /// Returns `None` when another trigger already moved on or the queue is empty,
    /// so repeated triggers for the same expiring poll advance at most once.
    pub async fn launch_next_after(&self, current: &str) -> PollResult<Option<PollSnapshot>> {
        let mut slot = self.active.lock().await;
        let still_current = slot
            .as_ref()
            .is_some_and(|active| active.poll.id == current);
        if !still_current {
            return Ok(None);
        }

        let Some(head) = self
            .store()
            .polls_with_status(PollStatus::Queued)
            .await?
            .into_iter()
            .next()
        else {
            return Ok(None);
        };

        self.activate_locked(&mut slot, &head.id).await.map(Some)
    }
}
