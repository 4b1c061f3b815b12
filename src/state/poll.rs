//! Poll lifecycle: the single active-poll slot and its tally.

use crate::clock::Clock;
use crate::error::{PollError, PollResult};
use crate::protocol::ServerMessage;
use crate::store::PollStore;
use crate::types::*;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, MutexGuard};

/// The in-memory active poll. Its tally is what live clients see; persisted
/// votes are what history and restart recovery read.
#[derive(Debug, Clone)]
pub(super) struct ActivePoll {
    pub(super) poll: Poll,
    pub(super) tally: Tally,
}

/// What the auto-advance watcher needs to know about the active poll
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveProgress {
    pub poll_id: PollId,
    pub elapsed_secs: i64,
    pub duration_secs: u32,
    pub total_votes: u32,
}

pub struct PollManager {
    store: Arc<dyn PollStore>,
    clock: Arc<dyn Clock>,
    /// Poll transitions and tallies are sent here while the slot is still locked,
    /// so clients see them in the order they happened
    events: broadcast::Sender<ServerMessage>,
    /// Every transition into or out of `Active` happens with this lock held
    pub(super) active: Mutex<Option<ActivePoll>>,
}

pub(super) type Slot<'a> = MutexGuard<'a, Option<ActivePoll>>;

impl PollManager {
    pub fn new(
        store: Arc<dyn PollStore>,
        clock: Arc<dyn Clock>,
        events: broadcast::Sender<ServerMessage>,
    ) -> Self {
        Self {
            store,
            clock,
            events,
            active: Mutex::new(None),
        }
    }

    fn emit(&self, msg: ServerMessage) {
        // No subscribers is fine
        let _ = self.events.send(msg);
    }

    pub fn store(&self) -> &Arc<dyn PollStore> {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Restore the active poll after a restart.
    ///
    /// A poll whose window already closed while the server was down is marked
    /// completed instead of being served again.
    pub async fn load_active_poll(&self) -> PollResult<Option<PollSnapshot>> {
        let mut slot = self.active.lock().await;
        let now = self.now();

        let mut candidates = self.store.polls_with_status(PollStatus::Active).await?;
        candidates.sort_by_key(|p| p.start_time);
        let newest = candidates.pop();

        for stale in candidates {
            tracing::warn!("Completing extra active poll {} found at startup", stale.id);
            self.mark_completed(stale).await?;
        }

        let Some(poll) = newest else {
            *slot = None;
            return Ok(None);
        };

        if poll.start_time.is_none() || poll.is_expired(now) {
            tracing::info!("Active poll {} expired while offline, completing it", poll.id);
            self.mark_completed(poll).await?;
            *slot = None;
            return Ok(None);
        }

        let votes = self.store.votes_for_poll(&poll.id).await?;
        let tally = poll.tally_from(&votes);
        tracing::info!(
            "Resuming active poll {} with {} recorded votes",
            poll.id,
            votes.len()
        );
        let snapshot = poll.snapshot(tally.clone());
        *slot = Some(ActivePoll { poll, tally });
        Ok(Some(snapshot))
    }

    /// Create a poll, either launched immediately or parked in the queue.
    ///
    /// Launching pre-empts whatever poll is currently active.
    pub async fn create_poll(
        &self,
        draft: PollDraft,
        status: PollStatus,
    ) -> PollResult<PollSnapshot> {
        let draft = draft.normalize().map_err(PollError::Validation)?;
        let now = self.now();

        let mut poll = Poll {
            id: ulid::Ulid::new().to_string(),
            question: draft.question,
            options: draft.options,
            duration_secs: draft.duration,
            start_time: None,
            status: PollStatus::Queued,
            created_at: now,
        };

        match status {
            PollStatus::Queued => {
                self.store.insert_poll(&poll).await?;
                tracing::info!("Queued poll {}: {}", poll.id, poll.question);
                Ok(poll.snapshot(poll.empty_tally()))
            }
            PollStatus::Active => {
                let mut slot = self.active.lock().await;
                self.stop_locked(&mut slot).await?;

                poll.status = PollStatus::Active;
                poll.start_time = Some(now);
                self.store.insert_poll(&poll).await?;
                tracing::info!("Created active poll {}: {}", poll.id, poll.question);

                let snapshot = Self::install(&mut slot, poll);
                self.emit(ServerMessage::poll_created(snapshot.clone(), now));
                Ok(snapshot)
            }
            PollStatus::Completed => Err(PollError::Validation(
                "New polls must be active or queued".to_string(),
            )),
        }
    }

    /// Launch a queued poll, stopping the current one first
    pub async fn activate_poll(&self, poll_id: &str) -> PollResult<PollSnapshot> {
        let mut slot = self.active.lock().await;
        self.activate_locked(&mut slot, poll_id).await
    }

    pub(super) async fn activate_locked(
        &self,
        slot: &mut Slot<'_>,
        poll_id: &str,
    ) -> PollResult<PollSnapshot> {
        let mut poll = self
            .store
            .get_poll(poll_id)
            .await?
            .ok_or_else(|| PollError::NotFound(poll_id.to_string()))?;

        if poll.status != PollStatus::Queued {
            return Err(PollError::InvalidTransition {
                id: poll.id,
                status: poll.status,
            });
        }

        self.stop_locked(slot).await?;

        let now = self.now();
        poll.status = PollStatus::Active;
        poll.start_time = Some(now);
        if !self.store.update_poll(&poll).await? {
            return Err(PollError::NotFound(poll.id));
        }

        tracing::info!("Activated poll {}: {}", poll.id, poll.question);
        let snapshot = Self::install(slot, poll);
        self.emit(ServerMessage::poll_created(snapshot.clone(), now));
        Ok(snapshot)
    }

    /// Complete the active poll. Returns the id of the poll that was stopped.
    ///
    /// Clients are told to clear the poll even if nothing was running.
    pub async fn stop_poll(&self) -> PollResult<Option<PollId>> {
        let mut slot = self.active.lock().await;
        let stopped = self.stop_locked(&mut slot).await?;
        self.emit(ServerMessage::poll_update(None, self.now()));
        Ok(stopped)
    }

    async fn stop_locked(&self, slot: &mut Slot<'_>) -> PollResult<Option<PollId>> {
        let Some(active) = &**slot else {
            return Ok(None);
        };

        let poll = active.poll.clone();
        let id = poll.id.clone();
        self.mark_completed(poll).await?;
        **slot = None;

        tracing::info!("Stopped poll {}", id);
        Ok(Some(id))
    }

    async fn mark_completed(&self, mut poll: Poll) -> PollResult<()> {
        poll.status = PollStatus::Completed;
        self.store.update_poll(&poll).await?;
        Ok(())
    }

    fn install(slot: &mut Slot<'_>, poll: Poll) -> PollSnapshot {
        let tally = poll.empty_tally();
        let snapshot = poll.snapshot(tally.clone());
        **slot = Some(ActivePoll { poll, tally });
        snapshot
    }

    /// Record a vote on the active poll and return the updated live tally,
    /// which is also broadcast.
    pub async fn add_vote(
        &self,
        poll_id: &str,
        voter_name: &str,
        option_index: usize,
    ) -> PollResult<Tally> {
        let voter_name = voter_name.trim();
        if voter_name.is_empty() {
            return Err(PollError::Validation(
                "Voter name cannot be blank".to_string(),
            ));
        }

        // Held until the vote is stored so the poll cannot close underneath it
        let mut slot = self.active.lock().await;
        let now = self.now();
        let active = slot.as_mut().ok_or(PollError::NoActivePoll)?;

        if active.poll.id != poll_id {
            return Err(PollError::PollMismatch {
                expected: active.poll.id.clone(),
                got: poll_id.to_string(),
            });
        }
        if active.poll.is_expired(now) {
            return Err(PollError::TimeExpired);
        }
        if option_index >= active.poll.options.len() {
            return Err(PollError::Validation(format!(
                "Option {} does not exist",
                option_index
            )));
        }

        // Racing submissions from the same voter are settled by the store's unique constraint
        self.store
            .insert_vote(&Vote {
                poll_id: poll_id.to_string(),
                voter_name: voter_name.to_string(),
                option_index,
                cast_at: now,
            })
            .await?;

        *active.tally.entry(option_index).or_insert(0) += 1;
        let tally = active.tally.clone();
        self.emit(ServerMessage::PollResultsUpdate {
            poll_id: poll_id.to_string(),
            votes: tally.clone(),
        });
        Ok(tally)
    }

    /// Live tally for the active poll, aggregated votes for anything else
    pub async fn get_poll_results(&self, poll_id: &str) -> PollResult<Tally> {
        if let Some(tally) = self.live_tally(poll_id).await {
            return Ok(tally);
        }
        self.results_from_store(poll_id).await
    }

    async fn live_tally(&self, poll_id: &str) -> Option<Tally> {
        let slot = self.active.lock().await;
        slot.as_ref()
            .filter(|active| active.poll.id == poll_id)
            .map(|active| active.tally.clone())
    }

    async fn results_from_store(&self, poll_id: &str) -> PollResult<Tally> {
        let poll = self
            .store
            .get_poll(poll_id)
            .await?
            .ok_or_else(|| PollError::NotFound(poll_id.to_string()))?;
        let votes = self.store.votes_for_poll(poll_id).await?;
        Ok(poll.tally_from(&votes))
    }

    pub async fn active_snapshot(&self) -> Option<PollSnapshot> {
        let slot = self.active.lock().await;
        slot.as_ref()
            .map(|active| active.poll.snapshot(active.tally.clone()))
    }

    pub async fn active_progress(&self) -> Option<ActiveProgress> {
        let now = self.now();
        let slot = self.active.lock().await;
        let active = slot.as_ref()?;

        Some(ActiveProgress {
            poll_id: active.poll.id.clone(),
            elapsed_secs: active.poll.elapsed_secs(now).unwrap_or(0),
            duration_secs: active.poll.duration_secs,
            total_votes: active.tally.values().sum(),
        })
    }

    /// The option `voter_name` picked on a poll, if they voted
    pub async fn vote_status(&self, poll_id: &str, voter_name: &str) -> PollResult<Option<usize>> {
        let vote = self.store.find_vote(poll_id, voter_name.trim()).await?;
        Ok(vote.map(|v| v.option_index))
    }

    /// Every poll that has been launched, newest first, with its tally
    pub async fn history(&self) -> PollResult<Vec<PollSnapshot>> {
        let polls = self.store.all_polls().await?;
        let mut entries = Vec::new();

        for poll in polls.into_iter().filter(|p| p.status != PollStatus::Queued) {
            let tally = match self.live_tally(&poll.id).await {
                Some(tally) => tally,
                None => {
                    let votes = self.store.votes_for_poll(&poll.id).await?;
                    poll.tally_from(&votes)
                }
            };
            entries.push(poll.snapshot(tally));
        }

        entries.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(entries)
    }
}
