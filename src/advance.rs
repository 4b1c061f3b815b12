//! Auto-advance: launch the next queued poll once the active one is done.

use crate::state::AppState;
use crate::types::PollSnapshot;
use std::sync::Arc;
use std::time::Duration;

/// Every counted participant has a vote on record.
/// An empty room never counts as fully answered.
pub fn all_voted(total_votes: u32, participants: usize) -> bool {
    participants > 0 && total_votes as usize >= participants
}

/// Whether the active poll should give way to the queue head.
///
/// Nothing advances during the first `grace` after activation, so a client
/// whose clock runs ahead of the server cannot trigger a spurious launch.
pub fn should_advance(
    elapsed_secs: i64,
    duration_secs: u32,
    grace: Duration,
    total_votes: u32,
    participants: usize,
) -> bool {
    if elapsed_secs < 0 || (elapsed_secs as u64) < grace.as_secs() {
        return false;
    }
    elapsed_secs >= i64::from(duration_secs) || all_voted(total_votes, participants)
}

/// One evaluation of the trigger. Returns the poll it launched, if any.
pub async fn auto_advance_tick(state: &AppState) -> Option<PollSnapshot> {
    let progress = state.polls.active_progress().await?;
    let participants = state.student_count().await;

    if !should_advance(
        progress.elapsed_secs,
        progress.duration_secs,
        state.config.advance_grace,
        progress.total_votes,
        participants,
    ) {
        return None;
    }

    match state.polls.launch_next_after(&progress.poll_id).await {
        Ok(Some(next)) => {
            tracing::info!(
                "Auto-advanced from poll {} to {} ({}s elapsed, {}/{} voted)",
                progress.poll_id,
                next.id,
                progress.elapsed_secs,
                progress.total_votes,
                participants
            );
            if let Err(e) = state.broadcast_queue().await {
                tracing::error!("Failed to broadcast queue after auto-advance: {}", e);
            }
            Some(next)
        }
        Ok(None) => None,
        Err(e) => {
            tracing::error!("Auto-advance from poll {} failed: {}", progress.poll_id, e);
            None
        }
    }
}

/// Spawn the background watcher that drives [`auto_advance_tick`]
pub fn spawn_auto_advancer(state: Arc<AppState>) {
    tokio::spawn(async move {
        let interval = state.config.advance_interval;
        tracing::debug!("Auto-advance watcher running every {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;
            auto_advance_tick(&state).await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::SessionConfig;
    use crate::protocol::ServerMessage;
    use crate::store::MemoryStore;
    use crate::types::{PollDraft, PollStatus, Tally};

    const GRACE: Duration = Duration::from_secs(5);

    #[test]
    fn test_all_voted() {
        assert!(all_voted(3, 3));
        assert!(all_voted(4, 3));
        assert!(!all_voted(2, 3));
        assert!(!all_voted(0, 0));
    }

    #[test]
    fn test_should_advance_on_expiry() {
        assert!(!should_advance(29, 30, GRACE, 0, 10));
        assert!(should_advance(30, 30, GRACE, 0, 10));
        assert!(should_advance(45, 30, GRACE, 0, 0));
    }

    #[test]
    fn test_should_advance_when_everyone_voted() {
        assert!(should_advance(6, 60, GRACE, 2, 2));
        assert!(!should_advance(6, 60, GRACE, 1, 2));
    }

    #[test]
    fn test_grace_window_suppresses_advance() {
        // Short poll that is already "over" and fully answered
        assert!(!should_advance(2, 1, GRACE, 5, 5));
        assert!(!should_advance(-3, 1, GRACE, 5, 5));
        assert!(should_advance(5, 1, GRACE, 5, 5));
    }

    fn setup() -> (Arc<AppState>, ManualClock) {
        let clock = ManualClock::default();
        let state = AppState::with_store(
            Arc::new(MemoryStore::new()),
            Arc::new(clock.clone()),
            SessionConfig::default(),
        );
        (Arc::new(state), clock)
    }

    fn draft(question: &str, duration: u32) -> PollDraft {
        PollDraft {
            question: question.to_string(),
            options: vec!["A".to_string(), "B".to_string()],
            duration,
        }
    }

    #[tokio::test]
    async fn test_tick_launches_queue_head_after_expiry() {
        let (state, clock) = setup();
        let live = state
            .polls
            .create_poll(draft("Live", 10), PollStatus::Active)
            .await
            .unwrap();
        let next = state.polls.enqueue(draft("Next", 10)).await.unwrap();
        let mut rx = state.broadcast.subscribe();

        clock.advance_secs(9);
        assert!(auto_advance_tick(&state).await.is_none());

        clock.advance_secs(1);
        let launched = auto_advance_tick(&state).await.unwrap();
        assert_eq!(launched.id, next.id);
        assert_eq!(launched.votes, Tally::from([(0, 0), (1, 0)]));
        assert!(state.polls.queue().await.unwrap().is_empty());
        assert_ne!(state.polls.active_snapshot().await.unwrap().id, live.id);

        match rx.recv().await.unwrap() {
            ServerMessage::PollCreated { poll, .. } => assert_eq!(poll.id, next.id),
            other => panic!("Expected PollCreated, got {:?}", other),
        }
        assert_eq!(
            rx.recv().await.unwrap(),
            ServerMessage::QueueUpdate { queue: vec![] }
        );
    }

    #[tokio::test]
    async fn test_tick_advances_once_everyone_voted() {
        let (state, clock) = setup();
        let live = state
            .polls
            .create_poll(draft("Live", 60), PollStatus::Active)
            .await
            .unwrap();
        let next = state.polls.enqueue(draft("Next", 60)).await.unwrap();

        state.join_session("t", "Teacher (Host)".to_string()).await;
        state.join_session("c1", "Alice".to_string()).await;
        state.polls.add_vote(&live.id, "Alice", 0).await.unwrap();

        // Inside the grace window nothing happens even though Alice voted
        clock.advance_secs(2);
        assert!(auto_advance_tick(&state).await.is_none());

        clock.advance_secs(4);
        let launched = auto_advance_tick(&state).await.unwrap();
        assert_eq!(launched.id, next.id);
    }

    #[tokio::test]
    async fn test_tick_with_empty_queue_keeps_poll() {
        let (state, clock) = setup();
        let live = state
            .polls
            .create_poll(draft("Live", 10), PollStatus::Active)
            .await
            .unwrap();

        clock.advance_secs(20);
        assert!(auto_advance_tick(&state).await.is_none());
        assert_eq!(state.polls.active_snapshot().await.unwrap().id, live.id);
    }

    #[tokio::test]
    async fn test_repeated_ticks_advance_once() {
        let (state, clock) = setup();
        state
            .polls
            .create_poll(draft("Live", 10), PollStatus::Active)
            .await
            .unwrap();
        let second = state.polls.enqueue(draft("Second", 30)).await.unwrap();
        state.polls.enqueue(draft("Third", 30)).await.unwrap();

        clock.advance_secs(10);
        let first_tick = auto_advance_tick(&state).await.unwrap();
        assert_eq!(first_tick.id, second.id);

        // The freshly launched poll is inside its own grace window
        assert!(auto_advance_tick(&state).await.is_none());
        assert_eq!(state.polls.queue().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_tick_without_active_poll() {
        let (state, _clock) = setup();
        state.polls.enqueue(draft("Waiting", 10)).await.unwrap();
        assert!(auto_advance_tick(&state).await.is_none());
        assert_eq!(state.polls.queue().await.unwrap().len(), 1);
    }
}
