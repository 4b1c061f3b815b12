mod poll;
mod presence;
mod queue;

pub use poll::{ActiveProgress, PollManager};
pub use presence::{Participant, PresenceRegistry};

use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::error::PollResult;
use crate::protocol::ServerMessage;
use crate::store::{MemoryStore, PollStore};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Shared session state
pub struct AppState {
    /// Owns the single active-poll slot and the queue
    pub polls: PollManager,
    pub presence: RwLock<PresenceRegistry>,
    /// Fan-out channel; every connection subscribes and forwards in send order
    pub broadcast: broadcast::Sender<ServerMessage>,
    pub config: SessionConfig,
}

impl AppState {
    /// In-memory state with default settings
    pub fn new() -> Self {
        Self::with_store(
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
            SessionConfig::default(),
        )
    }

    pub fn with_store(
        store: Arc<dyn PollStore>,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
    ) -> Self {
        let (tx, _rx) = broadcast::channel(config.broadcast_capacity);
        Self {
            polls: PollManager::new(store, clock, tx.clone()),
            presence: RwLock::new(PresenceRegistry::new()),
            broadcast: tx,
            config,
        }
    }

    pub fn broadcast_to_all(&self, msg: ServerMessage) {
        // No subscribers is fine
        let _ = self.broadcast.send(msg);
    }

    pub async fn broadcast_participants(&self) {
        let participants = self.participants().await;
        self.broadcast_to_all(ServerMessage::ParticipantsUpdate { participants });
    }

    pub async fn broadcast_queue(&self) -> PollResult<()> {
        let queue = self.polls.queue().await?;
        self.broadcast_to_all(ServerMessage::QueueUpdate { queue });
        Ok(())
    }

    /// What a newly connected client needs before live events: the current
    /// poll (or none) and who is here
    pub async fn session_snapshot(&self) -> Vec<ServerMessage> {
        vec![
            ServerMessage::poll_update(self.polls.active_snapshot().await, self.polls.now()),
            ServerMessage::ParticipantsUpdate {
                participants: self.participants().await,
            },
        ]
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
