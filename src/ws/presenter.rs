//! Teacher command handlers
//!
//! Authorization is checked in the dispatch layer before calling these,
//! except for `handle_get_queue`, which any connection may use.

use super::handlers::reject;
use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::{PollDraft, PollId, PollStatus};
use std::sync::Arc;

/// Broadcast the queue, logging instead of failing the command that changed it
async fn broadcast_queue(state: &Arc<AppState>) {
    if let Err(e) = state.broadcast_queue().await {
        tracing::error!("Failed to broadcast queue: {}", e);
    }
}

pub async fn handle_get_queue(state: &Arc<AppState>) -> Option<ServerMessage> {
    match state.polls.queue().await {
        Ok(queue) => Some(ServerMessage::QueueUpdate { queue }),
        Err(e) => reject("load queue", &e),
    }
}

/// The poll manager broadcasts `poll_created` itself
pub async fn handle_create_poll(state: &Arc<AppState>, draft: PollDraft) -> Option<ServerMessage> {
    match state.polls.create_poll(draft, PollStatus::Active).await {
        Ok(_) => None,
        Err(e) => reject("create poll", &e),
    }
}

pub async fn handle_add_to_queue(state: &Arc<AppState>, draft: PollDraft) -> Option<ServerMessage> {
    match state.polls.enqueue(draft).await {
        Ok(_) => {
            broadcast_queue(state).await;
            None
        }
        Err(e) => reject("queue poll", &e),
    }
}

pub async fn handle_launch_queued_poll(
    state: &Arc<AppState>,
    poll_id: PollId,
) -> Option<ServerMessage> {
    match state.polls.launch(&poll_id).await {
        Ok(_) => {
            broadcast_queue(state).await;
            None
        }
        Err(e) => reject("launch poll", &e),
    }
}

pub async fn handle_delete_queued_poll(
    state: &Arc<AppState>,
    poll_id: PollId,
) -> Option<ServerMessage> {
    match state.polls.delete_queued(&poll_id).await {
        Ok(()) => {
            broadcast_queue(state).await;
            None
        }
        Err(e) => reject("delete queued poll", &e),
    }
}

/// Drop every connection joined under the name. Votes already cast stay counted.
pub async fn handle_kick_student(
    state: &Arc<AppState>,
    student_name: String,
) -> Option<ServerMessage> {
    let student_name = student_name.trim().to_string();
    state.kick(&student_name).await;
    state.broadcast_to_all(ServerMessage::KickStudent { student_name });
    state.broadcast_participants().await;
    None
}

pub async fn handle_stop_poll(state: &Arc<AppState>) -> Option<ServerMessage> {
    match state.polls.stop_poll().await {
        Ok(_) => None,
        Err(e) => reject("stop poll", &e),
    }
}
