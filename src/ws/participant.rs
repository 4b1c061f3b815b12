//! Handlers open to every connection

use super::{handlers::reject, Connection};
use crate::error::PollError;
use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::{PollId, Role};
use std::sync::Arc;

pub async fn handle_join_session(
    state: &Arc<AppState>,
    conn: &Connection,
    name: String,
) -> Option<ServerMessage> {
    let name = name.trim().to_string();
    if name.is_empty() {
        return reject(
            "join session",
            &PollError::Validation("Name cannot be blank".to_string()),
        );
    }

    state.join_session(&conn.id, name.clone()).await;
    state.broadcast_participants().await;

    // A reloaded student who already voted should see their locked-in answer
    if conn.role != Role::Student {
        return None;
    }
    let active = state.polls.active_snapshot().await?;
    match state.polls.vote_status(&active.id, &name).await {
        Ok(Some(option_index)) => Some(ServerMessage::StudentVoteStatus {
            poll_id: active.id,
            has_voted: true,
            option_index: Some(option_index),
        }),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!("Could not look up vote status for {}: {}", name, e);
            None
        }
    }
}

pub async fn handle_check_my_vote(
    state: &Arc<AppState>,
    poll_id: PollId,
    student_name: String,
) -> Option<ServerMessage> {
    match state.polls.vote_status(&poll_id, &student_name).await {
        Ok(option_index) => Some(ServerMessage::StudentVoteStatus {
            poll_id,
            has_voted: option_index.is_some(),
            option_index,
        }),
        Err(e) => reject("check vote", &e),
    }
}

pub async fn handle_vote(
    state: &Arc<AppState>,
    poll_id: PollId,
    student_name: String,
    option_index: usize,
) -> Option<ServerMessage> {
    match state
        .polls
        .add_vote(&poll_id, &student_name, option_index)
        .await
    {
        Ok(_) => {
            tracing::debug!("{} voted {} on poll {}", student_name, option_index, poll_id);
            Some(ServerMessage::StudentVoteStatus {
                poll_id,
                has_voted: true,
                option_index: Some(option_index),
            })
        }
        Err(e) => reject("vote", &e),
    }
}

pub async fn handle_request_results(
    state: &Arc<AppState>,
    poll_id: PollId,
) -> Option<ServerMessage> {
    match state.polls.get_poll_results(&poll_id).await {
        Ok(votes) => Some(ServerMessage::PollResultsUpdate { poll_id, votes }),
        Err(e) => reject("fetch results", &e),
    }
}

/// Chat is relayed as-is to everyone, sender included
pub fn handle_chat_message(
    state: &Arc<AppState>,
    sender: String,
    text: String,
) -> Option<ServerMessage> {
    state.broadcast_to_all(ServerMessage::ChatMessage { sender, text });
    None
}
