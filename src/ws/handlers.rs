//! WebSocket message dispatch
//!
//! Every inbound command is matched here exactly once. Presenter commands are
//! authorized before they reach the role-specific handler modules.

use crate::error::PollError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::{PollDraft, Role};
use std::sync::Arc;

use super::{participant, presenter, Connection};

/// Macro to check presenter authorization and return early if unauthorized
macro_rules! check_teacher {
    ($conn:expr, $action:expr) => {
        if $conn.role != Role::Teacher {
            tracing::info!("Connection {} tried to {} without teacher role", $conn.id, $action);
            return Some(ServerMessage::error(
                "UNAUTHORIZED",
                format!("Only the teacher can {}", $action),
            ));
        }
    };
}

/// Handle client messages and return optional response for the sender
pub async fn handle_message(
    msg: ClientMessage,
    conn: &Connection,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        // Participant messages
        ClientMessage::JoinSession { name } => {
            participant::handle_join_session(state, conn, name).await
        }

        ClientMessage::CheckMyVote {
            poll_id,
            student_name,
        } => participant::handle_check_my_vote(state, poll_id, student_name).await,

        ClientMessage::Vote {
            poll_id,
            student_name,
            option_index,
        } => participant::handle_vote(state, poll_id, student_name, option_index).await,

        ClientMessage::RequestResults { poll_id } => {
            participant::handle_request_results(state, poll_id).await
        }

        ClientMessage::ChatMessage { sender, text } => {
            participant::handle_chat_message(state, sender, text)
        }

        ClientMessage::GetQueue => presenter::handle_get_queue(state).await,

        // Teacher-only commands
        ClientMessage::CreatePoll {
            question,
            options,
            duration,
        } => {
            check_teacher!(conn, "create polls");
            let draft = PollDraft {
                question,
                options,
                duration,
            };
            presenter::handle_create_poll(state, draft).await
        }

        ClientMessage::AddToQueue {
            question,
            options,
            duration,
        } => {
            check_teacher!(conn, "queue polls");
            let draft = PollDraft {
                question,
                options,
                duration,
            };
            presenter::handle_add_to_queue(state, draft).await
        }

        ClientMessage::LaunchQueuedPoll { poll_id } => {
            check_teacher!(conn, "launch polls");
            presenter::handle_launch_queued_poll(state, poll_id).await
        }

        ClientMessage::DeleteQueuedPoll { poll_id } => {
            check_teacher!(conn, "delete queued polls");
            presenter::handle_delete_queued_poll(state, poll_id).await
        }

        ClientMessage::KickStudent { student_name } => {
            check_teacher!(conn, "kick students");
            presenter::handle_kick_student(state, student_name).await
        }

        ClientMessage::StopPoll => {
            check_teacher!(conn, "stop polls");
            presenter::handle_stop_poll(state).await
        }
    }
}

/// Log a rejected command and turn it into an error reply for the sender
pub(super) fn reject(action: &str, err: &PollError) -> Option<ServerMessage> {
    match err {
        PollError::Store(e) => tracing::error!("Failed to {}: {}", action, e),
        _ => tracing::info!("Rejected {}: {}", action, err),
    }
    Some(ServerMessage::from(err))
}
