use crate::error::PollError;
use crate::types::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinSession {
        name: String,
    },
    /// Ask whether `student_name` already voted on a poll (state recovery after reload)
    CheckMyVote {
        poll_id: PollId,
        student_name: String,
    },
    Vote {
        poll_id: PollId,
        student_name: String,
        option_index: usize,
    },
    RequestResults {
        poll_id: PollId,
    },
    ChatMessage {
        sender: String,
        text: String,
    },
    GetQueue,
    // Teacher-only messages
    CreatePoll {
        question: String,
        options: Vec<String>,
        duration: u32,
    },
    AddToQueue {
        question: String,
        options: Vec<String>,
        duration: u32,
    },
    LaunchQueuedPoll {
        poll_id: PollId,
    },
    /// Drop a queued poll without ever launching it
    DeleteQueuedPoll {
        poll_id: PollId,
    },
    KickStudent {
        student_name: String,
    },
    StopPoll,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Current poll state; `poll: null` means no poll is active
    PollUpdate {
        poll: Option<PollSnapshot>,
        server_now: DateTime<Utc>,
    },
    PollCreated {
        poll: PollSnapshot,
        server_now: DateTime<Utc>,
    },
    PollResultsUpdate {
        poll_id: PollId,
        votes: Tally,
    },
    QueueUpdate {
        queue: Vec<Poll>,
    },
    ParticipantsUpdate {
        participants: Vec<String>,
    },
    ChatMessage {
        sender: String,
        text: String,
    },
    /// Connections joined under `student_name` must end their session
    KickStudent {
        student_name: String,
    },
    StudentVoteStatus {
        poll_id: PollId,
        has_voted: bool,
        option_index: Option<usize>,
    },
    Error {
        code: String,
        msg: String,
    },
}

impl ServerMessage {
    /// `server_now` comes from the session clock so it agrees with `start_time`
    pub fn poll_update(poll: Option<PollSnapshot>, server_now: DateTime<Utc>) -> Self {
        ServerMessage::PollUpdate { poll, server_now }
    }

    pub fn poll_created(poll: PollSnapshot, server_now: DateTime<Utc>) -> Self {
        ServerMessage::PollCreated { poll, server_now }
    }

    pub fn error(code: &str, msg: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.to_string(),
            msg: msg.into(),
        }
    }
}

impl From<&PollError> for ServerMessage {
    fn from(err: &PollError) -> Self {
        ServerMessage::error(err.code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_wire_names() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"t":"join_session","name":"Alice"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::JoinSession {
                name: "Alice".to_string()
            }
        );

        let msg: ClientMessage = serde_json::from_str(
            r#"{"t":"vote","poll_id":"p1","student_name":"Bob","option_index":1}"#,
        )
        .unwrap();
        assert!(matches!(msg, ClientMessage::Vote { option_index: 1, .. }));

        let msg: ClientMessage = serde_json::from_str(r#"{"t":"stop_poll"}"#).unwrap();
        assert_eq!(msg, ClientMessage::StopPoll);
    }

    #[test]
    fn test_malformed_payloads_rejected() {
        // Missing options
        assert!(serde_json::from_str::<ClientMessage>(
            r#"{"t":"create_poll","question":"Q","duration":10}"#
        )
        .is_err());
        // Negative option index
        assert!(serde_json::from_str::<ClientMessage>(
            r#"{"t":"vote","poll_id":"p1","student_name":"Bob","option_index":-1}"#
        )
        .is_err());
        // Unknown command
        assert!(serde_json::from_str::<ClientMessage>(r#"{"t":"reset_everything"}"#).is_err());
    }

    #[test]
    fn test_cleared_poll_serializes_as_null() {
        let json = serde_json::to_value(ServerMessage::poll_update(None, Utc::now())).unwrap();
        assert_eq!(json["t"], "poll_update");
        assert!(json["poll"].is_null());
        assert!(json["server_now"].is_string());
    }

    #[test]
    fn test_error_from_poll_error() {
        let msg = ServerMessage::from(&PollError::TimeExpired);
        assert_eq!(
            msg,
            ServerMessage::Error {
                code: "TIME_EXPIRED".to_string(),
                msg: "Time expired".to_string(),
            }
        );
    }
}
