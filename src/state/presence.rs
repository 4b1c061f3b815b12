//! Presence: which connection is joined under which display name.

use super::AppState;
use crate::types::ConnectionId;

#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub connection_id: ConnectionId,
    pub name: String,
}

/// Live participants in join order. Names are not unique: two connections
/// may join under the same name and are tracked independently.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    participants: Vec<Participant>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to a connection, replacing any name it had before
    pub fn join(&mut self, connection_id: &str, name: String) {
        match self
            .participants
            .iter_mut()
            .find(|p| p.connection_id == connection_id)
        {
            Some(existing) => existing.name = name,
            None => self.participants.push(Participant {
                connection_id: connection_id.to_string(),
                name,
            }),
        }
    }

    /// Drop a connection, returning the name it was joined under
    pub fn remove(&mut self, connection_id: &str) -> Option<String> {
        let index = self
            .participants
            .iter()
            .position(|p| p.connection_id == connection_id)?;
        Some(self.participants.remove(index).name)
    }

    /// Drop every connection joined under `name`, returning their ids
    pub fn remove_by_name(&mut self, name: &str) -> Vec<ConnectionId> {
        let mut removed = Vec::new();
        self.participants.retain(|p| {
            if p.name == name {
                removed.push(p.connection_id.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn list(&self) -> Vec<String> {
        self.participants.iter().map(|p| p.name.clone()).collect()
    }

    pub fn name_of(&self, connection_id: &str) -> Option<&str> {
        self.participants
            .iter()
            .find(|p| p.connection_id == connection_id)
            .map(|p| p.name.as_str())
    }

    /// Number of entries not joined under `name`
    pub fn count_excluding(&self, name: &str) -> usize {
        self.participants.iter().filter(|p| p.name != name).count()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

impl AppState {
    pub async fn join_session(&self, connection_id: &str, name: String) {
        tracing::info!("Connection {} joined as {}", connection_id, name);
        self.presence.write().await.join(connection_id, name);
    }

    pub async fn leave_session(&self, connection_id: &str) -> Option<String> {
        self.presence.write().await.remove(connection_id)
    }

    /// Socket closed: drop its presence entry and tell everyone, if it had joined
    pub async fn disconnect(&self, connection_id: &str) -> Option<String> {
        let name = self.leave_session(connection_id).await?;
        tracing::info!("{} left the session", name);
        self.broadcast_participants().await;
        Some(name)
    }

    /// Remove every participant joined under `name`; returns how many were removed
    pub async fn kick(&self, name: &str) -> usize {
        let removed = self.presence.write().await.remove_by_name(name);
        tracing::info!("Kicked {} ({} connections)", name, removed.len());
        removed.len()
    }

    pub async fn participants(&self) -> Vec<String> {
        self.presence.read().await.list()
    }

    pub async fn participant_name(&self, connection_id: &str) -> Option<String> {
        self.presence
            .read()
            .await
            .name_of(connection_id)
            .map(str::to_string)
    }

    /// Participants other than the presenter, used for the all-voted check
    pub async fn student_count(&self) -> usize {
        self.presence
            .read()
            .await
            .count_excluding(&self.config.presenter_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ServerMessage;

    #[test]
    fn test_join_is_upsert_by_connection() {
        let mut registry = PresenceRegistry::new();
        registry.join("c1", "Alice".to_string());
        registry.join("c2", "Bob".to_string());
        registry.join("c1", "Alicia".to_string());

        assert_eq!(registry.list(), vec!["Alicia", "Bob"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_same_name_on_two_connections() {
        let mut registry = PresenceRegistry::new();
        registry.join("c1", "Alice".to_string());
        registry.join("c2", "Alice".to_string());
        registry.join("c3", "Bob".to_string());
        assert_eq!(registry.list(), vec!["Alice", "Alice", "Bob"]);

        let removed = registry.remove_by_name("Alice");
        assert_eq!(removed, vec!["c1".to_string(), "c2".to_string()]);
        assert_eq!(registry.list(), vec!["Bob"]);
    }

    #[test]
    fn test_remove_by_connection() {
        let mut registry = PresenceRegistry::new();
        registry.join("c1", "Alice".to_string());

        assert_eq!(registry.remove("c1"), Some("Alice".to_string()));
        assert_eq!(registry.remove("c1"), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_count_excluding_presenter() {
        let mut registry = PresenceRegistry::new();
        registry.join("t", "Teacher (Host)".to_string());
        registry.join("c1", "Alice".to_string());
        registry.join("c2", "Bob".to_string());

        assert_eq!(registry.count_excluding("Teacher (Host)"), 2);
        assert_eq!(registry.name_of("t"), Some("Teacher (Host)"));
    }

    #[tokio::test]
    async fn test_disconnect_broadcasts_remaining_participants() {
        let state = AppState::new();
        state.join_session("c1", "Alice".to_string()).await;
        state.join_session("c2", "Bob".to_string()).await;
        let mut rx = state.broadcast.subscribe();

        assert_eq!(state.disconnect("c1").await, Some("Alice".to_string()));
        assert_eq!(
            rx.try_recv().unwrap(),
            ServerMessage::ParticipantsUpdate {
                participants: vec!["Bob".to_string()]
            }
        );
        assert_eq!(state.participants().await, vec!["Bob"]);
    }

    #[tokio::test]
    async fn test_disconnect_of_unjoined_socket_is_silent() {
        let state = AppState::new();
        state.join_session("c1", "Alice".to_string()).await;
        let mut rx = state.broadcast.subscribe();

        // Never joined, or already removed by a kick
        assert!(state.disconnect("spectator").await.is_none());
        state.kick("Alice").await;
        assert!(state.disconnect("c1").await.is_none());

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_rejoin_after_kick_allowed() {
        let state = AppState::new();
        state.join_session("c1", "Alice".to_string()).await;
        assert_eq!(state.kick("Alice").await, 1);
        assert!(state.participants().await.is_empty());

        state.join_session("c2", "Alice".to_string()).await;
        assert_eq!(state.participants().await, vec!["Alice"]);
        assert_eq!(state.student_count().await, 1);
    }
}
