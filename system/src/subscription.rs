use crate::error::StoreError;
use crate::types::{ConnectionId, ShareId};
use std::collections::{BTreeSet, HashMap};
use std::num::Wrapping;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Unbound,
    Bound(ShareId),
}

/// Live viewers of one share id. Exists only while it has at least one connection.
#[derive(Debug)]
struct ShareSession {
    connections: BTreeSet<ConnectionId>,
}

impl ShareSession {
    fn new() -> Self {
        Self {
            connections: BTreeSet::new(),
        }
    }

    fn len(&self) -> usize {
        self.connections.len()
    }

    fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

/// Tracks which connection watches which share id. Nothing here is persisted.
pub struct SubscriptionManager {
    connection_id_source: Wrapping<ConnectionId>,
    connection_states: HashMap<ConnectionId, ConnectionState>,
    sessions: HashMap<ShareId, ShareSession>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self {
            connection_id_source: Wrapping(0),
            connection_states: HashMap::new(),
            sessions: HashMap::new(),
        }
    }

    pub fn connect(&mut self) -> ConnectionId {
        let connection_id = self.new_connection_id();
        self.connection_states
            .insert(connection_id, ConnectionState::Unbound);
        connection_id
    }

    /// Binds `connection_id` to `share_id`, replacing any earlier binding.
    /// Returns the share id it was bound to before.
    pub fn bind(
        &mut self,
        share_id: &ShareId,
        connection_id: ConnectionId,
    ) -> Result<Option<ShareId>, StoreError> {
        if !self.connection_states.contains_key(&connection_id) {
            return Err(StoreError::UnknownConnection(connection_id));
        }
        let previous = self.unbind(connection_id);

        self.sessions
            .entry(share_id.clone())
            .or_insert_with(ShareSession::new)
            .connections
            .insert(connection_id);
        self.connection_states
            .insert(connection_id, ConnectionState::Bound(share_id.clone()));

        log::info!(
            "Connection {} watching share {} ({} viewers)",
            connection_id,
            share_id,
            self.viewer_count(share_id)
        );
        Ok(previous)
    }

    /// Returns the share id the connection was bound to, if any.
    pub fn unbind(&mut self, connection_id: ConnectionId) -> Option<ShareId> {
        let state = self.connection_states.get_mut(&connection_id)?;
        let share_id = match std::mem::replace(state, ConnectionState::Unbound) {
            ConnectionState::Bound(share_id) => share_id,
            ConnectionState::Unbound => return None,
        };

        let now_empty = match self.sessions.get_mut(&share_id) {
            Some(session) => {
                session.connections.remove(&connection_id);
                session.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.sessions.remove(&share_id);
        }
        log::info!(
            "Connection {} stopped watching share {} ({} viewers left)",
            connection_id,
            share_id,
            self.viewer_count(&share_id)
        );
        Some(share_id)
    }

    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Option<ShareId> {
        let share_id = self.unbind(connection_id);
        self.connection_states.remove(&connection_id);
        share_id
    }

    pub fn subscribers_of(&self, share_id: &ShareId) -> Vec<ConnectionId> {
        self.sessions
            .get(share_id)
            .map(|s| s.connections.iter().copied().collect())
            .unwrap_or_default()
    }

    /// `None` means the connection is disconnected (or was never known).
    pub fn state_of(&self, connection_id: ConnectionId) -> Option<&ConnectionState> {
        self.connection_states.get(&connection_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connection_states.len()
    }

    fn viewer_count(&self, share_id: &ShareId) -> usize {
        self.sessions.get(share_id).map_or(0, |s| s.len())
    }

    fn new_connection_id(&mut self) -> ConnectionId {
        loop {
            self.connection_id_source += Wrapping(1);
            let candidate = self.connection_id_source.0;
            if !self.connection_states.contains_key(&candidate) {
                return candidate;
            }
        }
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_creates_session_lazily_and_removes_it_when_empty() {
        let mut manager = SubscriptionManager::new();
        let share_id = ShareId::from("s1");
        let a = manager.connect();
        let b = manager.connect();
        assert_eq!(manager.session_count(), 0);

        manager.bind(&share_id, a).unwrap();
        manager.bind(&share_id, b).unwrap();
        assert_eq!(manager.subscribers_of(&share_id), vec![a, b]);

        manager.unbind(a);
        assert_eq!(manager.subscribers_of(&share_id), vec![b]);
        manager.disconnect(b);
        assert_eq!(manager.session_count(), 0);
        assert!(manager.subscribers_of(&share_id).is_empty());
    }

    #[test]
    fn it_replaces_binding_on_rebind() {
        let mut manager = SubscriptionManager::new();
        let s1 = ShareId::from("s1");
        let s2 = ShareId::from("s2");
        let connection_id = manager.connect();

        assert_eq!(manager.bind(&s1, connection_id).unwrap(), None);
        assert_eq!(manager.bind(&s2, connection_id).unwrap(), Some(s1.clone()));

        assert!(manager.subscribers_of(&s1).is_empty());
        assert_eq!(manager.subscribers_of(&s2), vec![connection_id]);
        assert_eq!(
            manager.state_of(connection_id),
            Some(&ConnectionState::Bound(s2))
        );
    }

    #[test]
    fn it_walks_connection_state_machine() {
        let mut manager = SubscriptionManager::new();
        let share_id = ShareId::from("s1");
        let connection_id = manager.connect();
        assert_eq!(
            manager.state_of(connection_id),
            Some(&ConnectionState::Unbound)
        );

        manager.bind(&share_id, connection_id).unwrap();
        assert_eq!(manager.unbind(connection_id), Some(share_id.clone()));
        assert_eq!(manager.unbind(connection_id), None);
        assert_eq!(
            manager.state_of(connection_id),
            Some(&ConnectionState::Unbound)
        );

        manager.disconnect(connection_id);
        assert_eq!(manager.state_of(connection_id), None);
        assert!(matches!(
            manager.bind(&share_id, connection_id),
            Err(StoreError::UnknownConnection(_))
        ));
        assert_eq!(manager.connection_count(), 0);
    }
}
