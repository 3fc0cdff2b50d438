//! Observer session management

use ballotbox_core::Timestamp;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Observer session identifier
pub type SessionId = Uuid;

/// A connected client eligible to receive broadcast events
#[derive(Debug, Clone)]
pub struct ObserverSession {
    pub id: SessionId,
    pub remote: Option<String>,
    pub connected_at: Timestamp,
    pub last_seen: Timestamp,
    /// Sequence of the last event handed to this session
    pub last_sequence: u64,
    pub delivered: u64,
}

impl ObserverSession {
    pub fn new(remote: Option<String>) -> Self {
        let now = Timestamp::now();
        Self {
            id: Uuid::new_v4(),
            remote,
            connected_at: now,
            last_seen: now,
            last_sequence: 0,
            delivered: 0,
        }
    }

    pub fn record_delivery(&mut self, sequence: u64) {
        self.last_sequence = sequence;
        self.delivered += 1;
        self.last_seen = Timestamp::now();
    }
}

/// Registry of currently connected observer sessions
pub struct ObserverRegistry {
    sessions: RwLock<HashMap<SessionId, ObserverSession>>,
    max_sessions: usize,
}

impl ObserverRegistry {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions,
        }
    }

    /// Add a session. Returns false when the registry is full.
    pub fn add_session(&self, session: ObserverSession) -> bool {
        let mut sessions = self.sessions.write();

        if sessions.len() >= self.max_sessions && !sessions.contains_key(&session.id) {
            return false;
        }

        sessions.insert(session.id, session);
        true
    }

    /// Remove a session
    pub fn remove_session(&self, id: &SessionId) -> Option<ObserverSession> {
        self.sessions.write().remove(id)
    }

    /// Get session info
    pub fn get_session(&self, id: &SessionId) -> Option<ObserverSession> {
        self.sessions.read().get(id).cloned()
    }

    pub fn record_delivery(&self, id: &SessionId, sequence: u64) {
        if let Some(session) = self.sessions.write().get_mut(id) {
            session.record_delivery(sequence);
        }
    }

    /// Number of connected sessions
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }
}

/// Shared observer registry
pub type SharedObserverRegistry = Arc<ObserverRegistry>;

/// Create a shared observer registry
pub fn create_observer_registry(max_sessions: usize) -> SharedObserverRegistry {
    Arc::new(ObserverRegistry::new(max_sessions))
}
