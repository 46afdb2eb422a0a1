use crate::error::SimError;
use pingboard_model::MachineId;
use std::collections::HashMap;
use std::fmt;

/// Ordered (source, target) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey {
    pub from: MachineId,
    pub to: MachineId,
}

impl SessionKey {
    pub fn new(from: MachineId, to: MachineId) -> Self {
        Self { from, to }
    }

    pub fn touches(&self, id: MachineId) -> bool {
        self.from == id || self.to == id
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

/// A pair that has exchanged at least one ping run. Outlives its sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub key: SessionKey,
}

#[derive(Debug, Clone, Copy)]
struct SessionState {
    id: SessionId,
    active: bool,
}

#[derive(Debug)]
pub struct SessionTracker {
    sessions: HashMap<SessionKey, SessionState>,
    connections: Vec<Connection>,
    next_id: u64,
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self {
            sessions: HashMap::new(),
            connections: Vec::new(),
            next_id: 1,
        }
    }
}

impl SessionTracker {
    pub fn begin(&mut self, key: SessionKey) -> Result<SessionId, SimError> {
        if self.is_active(key) {
            return Err(SimError::AlreadyActive {
                from: key.from,
                to: key.to,
            });
        }
        let id = SessionId(self.next_id);
        self.next_id += 1;
        self.sessions.insert(key, SessionState { id, active: true });
        if !self.connections.iter().any(|conn| conn.key == key) {
            self.connections.push(Connection { key });
        }
        Ok(id)
    }

    /// Rolls back a session whose request never left the client.
    pub fn abort(&mut self, id: SessionId) {
        self.sessions.retain(|_, state| state.id != id);
    }

    /// The active session a backend event from `from` belongs to. An explicit
    /// id wins; otherwise the oldest active run of that source.
    pub fn resolve(&self, from: MachineId, session: Option<SessionId>) -> Option<SessionKey> {
        let mut candidates = self
            .sessions
            .iter()
            .filter(|(key, state)| state.active && key.from == from);
        match session {
            Some(id) => candidates
                .find(|(_, state)| state.id == id)
                .map(|(key, _)| *key),
            None => candidates
                .min_by_key(|(_, state)| state.id)
                .map(|(key, _)| *key),
        }
    }

    pub fn complete(&mut self, from: MachineId, session: Option<SessionId>) -> Option<SessionKey> {
        let key = self.resolve(from, session)?;
        if let Some(state) = self.sessions.get_mut(&key) {
            state.active = false;
        }
        Some(key)
    }

    /// Ends every active run without touching connections. Returns the
    /// released keys, sorted.
    pub fn release_all(&mut self) -> Vec<SessionKey> {
        let released = self.active_keys();
        for state in self.sessions.values_mut() {
            state.active = false;
        }
        released
    }

    pub fn is_active(&self, key: SessionKey) -> bool {
        self.sessions
            .get(&key)
            .map(|state| state.active)
            .unwrap_or(false)
    }

    pub fn active_keys(&self) -> Vec<SessionKey> {
        let mut keys: Vec<SessionKey> = self
            .sessions
            .iter()
            .filter(|(_, state)| state.active)
            .map(|(key, _)| *key)
            .collect();
        keys.sort();
        keys
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn forget_machine(&mut self, id: MachineId) {
        self.sessions.retain(|key, _| !key.touches(id));
        self.connections.retain(|conn| !conn.key.touches(id));
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
        self.connections.clear();
    }
}
