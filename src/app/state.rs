//! Application state shared across routes

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::config::Config;
use crate::game::WorldHandle;
use crate::util::time::unix_millis;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub world: WorldHandle,
    pub sessions: SessionRegistry,
    /// Pre-serialized `map` message sent to every new session
    pub map_message: Arc<String>,
}

impl AppState {
    pub fn new(config: Config, world: WorldHandle, map_message: String) -> Self {
        Self {
            config: Arc::new(config),
            world,
            sessions: SessionRegistry::new(),
            map_message: Arc::new(map_message),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SessionInfo {
    /// Unix millis
    pub connected_at: u64,
}

/// Connected websocket sessions
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<Uuid, SessionInfo>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session_id: Uuid) {
        self.sessions.insert(
            session_id,
            SessionInfo {
                connected_at: unix_millis(),
            },
        );
    }

    pub fn remove(&self, session_id: &Uuid) -> Option<SessionInfo> {
        self.sessions.remove(session_id).map(|(_, info)| info)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
