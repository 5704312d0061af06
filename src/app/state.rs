//! Application state shared across routes

use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::game::WorldHandle;

/// A connected WebSocket session
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub display_name: String,
    /// Unix millis when the socket was accepted
    pub connected_at: u64,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub world: WorldHandle,
    pub sessions: Arc<DashMap<Uuid, SessionInfo>>,
}

impl AppState {
    pub fn new(config: Config, world: WorldHandle) -> Self {
        Self {
            config: Arc::new(config),
            world,
            sessions: Arc::new(DashMap::new()),
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
