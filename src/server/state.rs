//! Server application state shared across handlers

use crate::config::SyncSettings;
use crate::generation::Orchestrator;
use crate::session::SessionRegistry;
use std::sync::Arc;

#[derive(Clone)]
pub struct ServerAppState {
    /// Live sessions by id
    pub sessions: Arc<SessionRegistry>,

    /// Starts generation runs for every session
    pub orchestrator: Orchestrator,

    /// Sync settings applied to new sessions
    pub sync_settings: SyncSettings,
}

impl ServerAppState {
    pub fn new(orchestrator: Orchestrator, sync_settings: SyncSettings) -> Self {
        Self {
            sessions: Arc::new(SessionRegistry::new()),
            orchestrator,
            sync_settings,
        }
    }
}
