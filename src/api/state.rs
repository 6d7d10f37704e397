use std::sync::Arc;

use crate::chat::{CompletionGateway, SessionStore};
use crate::core::AppConfig;

pub struct AppState {
    pub config: AppConfig,
    // Stateless, shared by every session
    pub gateway: Arc<CompletionGateway>,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(config: AppConfig, gateway: Arc<CompletionGateway>) -> Self {
        Self {
            config,
            gateway,
            sessions: SessionStore::new(),
        }
    }
}
