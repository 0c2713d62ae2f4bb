use std::sync::Arc;

use application::PresenceService;

#[derive(Clone)]
pub struct AppState {
    pub presence_service: Arc<PresenceService>,
}

impl AppState {
    pub fn new(presence_service: Arc<PresenceService>) -> Self {
        Self { presence_service }
    }
}
