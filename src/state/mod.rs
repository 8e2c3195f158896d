use std::sync::Arc;

use crate::realtime::session::SessionRegistry;
use crate::services::poll_service::PollService;
use crate::store::UserDirectory;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PollService>,
    pub users: Arc<dyn UserDirectory>,
    pub registry: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(
        service: Arc<PollService>,
        users: Arc<dyn UserDirectory>,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        AppState {
            service,
            users,
            registry,
        }
    }
}
