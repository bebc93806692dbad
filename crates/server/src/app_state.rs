use server_api::ApiContext;
use shared::protocol::ServerEvent;
use tokio::sync::broadcast;

use crate::session::SessionConfig;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    pub(crate) sessions: SessionConfig,
    pub(crate) events: broadcast::Sender<ServerEvent>,
}

impl AppState {
    pub(crate) fn publish(&self, event: ServerEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }
}
