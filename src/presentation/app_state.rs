// Application state for HTTP handlers
use crate::application::pilot_service::PilotService;

#[derive(Clone)]
pub struct AppState {
    pub pilot: PilotService,
}
