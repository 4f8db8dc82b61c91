use crate::config::AppConfig;
use crate::services::ai::CompletionProvider;
use crate::services::backend::BookingBackend;
use crate::services::registry::SessionRegistry;

pub struct AppState {
    pub config: AppConfig,
    pub completion: Box<dyn CompletionProvider>,
    pub backend: Box<dyn BookingBackend>,
    pub sessions: SessionRegistry,
}
