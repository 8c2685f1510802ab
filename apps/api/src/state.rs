use crate::applications::service::ApplicationService;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub applications: ApplicationService,
    pub config: Config,
}
