use std::sync::Arc;
use gobbler_core::{BatchService, Config, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    service: Arc<BatchService>,
}

impl AppState {
    pub fn new(config: Config, service: Arc<BatchService>) -> Self {
        Self { config, service }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn service(&self) -> &BatchService {
        self.service.as_ref()
    }
}
