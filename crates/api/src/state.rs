//! Shared application state for the Axum API server.

use std::sync::Arc;

use herald_common::config::AppConfig;
use herald_engine::service::NotificationService;

use crate::middleware::gate::PrefixRules;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub service: NotificationService,
    pub config: AppConfig,
    pub gate: Arc<PrefixRules>,
}

impl AppState {
    pub fn new(service: NotificationService, config: AppConfig) -> Self {
        let gate = Arc::new(PrefixRules::from_config(&config));
        Self {
            service,
            config,
            gate,
        }
    }
}
