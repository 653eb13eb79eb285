//! Log-only delivery, used when no transport is configured.

use async_trait::async_trait;

use crate::{DeliveryError, DeliveryProvider, DispatchRequest};

pub struct LogProvider;

impl LogProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryProvider for LogProvider {
    async fn dispatch(&self, request: &DispatchRequest) -> Result<(), DeliveryError> {
        tracing::info!(
            notification_id = %request.notification_id,
            audience = %request.audience,
            title = %request.title,
            "Notification delivered to log"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
