//! Delivery providers.
//!
//! A provider takes a resolved notification (title, body, audience, extra data)
//! and hands it to a transport:
//! - `LogProvider` writes it to the application log
//! - `WebhookProvider` POSTs it as JSON, optionally HMAC-signed
//! - `RedisQueueProvider` pushes it onto a Redis list consumed by transport workers
//!
//! Providers report success or failure per call and never retry on their own.
//! Timeouts are owned by the caller.

pub mod log;
pub mod redis_queue;
pub mod webhook;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use herald_common::config::DeliveryBackend;
use herald_common::types::{Audience, Notification};

pub use log::LogProvider;
pub use redis_queue::RedisQueueProvider;
pub use webhook::WebhookProvider;

/// Errors raised by a single delivery attempt.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Delivery rejected: {0}")]
    Rejected(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Delivery timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Delivery task aborted: {0}")]
    Aborted(String),
}

/// Everything a transport needs to deliver one notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub notification_id: Uuid,
    pub title: String,
    pub body: String,
    pub audience: Audience,
    pub additional_data: Option<HashMap<String, String>>,
}

impl From<&Notification> for DispatchRequest {
    fn from(notification: &Notification) -> Self {
        Self {
            notification_id: notification.id,
            title: notification.title.clone(),
            body: notification.body.clone(),
            audience: notification.audience(),
            additional_data: notification.additional_data.clone(),
        }
    }
}

/// Transport that performs the actual delivery.
#[async_trait]
pub trait DeliveryProvider: Send + Sync {
    /// Deliver one notification. `Ok(())` means the transport accepted it.
    async fn dispatch(&self, request: &DispatchRequest) -> Result<(), DeliveryError>;

    /// Short provider name for logs.
    fn name(&self) -> &'static str;
}

/// Build the provider selected in configuration.
pub async fn from_config(
    backend: &DeliveryBackend,
    redis_url: &str,
) -> anyhow::Result<Arc<dyn DeliveryProvider>> {
    let provider: Arc<dyn DeliveryProvider> = match backend {
        DeliveryBackend::Log => Arc::new(LogProvider::new()),
        DeliveryBackend::Webhook { url, secret } => {
            Arc::new(WebhookProvider::new(url.clone(), secret.clone()))
        }
        DeliveryBackend::RedisQueue { queue_key } => {
            let redis = herald_common::redis_pool::create_redis_pool(redis_url).await?;
            Arc::new(RedisQueueProvider::new(redis, queue_key.clone()))
        }
    };

    tracing::info!(provider = provider.name(), "Delivery provider configured");
    Ok(provider)
}
