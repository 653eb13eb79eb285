//! Redis-backed delivery queue.
//!
//! Pushes each dispatch onto a Redis list (`LPUSH`) where channel-specific
//! transport workers (push, email, SMS) pick it up with `BRPOP`. A successful
//! push counts as a successful delivery from the scheduler's point of view.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::{DeliveryError, DeliveryProvider, DispatchRequest};

pub struct RedisQueueProvider {
    redis: ConnectionManager,
    queue_key: String,
}

impl RedisQueueProvider {
    pub fn new(redis: ConnectionManager, queue_key: String) -> Self {
        Self { redis, queue_key }
    }

    pub fn queue_key(&self) -> &str {
        &self.queue_key
    }
}

#[async_trait]
impl DeliveryProvider for RedisQueueProvider {
    async fn dispatch(&self, request: &DispatchRequest) -> Result<(), DeliveryError> {
        let payload = serde_json::to_string(request)?;

        // ConnectionManager is a cheap handle onto a shared multiplexed connection.
        let mut redis = self.redis.clone();
        let depth: u64 = redis
            .lpush(&self.queue_key, payload)
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        tracing::debug!(
            notification_id = %request.notification_id,
            queue = %self.queue_key,
            depth,
            "Notification queued for transport"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis_queue"
    }
}
