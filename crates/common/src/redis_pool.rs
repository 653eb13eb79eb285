use redis::Client;
use redis::aio::ConnectionManager;

use crate::config::redact_url;

/// Open a reconnecting Redis connection for the delivery queue.
pub async fn create_redis_pool(redis_url: &str) -> anyhow::Result<ConnectionManager> {
    let client = Client::open(redis_url)?;
    let manager = ConnectionManager::new(client).await?;

    tracing::info!(redis = %redact_url(redis_url), "Connected to Redis");
    Ok(manager)
}
