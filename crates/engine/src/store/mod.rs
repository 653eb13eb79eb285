//! Notification persistence.
//!
//! `NotificationStore` is the contract the service and scheduler depend on.
//! Implementations must make `mark_sent` and `update_if_unsent` atomic per
//! notification: once a notification is observed as sent, no update may land
//! on it, and it is never marked sent twice.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use herald_common::error::AppError;
use herald_common::types::{Notification, NotificationFilter, NotificationPatch};

pub use memory::InMemoryNotificationStore;
pub use postgres::PgNotificationStore;

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Persist a new notification.
    async fn insert(&self, notification: &Notification) -> Result<(), AppError>;

    /// Fetch a notification by id.
    async fn get(&self, id: Uuid) -> Result<Option<Notification>, AppError>;

    /// List notifications matching `filter`, newest first.
    async fn list(&self, filter: &NotificationFilter) -> Result<Vec<Notification>, AppError>;

    /// Overwrite the mutable fields of an unsent notification.
    ///
    /// Returns `None` if the notification does not exist or is already sent.
    async fn update_if_unsent(
        &self,
        id: Uuid,
        patch: NotificationPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Notification>, AppError>;

    /// Flip `is_sent` to true. Returns `false` if absent or already sent.
    async fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<bool, AppError>;

    /// All unsent notifications whose schedule is empty or `<= now`.
    async fn query_due(&self, now: DateTime<Utc>) -> Result<Vec<Notification>, AppError>;
}
