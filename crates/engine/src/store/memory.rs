//! In-memory notification store.
//!
//! Not durable: all state is lost on restart. Used for local development when
//! no `DATABASE_URL` is configured, and by tests. Every mutation runs under the
//! write lock, which serializes `mark_sent` against `update_if_unsent`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use herald_common::error::AppError;
use herald_common::types::{Notification, NotificationFilter, NotificationPatch};

use super::NotificationStore;

#[derive(Clone, Default)]
pub struct InMemoryNotificationStore {
    notifications: Arc<RwLock<HashMap<Uuid, Notification>>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored notifications.
    pub async fn len(&self) -> usize {
        self.notifications.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.notifications.read().await.is_empty()
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn insert(&self, notification: &Notification) -> Result<(), AppError> {
        let mut notifications = self.notifications.write().await;
        if notifications.contains_key(&notification.id) {
            return Err(AppError::Conflict(format!(
                "Notification {} already exists",
                notification.id
            )));
        }
        notifications.insert(notification.id, notification.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Notification>, AppError> {
        Ok(self.notifications.read().await.get(&id).cloned())
    }

    async fn list(&self, filter: &NotificationFilter) -> Result<Vec<Notification>, AppError> {
        let notifications = self.notifications.read().await;
        let mut matching: Vec<Notification> = notifications
            .values()
            .filter(|n| filter.matches(n))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit() as usize)
            .collect())
    }

    async fn update_if_unsent(
        &self,
        id: Uuid,
        patch: NotificationPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Notification>, AppError> {
        let mut notifications = self.notifications.write().await;
        match notifications.get_mut(&id) {
            Some(notification) if !notification.is_sent => {
                patch.apply(notification, now);
                Ok(Some(notification.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<bool, AppError> {
        let mut notifications = self.notifications.write().await;
        match notifications.get_mut(&id) {
            Some(notification) if !notification.is_sent => {
                notification.is_sent = true;
                notification.sent_at = Some(sent_at);
                notification.updated_at = sent_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn query_due(&self, now: DateTime<Utc>) -> Result<Vec<Notification>, AppError> {
        let notifications = self.notifications.read().await;
        let mut due: Vec<Notification> = notifications
            .values()
            .filter(|n| n.is_due(now))
            .cloned()
            .collect();
        due.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(due)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use herald_common::types::NotificationType;

    fn make_notification(scheduled_for: Option<DateTime<Utc>>) -> Notification {
        let now = Utc::now();
        Notification {
            id: Uuid::new_v4(),
            title: "Title".to_string(),
            body: "Body".to_string(),
            created_at: now,
            updated_at: now,
            scheduled_for,
            is_sent: false,
            sent_at: None,
            notification_type: NotificationType::Broadcast,
            topic: None,
            target_user_ids: vec![],
            additional_data: None,
        }
    }

    fn patch(title: &str) -> NotificationPatch {
        NotificationPatch {
            title: title.to_string(),
            body: "Body".to_string(),
            scheduled_for: None,
            notification_type: NotificationType::Broadcast,
            topic: None,
            target_user_ids: vec![],
            additional_data: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryNotificationStore::new();
        let n = make_notification(None);
        store.insert(&n).await.unwrap();

        assert_eq!(store.get(n.id).await.unwrap(), Some(n.clone()));
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
        assert!(matches!(store.insert(&n).await, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_mark_sent_only_once() {
        let store = InMemoryNotificationStore::new();
        let n = make_notification(None);
        store.insert(&n).await.unwrap();

        let now = Utc::now();
        assert!(store.mark_sent(n.id, now).await.unwrap());
        assert!(!store.mark_sent(n.id, now).await.unwrap());
        assert!(!store.mark_sent(Uuid::new_v4(), now).await.unwrap());

        let stored = store.get(n.id).await.unwrap().unwrap();
        assert!(stored.is_sent);
        assert_eq!(stored.sent_at, Some(now));
    }

    #[tokio::test]
    async fn test_update_refused_after_sent() {
        let store = InMemoryNotificationStore::new();
        let n = make_notification(None);
        store.insert(&n).await.unwrap();

        let updated = store
            .update_if_unsent(n.id, patch("Edited"), Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "Edited");

        store.mark_sent(n.id, Utc::now()).await.unwrap();
        let refused = store
            .update_if_unsent(n.id, patch("Too late"), Utc::now())
            .await
            .unwrap();
        assert!(refused.is_none());
        assert_eq!(store.get(n.id).await.unwrap().unwrap().title, "Edited");
    }

    #[tokio::test]
    async fn test_query_due_excludes_future_and_sent() {
        let store = InMemoryNotificationStore::new();
        let now = Utc::now();

        let immediate = make_notification(None);
        let past = make_notification(Some(now - Duration::minutes(1)));
        let future = make_notification(Some(now + Duration::hours(1)));
        let sent = make_notification(None);

        for n in [&immediate, &past, &future, &sent] {
            store.insert(n).await.unwrap();
        }
        store.mark_sent(sent.id, now).await.unwrap();

        let due: Vec<Uuid> = store
            .query_due(now)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(due.len(), 2);
        assert!(due.contains(&immediate.id));
        assert!(due.contains(&past.id));
    }

    #[tokio::test]
    async fn test_list_filters_and_paginates() {
        let store = InMemoryNotificationStore::new();
        for _ in 0..5 {
            store.insert(&make_notification(None)).await.unwrap();
        }
        let sent = make_notification(None);
        store.insert(&sent).await.unwrap();
        store.mark_sent(sent.id, Utc::now()).await.unwrap();

        let unsent = store
            .list(&NotificationFilter {
                is_sent: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(unsent.len(), 5);

        let page = store
            .list(&NotificationFilter {
                limit: Some(2),
                offset: Some(4),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 2);

        let topics = store
            .list(&NotificationFilter {
                notification_type: Some(NotificationType::Topic),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(topics.is_empty());
    }
}
