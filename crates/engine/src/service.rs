//! Notification service: validation, persistence and delivery orchestration.
//!
//! Request-facing operations (`create`, `update`, `get`, `list`) validate and
//! hand off to the store. `process_due_notifications` is the delivery entry
//! point driven by the scheduler:
//! 1. Load the due set (bounded by the store timeout; failure is cycle-fatal)
//! 2. Dispatch each notification to the provider (bounded by the dispatch timeout)
//! 3. Mark successfully dispatched notifications as sent
//! 4. Record failures (errors, timeouts and panics) in the report and leave
//!    those notifications due for the next cycle

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use herald_common::error::AppError;
use herald_common::types::{Notification, NotificationFilter, NotificationRequest};
use herald_notifier::{DeliveryError, DeliveryProvider, DispatchRequest};

use crate::store::NotificationStore;
use crate::validation::validate_request;

/// Default upper bound on a single provider call.
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Default upper bound on the due-set query.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// A notification that could not be delivered in this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchFailure {
    pub notification_id: Uuid,
    pub reason: String,
}

/// Outcome of one `process_due_notifications` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessingReport {
    /// Notifications handed to the provider.
    pub attempted: u32,
    /// Delivered and marked sent.
    pub succeeded: u32,
    /// Provider failure, timeout, or a store error while marking sent.
    pub failed: u32,
    /// Delivered, but already marked sent (or removed) by someone else.
    pub skipped: u32,
    pub failures: Vec<DispatchFailure>,
}

impl ProcessingReport {
    /// Nothing was due.
    pub fn is_idle(&self) -> bool {
        self.attempted == 0
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    fn record_failure(&mut self, notification_id: Uuid, reason: String) {
        self.failed += 1;
        self.failures.push(DispatchFailure {
            notification_id,
            reason,
        });
    }
}

/// Service layer for notifications.
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    provider: Arc<dyn DeliveryProvider>,
    dispatch_timeout: Duration,
    store_timeout: Duration,
    /// Held for the duration of a delivery cycle; scheduled and manual cycles never overlap.
    cycle_lock: Arc<Mutex<()>>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn NotificationStore>, provider: Arc<dyn DeliveryProvider>) -> Self {
        Self {
            store,
            provider,
            dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            cycle_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_timeouts(mut self, dispatch_timeout: Duration, store_timeout: Duration) -> Self {
        self.dispatch_timeout = dispatch_timeout;
        self.store_timeout = store_timeout;
        self
    }

    /// Validate and persist a new notification.
    pub async fn create(&self, request: &NotificationRequest) -> Result<Notification, AppError> {
        let patch = validate_request(request)?;
        let now = Utc::now();

        let notification = Notification {
            id: Uuid::new_v4(),
            title: patch.title,
            body: patch.body,
            created_at: now,
            updated_at: now,
            scheduled_for: patch.scheduled_for,
            is_sent: false,
            sent_at: None,
            notification_type: patch.notification_type,
            topic: patch.topic,
            target_user_ids: patch.target_user_ids,
            additional_data: patch.additional_data,
        };

        self.store.insert(&notification).await?;

        tracing::info!(
            notification_id = %notification.id,
            notification_type = %notification.notification_type,
            scheduled_for = ?notification.scheduled_for,
            "Notification created"
        );

        Ok(notification)
    }

    /// Replace the mutable fields of a notification that has not been sent yet.
    pub async fn update(
        &self,
        id: Uuid,
        request: &NotificationRequest,
    ) -> Result<Notification, AppError> {
        let existing = self.get(id).await?;
        if existing.is_sent {
            return Err(Self::already_sent(id));
        }

        let patch = validate_request(request)?;

        // The row may have been sent between the read above and this write.
        let updated = self
            .store
            .update_if_unsent(id, patch, Utc::now())
            .await?
            .ok_or_else(|| Self::already_sent(id))?;

        tracing::info!(notification_id = %id, "Notification updated");

        Ok(updated)
    }

    /// Get a single notification by ID.
    pub async fn get(&self, id: Uuid) -> Result<Notification, AppError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", id)))
    }

    pub async fn list(&self, filter: &NotificationFilter) -> Result<Vec<Notification>, AppError> {
        self.store.list(filter).await
    }

    /// Current due set, in dispatch order.
    pub async fn due_notifications(&self) -> Result<Vec<Notification>, AppError> {
        let now = Utc::now();
        let mut due = match tokio::time::timeout(self.store_timeout, self.store.query_due(now)).await
        {
            Ok(Ok(due)) => due,
            Ok(Err(e)) => return Err(AppError::StoreUnavailable(e.to_string())),
            Err(_) => {
                return Err(AppError::StoreUnavailable(format!(
                    "due-set query timed out after {:?}",
                    self.store_timeout
                )));
            }
        };

        due.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(due)
    }

    /// Deliver every due notification once.
    ///
    /// Per-notification failures are contained and reported; only a failure to
    /// load the due set is returned as an error (`StoreUnavailable`).
    pub async fn process_due_notifications(&self) -> Result<ProcessingReport, AppError> {
        let _cycle = self.cycle_lock.lock().await;
        let due = self.due_notifications().await?;
        let mut report = ProcessingReport::default();

        for notification in &due {
            report.attempted += 1;

            if let Err(e) = self.dispatch_one(notification).await {
                tracing::warn!(
                    notification_id = %notification.id,
                    provider = self.provider.name(),
                    error = %e,
                    "Notification dispatch failed, will retry next cycle"
                );
                report.record_failure(notification.id, e.to_string());
                continue;
            }

            match self.store.mark_sent(notification.id, Utc::now()).await {
                Ok(true) => {
                    report.succeeded += 1;
                    tracing::info!(
                        notification_id = %notification.id,
                        audience = %notification.audience(),
                        "Notification sent"
                    );
                }
                Ok(false) => {
                    report.skipped += 1;
                    tracing::warn!(
                        notification_id = %notification.id,
                        "Notification was already sent or removed before it could be marked"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        notification_id = %notification.id,
                        error = %e,
                        "Failed to mark notification as sent"
                    );
                    report.record_failure(notification.id, format!("mark sent: {}", e));
                }
            }
        }

        Ok(report)
    }

    /// Dispatch on its own task so a panicking provider fails only this item.
    async fn dispatch_one(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let request = DispatchRequest::from(notification);
        let provider = self.provider.clone();
        let mut task = tokio::spawn(async move { provider.dispatch(&request).await });

        match tokio::time::timeout(self.dispatch_timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(DeliveryError::Aborted(e.to_string())),
            Err(_) => {
                task.abort();
                Err(DeliveryError::Timeout(self.dispatch_timeout))
            }
        }
    }

    fn already_sent(id: Uuid) -> AppError {
        AppError::Conflict(format!(
            "Notification {} has already been sent and can no longer be modified",
            id
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use herald_common::types::NotificationType;

    use crate::store::InMemoryNotificationStore;

    /// Provider that counts calls and fails every title containing "fail".
    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicU32,
    }

    #[async_trait]
    impl DeliveryProvider for CountingProvider {
        async fn dispatch(&self, request: &DispatchRequest) -> Result<(), DeliveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if request.title.contains("fail") {
                Err(DeliveryError::Rejected("scripted failure".to_string()))
            } else {
                Ok(())
            }
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn broadcast(title: &str) -> NotificationRequest {
        NotificationRequest {
            title: title.to_string(),
            body: "body".to_string(),
            scheduled_for: None,
            notification_type: NotificationType::Broadcast,
            topic: None,
            target_user_ids: None,
            additional_data: None,
        }
    }

    fn service() -> (NotificationService, Arc<CountingProvider>) {
        let provider = Arc::new(CountingProvider::default());
        let service = NotificationService::new(
            Arc::new(InMemoryNotificationStore::new()),
            provider.clone(),
        );
        (service, provider)
    }

    #[tokio::test]
    async fn test_create_assigns_identity_and_unsent_state() {
        let (service, _) = service();
        let n = service.create(&broadcast("hello")).await.unwrap();
        assert!(!n.is_sent);
        assert!(n.sent_at.is_none());
        assert_eq!(n.created_at, n.updated_at);
        assert_eq!(service.get(n.id).await.unwrap(), n);
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let (service, _) = service();
        assert!(matches!(
            service.get(Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_report_counts() {
        let (service, provider) = service();
        service.create(&broadcast("ok 1")).await.unwrap();
        service.create(&broadcast("please fail")).await.unwrap();
        service.create(&broadcast("ok 2")).await.unwrap();

        let report = service.process_due_notifications().await.unwrap();
        assert_eq!(report.attempted, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 0);
        assert!(report.has_failures());
        assert!(!report.is_idle());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_empty_due_set_is_idle() {
        let (service, provider) = service();
        let report = service.process_due_notifications().await.unwrap();
        assert!(report.is_idle());
        assert!(!report.has_failures());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
