//! PostgreSQL notification store.
//!
//! The sent flag is flipped with a conditional `UPDATE ... WHERE is_sent = false`,
//! so concurrent `mark_sent` / `update_if_unsent` calls on the same row are
//! serialized by Postgres row locking and only one of them can win once the
//! row is sent.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use herald_common::error::AppError;
use herald_common::types::{Notification, NotificationFilter, NotificationPatch};

use super::NotificationStore;

/// Row shape of the `notifications` table.
#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    title: String,
    body: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    scheduled_for: Option<DateTime<Utc>>,
    is_sent: bool,
    sent_at: Option<DateTime<Utc>>,
    notification_type: String,
    topic: Option<String>,
    target_user_ids: Vec<String>,
    additional_data: Option<Json<HashMap<String, String>>>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = AppError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: row.id,
            title: row.title,
            body: row.body,
            created_at: row.created_at,
            updated_at: row.updated_at,
            scheduled_for: row.scheduled_for,
            is_sent: row.is_sent,
            sent_at: row.sent_at,
            notification_type: row.notification_type.parse().map_err(|_| {
                AppError::Internal(format!(
                    "Notification {} has unknown type '{}'",
                    row.id, row.notification_type
                ))
            })?,
            topic: row.topic,
            target_user_ids: row.target_user_ids,
            additional_data: row.additional_data.map(|Json(data)| data),
        })
    }
}

fn into_notifications(rows: Vec<NotificationRow>) -> Result<Vec<Notification>, AppError> {
    rows.into_iter().map(Notification::try_from).collect()
}

#[derive(Clone)]
pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn insert(&self, notification: &Notification) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (
                id, title, body, created_at, updated_at, scheduled_for, is_sent, sent_at,
                notification_type, topic, target_user_ids, additional_data
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(notification.id)
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(notification.created_at)
        .bind(notification.updated_at)
        .bind(notification.scheduled_for)
        .bind(notification.is_sent)
        .bind(notification.sent_at)
        .bind(notification.notification_type.to_string())
        .bind(&notification.topic)
        .bind(&notification.target_user_ids)
        .bind(notification.additional_data.as_ref().map(Json))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Notification>, AppError> {
        let row: Option<NotificationRow> =
            sqlx::query_as("SELECT * FROM notifications WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Notification::try_from).transpose()
    }

    async fn list(&self, filter: &NotificationFilter) -> Result<Vec<Notification>, AppError> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            r#"
            SELECT *
            FROM notifications
            WHERE ($1::BOOLEAN IS NULL OR is_sent = $1)
              AND ($2::TEXT IS NULL OR notification_type = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(filter.is_sent)
        .bind(filter.notification_type.map(|t| t.to_string()))
        .bind(filter.limit())
        .bind(filter.offset())
        .fetch_all(&self.pool)
        .await?;

        into_notifications(rows)
    }

    async fn update_if_unsent(
        &self,
        id: Uuid,
        patch: NotificationPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Notification>, AppError> {
        let row: Option<NotificationRow> = sqlx::query_as(
            r#"
            UPDATE notifications
            SET title = $1,
                body = $2,
                scheduled_for = $3,
                notification_type = $4,
                topic = $5,
                target_user_ids = $6,
                additional_data = $7,
                updated_at = $8
            WHERE id = $9 AND is_sent = false
            RETURNING *
            "#,
        )
        .bind(&patch.title)
        .bind(&patch.body)
        .bind(patch.scheduled_for)
        .bind(patch.notification_type.to_string())
        .bind(&patch.topic)
        .bind(&patch.target_user_ids)
        .bind(patch.additional_data.as_ref().map(Json))
        .bind(now)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Notification::try_from).transpose()
    }

    async fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_sent = true, sent_at = $1, updated_at = $1
            WHERE id = $2 AND is_sent = false
            "#,
        )
        .bind(sent_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn query_due(&self, now: DateTime<Utc>) -> Result<Vec<Notification>, AppError> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            r#"
            SELECT *
            FROM notifications
            WHERE is_sent = false
              AND (scheduled_for IS NULL OR scheduled_for <= $1)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        into_notifications(rows)
    }
}
