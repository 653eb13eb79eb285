use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Default page size for notification listings.
pub const DEFAULT_PAGE_LIMIT: i64 = 50;

/// Upper bound on a single page of notifications.
pub const MAX_PAGE_LIMIT: i64 = 200;

/// How a notification is targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Broadcast,
    Topic,
    UserSpecific,
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationType::Broadcast => write!(f, "broadcast"),
            NotificationType::Topic => write!(f, "topic"),
            NotificationType::UserSpecific => write!(f, "user_specific"),
        }
    }
}

impl std::str::FromStr for NotificationType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "broadcast" => Ok(NotificationType::Broadcast),
            "topic" => Ok(NotificationType::Topic),
            "user_specific" => Ok(NotificationType::UserSpecific),
            other => Err(AppError::Validation(format!(
                "Invalid notification type '{}'. Valid types: broadcast, topic, user_specific",
                other
            ))),
        }
    }
}

/// A stored notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// `None` means deliver on the next cycle.
    pub scheduled_for: Option<DateTime<Utc>>,
    pub is_sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub topic: Option<String>,
    pub target_user_ids: Vec<String>,
    pub additional_data: Option<HashMap<String, String>>,
}

impl Notification {
    /// Whether the notification should be picked up by a cycle running at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.is_sent && self.scheduled_for.is_none_or(|at| at <= now)
    }

    /// Resolve the delivery target from the notification's type.
    pub fn audience(&self) -> Audience {
        match self.notification_type {
            NotificationType::Broadcast => Audience::All,
            NotificationType::Topic => Audience::Topic(self.topic.clone().unwrap_or_default()),
            NotificationType::UserSpecific => Audience::Users(self.target_user_ids.clone()),
        }
    }
}

/// Resolved delivery target handed to a delivery provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Audience {
    All,
    Topic(String),
    Users(Vec<String>),
}

impl std::fmt::Display for Audience {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Audience::All => write!(f, "all"),
            Audience::Topic(topic) => write!(f, "topic:{}", topic),
            Audience::Users(users) => write!(f, "users({})", users.len()),
        }
    }
}

/// Create/update payload. Updates replace every mutable field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub target_user_ids: Option<Vec<String>>,
    #[serde(default)]
    pub additional_data: Option<HashMap<String, String>>,
}

/// Validated mutable fields of a notification, as written by create and update.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationPatch {
    pub title: String,
    pub body: String,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub notification_type: NotificationType,
    pub topic: Option<String>,
    pub target_user_ids: Vec<String>,
    pub additional_data: Option<HashMap<String, String>>,
}

impl NotificationPatch {
    pub fn apply(self, notification: &mut Notification, now: DateTime<Utc>) {
        notification.title = self.title;
        notification.body = self.body;
        notification.scheduled_for = self.scheduled_for;
        notification.notification_type = self.notification_type;
        notification.topic = self.topic;
        notification.target_user_ids = self.target_user_ids;
        notification.additional_data = self.additional_data;
        notification.updated_at = now;
    }
}

/// Listing filter with pagination.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationFilter {
    pub is_sent: Option<bool>,
    #[serde(rename = "type")]
    pub notification_type: Option<NotificationType>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl NotificationFilter {
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    pub fn matches(&self, notification: &Notification) -> bool {
        self.is_sent.is_none_or(|sent| notification.is_sent == sent)
            && self
                .notification_type
                .is_none_or(|t| notification.notification_type == t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn make_notification(scheduled_for: Option<DateTime<Utc>>) -> Notification {
        let now = Utc::now();
        Notification {
            id: Uuid::new_v4(),
            title: "Maintenance".to_string(),
            body: "Planned downtime".to_string(),
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

    #[test]
    fn test_unscheduled_notification_is_due() {
        let n = make_notification(None);
        assert!(n.is_due(Utc::now()));
    }

    #[test]
    fn test_future_notification_is_not_due() {
        let now = Utc::now();
        let n = make_notification(Some(now + Duration::hours(1)));
        assert!(!n.is_due(now));
        assert!(n.is_due(now + Duration::hours(2)));
    }

    #[test]
    fn test_sent_notification_is_never_due() {
        let mut n = make_notification(None);
        n.is_sent = true;
        assert!(!n.is_due(Utc::now()));
    }

    #[test]
    fn test_audience_resolution() {
        let mut n = make_notification(None);
        assert_eq!(n.audience(), Audience::All);

        n.notification_type = NotificationType::Topic;
        n.topic = Some("alerts".to_string());
        assert_eq!(n.audience(), Audience::Topic("alerts".to_string()));

        n.notification_type = NotificationType::UserSpecific;
        n.topic = None;
        n.target_user_ids = vec!["u1".to_string(), "u2".to_string()];
        assert_eq!(
            n.audience(),
            Audience::Users(vec!["u1".to_string(), "u2".to_string()])
        );
    }

    #[test]
    fn test_notification_type_round_trips_through_display() {
        for t in [
            NotificationType::Broadcast,
            NotificationType::Topic,
            NotificationType::UserSpecific,
        ] {
            assert_eq!(t.to_string().parse::<NotificationType>().unwrap(), t);
        }
        assert!("email".parse::<NotificationType>().is_err());
    }

    #[test]
    fn test_filter_limit_is_clamped() {
        let filter = NotificationFilter {
            limit: Some(10_000),
            offset: Some(-5),
            ..Default::default()
        };
        assert_eq!(filter.limit(), MAX_PAGE_LIMIT);
        assert_eq!(filter.offset(), 0);
        assert_eq!(NotificationFilter::default().limit(), DEFAULT_PAGE_LIMIT);
    }

    #[test]
    fn test_request_deserializes_wire_names() {
        let req: NotificationRequest = serde_json::from_value(serde_json::json!({
            "title": "Heads up",
            "body": "New release",
            "type": "topic",
            "topic": "alerts"
        }))
        .unwrap();
        assert_eq!(req.notification_type, NotificationType::Topic);
        assert_eq!(req.topic.as_deref(), Some("alerts"));
        assert!(req.target_user_ids.is_none());
    }
}
