//! Request validation for notification create/update.
//!
//! The notification type decides which targeting field must be populated:
//! - `broadcast`: neither `topic` nor `target_user_ids`
//! - `topic`: a non-empty `topic`, no user ids
//! - `user_specific`: at least one user id, no topic
//!
//! User ids are trimmed, de-duplicated and sorted, so they behave as a set.

use std::collections::BTreeSet;

use herald_common::error::AppError;
use herald_common::types::{NotificationPatch, NotificationRequest, NotificationType};

/// Validate a request and normalize it into the fields that get persisted.
pub fn validate_request(request: &NotificationRequest) -> Result<NotificationPatch, AppError> {
    let title = required_text("title", &request.title)?;
    let body = required_text("body", &request.body)?;

    let topic = request
        .topic
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    let target_user_ids: Vec<String> = request
        .target_user_ids
        .iter()
        .flatten()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect();

    match request.notification_type {
        NotificationType::Broadcast => {
            if topic.is_some() {
                return Err(AppError::Validation(
                    "topic is only allowed for type 'topic'".to_string(),
                ));
            }
            if !target_user_ids.is_empty() {
                return Err(AppError::Validation(
                    "target_user_ids is only allowed for type 'user_specific'".to_string(),
                ));
            }
        }
        NotificationType::Topic => {
            if topic.is_none() {
                return Err(AppError::Validation(
                    "topic is required for type 'topic'".to_string(),
                ));
            }
            if !target_user_ids.is_empty() {
                return Err(AppError::Validation(
                    "target_user_ids is only allowed for type 'user_specific'".to_string(),
                ));
            }
        }
        NotificationType::UserSpecific => {
            if target_user_ids.is_empty() {
                return Err(AppError::Validation(
                    "target_user_ids must contain at least one user for type 'user_specific'"
                        .to_string(),
                ));
            }
            if topic.is_some() {
                return Err(AppError::Validation(
                    "topic is only allowed for type 'topic'".to_string(),
                ));
            }
        }
    }

    Ok(NotificationPatch {
        title,
        body,
        scheduled_for: request.scheduled_for,
        notification_type: request.notification_type,
        topic,
        target_user_ids,
        additional_data: request.additional_data.clone(),
    })
}

fn required_text(field: &str, value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}
