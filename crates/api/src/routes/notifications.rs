//! Notification CRUD routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use uuid::Uuid;

use herald_common::error::AppError;
use herald_common::types::{Notification, NotificationFilter, NotificationRequest};

use crate::middleware::auth::Principal;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/notifications",
            get(list_notifications).post(create_notification),
        )
        .route(
            "/api/notifications/{id}",
            get(get_notification).put(update_notification),
        )
}

/// POST /api/notifications: Create a notification.
async fn create_notification(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<NotificationRequest>,
) -> Result<(StatusCode, Json<Notification>), AppError> {
    let notification = state.service.create(&request).await?;

    tracing::info!(
        notification_id = %notification.id,
        subject = principal.subject.as_deref().unwrap_or("-"),
        "Notification created via API"
    );

    Ok((StatusCode::CREATED, Json(notification)))
}

/// GET /api/notifications: List notifications, newest first.
async fn list_notifications(
    State(state): State<AppState>,
    Query(filter): Query<NotificationFilter>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let notifications = state.service.list(&filter).await?;
    Ok(Json(notifications))
}

/// GET /api/notifications/:id: Fetch one notification.
async fn get_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, AppError> {
    let notification = state.service.get(id).await?;
    Ok(Json(notification))
}

/// PUT /api/notifications/:id: Replace the content of an unsent notification.
async fn update_notification(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(request): Json<NotificationRequest>,
) -> Result<Json<Notification>, AppError> {
    let notification = state.service.update(id, &request).await?;

    tracing::info!(
        notification_id = %id,
        subject = principal.subject.as_deref().unwrap_or("-"),
        "Notification updated via API"
    );

    Ok(Json(notification))
}
