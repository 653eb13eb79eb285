//! Delivery management routes, restricted to the admin role by the gate.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};

use herald_common::error::AppError;
use herald_common::types::Notification;
use herald_engine::service::ProcessingReport;

use crate::middleware::auth::Principal;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/admin/notifications/process",
            post(process_due_notifications),
        )
        .route("/api/admin/notifications/due", get(list_due_notifications))
}

/// POST /api/admin/notifications/process: Run one delivery cycle now.
async fn process_due_notifications(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<ProcessingReport>, AppError> {
    tracing::info!(
        subject = principal.subject.as_deref().unwrap_or("-"),
        "Manual delivery cycle requested"
    );

    let report = state.service.process_due_notifications().await?;
    Ok(Json(report))
}

/// GET /api/admin/notifications/due: Notifications the next cycle would dispatch.
async fn list_due_notifications(
    State(state): State<AppState>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let due = state.service.due_notifications().await?;
    Ok(Json(due))
}
