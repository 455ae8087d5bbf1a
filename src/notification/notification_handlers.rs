use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use super::notification_models::Notification;
use crate::{
    error::{AppError, Result},
    middleware::AuthUser,
    state::AppState,
};

/// Get all notifications for the authenticated user
#[utoipa::path(
    get,
    path = "/api/notifications",
    responses(
        (status = 200, description = "List of notifications", body = Vec<Notification>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn get_notifications(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
) -> Result<Json<Vec<Notification>>> {
    let notifications = state
        .notification_repository
        .find_all_by_user(ctx.user_id)
        .await?;

    Ok(Json(notifications))
}

/// Mark notification as read
#[utoipa::path(
    patch,
    path = "/api/notifications/{id}/read",
    params(
        ("id" = Uuid, Path, description = "Notification ID")
    ),
    responses(
        (status = 200, description = "Notification marked as read", body = Notification),
        (status = 404, description = "Notification not found"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Notification>> {
    let notification = state
        .notification_repository
        .mark_as_read(notification_id, ctx.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;

    Ok(Json(notification))
}
