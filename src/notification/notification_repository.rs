use axum::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::notification_models::Notification;
use crate::error::Result;

/// Durable side of the in-app channel.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(
        &self,
        user_id: Uuid,
        event_type: &str,
        message: &str,
        data: &serde_json::Value,
    ) -> Result<Notification>;
}

#[derive(Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_all_by_user(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    pub async fn mark_as_read(&self, id: Uuid, user_id: Uuid) -> Result<Option<Notification>> {
        let notification = sqlx::query_as::<_, Notification>(
            "UPDATE notifications SET is_read = true WHERE id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(notification)
    }
}

#[async_trait]
impl NotificationStore for NotificationRepository {
    async fn insert(
        &self,
        user_id: Uuid,
        event_type: &str,
        message: &str,
        data: &serde_json::Value,
    ) -> Result<Notification> {
        let notification = sqlx::query_as::<_, Notification>(
            "INSERT INTO notifications (user_id, event_type, message, data)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(user_id)
        .bind(event_type)
        .bind(message)
        .bind(data)
        .fetch_one(&self.pool)
        .await?;

        Ok(notification)
    }
}
