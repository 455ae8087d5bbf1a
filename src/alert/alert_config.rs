use axum::async_trait;
use sqlx::PgPool;

use super::alert_dto::UpdateAlertConfigRequest;
use super::alert_models::{AlertConfig, AlertType};
use crate::error::{AppError, Result};

/// Read access to the admin-managed alert configuration. The rule engine
/// loads the full set per scan; the dispatcher looks up channel settings
/// for alert-derived events.
#[async_trait]
pub trait AlertConfigStore: Send + Sync {
    async fn load_all(&self) -> Result<Vec<AlertConfig>>;

    async fn find(&self, alert_type: AlertType) -> Result<Option<AlertConfig>>;
}

#[derive(Clone)]
pub struct AlertConfigRepository {
    pool: PgPool,
}

impl AlertConfigRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn update(
        &self,
        alert_type: AlertType,
        payload: &UpdateAlertConfigRequest,
    ) -> Result<AlertConfig> {
        let thresholds_json = match &payload.thresholds {
            Some(t) => Some(serde_json::to_value(t).map_err(|_| AppError::InternalError)?),
            None => None,
        };

        let config = sqlx::query_as::<_, AlertConfig>(
            "UPDATE alert_configurations SET
                is_enabled = COALESCE($1, is_enabled),
                thresholds = COALESCE($2, thresholds),
                channel_in_app = COALESCE($3, channel_in_app),
                channel_email = COALESCE($4, channel_email),
                max_alerts_per_day = COALESCE($5, max_alerts_per_day),
                cooldown_hours = COALESCE($6, cooldown_hours),
                updated_at = NOW()
             WHERE alert_type = $7
             RETURNING *",
        )
        .bind(payload.is_enabled)
        .bind(thresholds_json)
        .bind(payload.channel_in_app)
        .bind(payload.channel_email)
        .bind(payload.max_alerts_per_day)
        .bind(payload.cooldown_hours)
        .bind(alert_type)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Alert configuration not found".to_string()))?;

        Ok(config)
    }
}

#[async_trait]
impl AlertConfigStore for AlertConfigRepository {
    async fn load_all(&self) -> Result<Vec<AlertConfig>> {
        let configs = sqlx::query_as::<_, AlertConfig>(
            "SELECT * FROM alert_configurations ORDER BY alert_type",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(configs)
    }

    async fn find(&self, alert_type: AlertType) -> Result<Option<AlertConfig>> {
        let config = sqlx::query_as::<_, AlertConfig>(
            "SELECT * FROM alert_configurations WHERE alert_type = $1",
        )
        .bind(alert_type)
        .fetch_optional(&self.pool)
        .await?;
        Ok(config)
    }
}
