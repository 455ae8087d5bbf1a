use axum::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use utoipa::ToSchema;
use uuid::Uuid;

use super::alert_models::{Alert, AlertSeverity, AlertType, NewAlert};
use crate::error::{AppError, Result};

#[derive(Debug, Default, Clone)]
pub struct AlertFilters {
    pub severity: Option<AlertSeverity>,
    pub alert_type: Option<AlertType>,
    pub resolved: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct SeverityCounts {
    pub low: i64,
    pub medium: i64,
    pub high: i64,
    pub critical: i64,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct TypeCounts {
    pub task_overdue: i64,
    pub student_inactive: i64,
    pub project_risk: i64,
    pub velocity_drop: i64,
    pub task_blocked: i64,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct AlertStats {
    pub total: i64,
    pub unresolved: i64,
    pub by_severity: SeverityCounts,
    pub by_type: TypeCounts,
}

/// Keyed storage of alert records and their resolution state (spec'd as an
/// external storage collaborator; `AlertRepository` is the Postgres
/// implementation, tests use an in-memory one).
#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn save(&self, alert: NewAlert) -> Result<Alert>;

    /// The dedup probe: an unresolved alert with the same `(type, subject)`
    /// created at or after `since`.
    async fn find_unresolved(
        &self,
        alert_type: AlertType,
        subject_key: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Alert>>;

    /// Idempotent: resolving an already-resolved alert returns it unchanged.
    async fn resolve(&self, id: Uuid, reason: Option<&str>) -> Result<Alert>;

    async fn list(&self, filters: AlertFilters) -> Result<Vec<Alert>>;

    async fn stats(&self) -> Result<AlertStats>;
}

#[derive(Clone)]
pub struct AlertRepository {
    pool: PgPool,
}

impl AlertRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct SeverityRow {
    severity: AlertSeverity,
    count: i64,
}

#[derive(FromRow)]
struct TypeRow {
    alert_type: AlertType,
    count: i64,
}

#[derive(FromRow)]
struct TotalsRow {
    total: i64,
    unresolved: i64,
}

#[async_trait]
impl AlertStore for AlertRepository {
    async fn save(&self, alert: NewAlert) -> Result<Alert> {
        let subject_key = alert.subject_key();
        let saved = sqlx::query_as::<_, Alert>(
            "INSERT INTO alerts (alert_type, severity, title, message,
                                 subject_user_id, subject_project_id, subject_task_id,
                                 subject_key, data)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING *",
        )
        .bind(alert.alert_type)
        .bind(alert.severity)
        .bind(&alert.title)
        .bind(&alert.message)
        .bind(alert.subject_user_id)
        .bind(alert.subject_project_id)
        .bind(alert.subject_task_id)
        .bind(&subject_key)
        .bind(&alert.data)
        .fetch_one(&self.pool)
        .await?;
        Ok(saved)
    }

    async fn find_unresolved(
        &self,
        alert_type: AlertType,
        subject_key: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Alert>> {
        let alert = sqlx::query_as::<_, Alert>(
            "SELECT * FROM alerts
             WHERE alert_type = $1 AND subject_key = $2
               AND is_resolved = false AND created_at >= $3
             ORDER BY created_at DESC
             LIMIT 1",
        )
        .bind(alert_type)
        .bind(subject_key)
        .bind(since)
        .fetch_optional(&self.pool)
        .await?;
        Ok(alert)
    }

    async fn resolve(&self, id: Uuid, reason: Option<&str>) -> Result<Alert> {
        let existing = sqlx::query_as::<_, Alert>("SELECT * FROM alerts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Alert not found".to_string()))?;

        if existing.is_resolved {
            return Ok(existing);
        }

        let resolved = sqlx::query_as::<_, Alert>(
            "UPDATE alerts SET is_resolved = true, resolution_reason = $1, updated_at = NOW()
             WHERE id = $2
             RETURNING *",
        )
        .bind(reason)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(resolved)
    }

    async fn list(&self, filters: AlertFilters) -> Result<Vec<Alert>> {
        let mut query = "SELECT * FROM alerts WHERE 1=1".to_string();
        let mut params_count = 0;

        if filters.severity.is_some() {
            params_count += 1;
            query.push_str(&format!(" AND severity = ${}", params_count));
        }

        if filters.alert_type.is_some() {
            params_count += 1;
            query.push_str(&format!(" AND alert_type = ${}", params_count));
        }

        if filters.resolved.is_some() {
            params_count += 1;
            query.push_str(&format!(" AND is_resolved = ${}", params_count));
        }

        query.push_str(" ORDER BY created_at DESC");

        let mut db_query = sqlx::query_as::<_, Alert>(&query);

        if let Some(severity) = filters.severity {
            db_query = db_query.bind(severity);
        }

        if let Some(alert_type) = filters.alert_type {
            db_query = db_query.bind(alert_type);
        }

        if let Some(resolved) = filters.resolved {
            db_query = db_query.bind(resolved);
        }

        let alerts = db_query.fetch_all(&self.pool).await?;
        Ok(alerts)
    }

    async fn stats(&self) -> Result<AlertStats> {
        let totals = sqlx::query_as::<_, TotalsRow>(
            "SELECT COUNT(*) AS total,
                    COUNT(*) FILTER (WHERE is_resolved = false) AS unresolved
             FROM alerts",
        )
        .fetch_one(&self.pool)
        .await?;

        let severity_rows = sqlx::query_as::<_, SeverityRow>(
            "SELECT severity, COUNT(*) AS count FROM alerts GROUP BY severity",
        )
        .fetch_all(&self.pool)
        .await?;

        let type_rows = sqlx::query_as::<_, TypeRow>(
            "SELECT alert_type, COUNT(*) AS count FROM alerts GROUP BY alert_type",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut stats = AlertStats {
            total: totals.total,
            unresolved: totals.unresolved,
            ..Default::default()
        };

        for row in severity_rows {
            match row.severity {
                AlertSeverity::Low => stats.by_severity.low = row.count,
                AlertSeverity::Medium => stats.by_severity.medium = row.count,
                AlertSeverity::High => stats.by_severity.high = row.count,
                AlertSeverity::Critical => stats.by_severity.critical = row.count,
            }
        }

        for row in type_rows {
            match row.alert_type {
                AlertType::TaskOverdue => stats.by_type.task_overdue = row.count,
                AlertType::StudentInactive => stats.by_type.student_inactive = row.count,
                AlertType::ProjectRisk => stats.by_type.project_risk = row.count,
                AlertType::VelocityDrop => stats.by_type.velocity_drop = row.count,
                AlertType::TaskBlocked => stats.by_type.task_blocked = row.count,
            }
        }

        Ok(stats)
    }
}
