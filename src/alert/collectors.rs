use axum::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::alert_models::{AlertConfig, AlertType};
use crate::error::Result;

#[derive(Debug, Clone, FromRow)]
pub struct OverdueTask {
    pub task_id: Uuid,
    pub project_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub title: String,
    pub due_date: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct InactiveStudent {
    pub user_id: Uuid,
    pub username: String,
    pub last_activity_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ProjectRiskInputs {
    pub project_id: Uuid,
    pub name: String,
    pub total_tasks: i64,
    pub overdue_tasks: i64,
    pub blocked_tasks: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct VelocityStat {
    pub user_id: Uuid,
    pub username: String,
    pub current_count: i64,
    pub previous_count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct BlockedTask {
    pub task_id: Uuid,
    pub assignee_id: Option<Uuid>,
    pub title: String,
    pub blocked_at: DateTime<Utc>,
}

/// Read-only signal queries against operational storage. One method per
/// rule; tests substitute a canned implementation.
#[async_trait]
pub trait MetricSource: Send + Sync {
    async fn overdue_tasks(&self) -> Result<Vec<OverdueTask>>;

    async fn inactive_students(&self, since_days: i32) -> Result<Vec<InactiveStudent>>;

    async fn project_risk_inputs(&self) -> Result<Vec<ProjectRiskInputs>>;

    async fn velocity_stats(&self, window_days: i32) -> Result<Vec<VelocityStat>>;

    async fn blocked_tasks(&self, blocked_hours: i32) -> Result<Vec<BlockedTask>>;
}

#[derive(Clone)]
pub struct SqlMetricSource {
    pool: PgPool,
}

impl SqlMetricSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetricSource for SqlMetricSource {
    async fn overdue_tasks(&self) -> Result<Vec<OverdueTask>> {
        let tasks = sqlx::query_as::<_, OverdueTask>(
            "SELECT id AS task_id, project_id, assignee_id, title, due_date
             FROM tasks
             WHERE due_date IS NOT NULL AND due_date < NOW() AND status <> 'completed'
             ORDER BY due_date",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(tasks)
    }

    async fn inactive_students(&self, since_days: i32) -> Result<Vec<InactiveStudent>> {
        let students = sqlx::query_as::<_, InactiveStudent>(
            "SELECT u.id AS user_id, u.username, MAX(a.created_at) AS last_activity_at
             FROM users u
             LEFT JOIN activity_log a ON a.user_id = u.id
             WHERE u.role = 'student'
             GROUP BY u.id, u.username
             HAVING COALESCE(MAX(a.created_at), 'epoch'::timestamptz)
                 < NOW() - make_interval(days => $1)",
        )
        .bind(since_days)
        .fetch_all(&self.pool)
        .await?;
        Ok(students)
    }

    async fn project_risk_inputs(&self) -> Result<Vec<ProjectRiskInputs>> {
        let projects = sqlx::query_as::<_, ProjectRiskInputs>(
            "SELECT p.id AS project_id, p.name,
                    COUNT(t.id) AS total_tasks,
                    COUNT(t.id) FILTER (
                        WHERE t.due_date < NOW() AND t.status <> 'completed'
                    ) AS overdue_tasks,
                    COUNT(t.id) FILTER (WHERE t.status = 'blocked') AS blocked_tasks
             FROM projects p
             LEFT JOIN tasks t ON t.project_id = p.id
             GROUP BY p.id, p.name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(projects)
    }

    async fn velocity_stats(&self, window_days: i32) -> Result<Vec<VelocityStat>> {
        let stats = sqlx::query_as::<_, VelocityStat>(
            "SELECT u.id AS user_id, u.username,
                    COUNT(a.id) FILTER (
                        WHERE a.created_at >= NOW() - make_interval(days => $1)
                    ) AS current_count,
                    COUNT(a.id) FILTER (
                        WHERE a.created_at >= NOW() - make_interval(days => $1 * 2)
                          AND a.created_at < NOW() - make_interval(days => $1)
                    ) AS previous_count
             FROM users u
             LEFT JOIN activity_log a ON a.user_id = u.id
             WHERE u.role = 'student'
             GROUP BY u.id, u.username",
        )
        .bind(window_days)
        .fetch_all(&self.pool)
        .await?;
        Ok(stats)
    }

    async fn blocked_tasks(&self, blocked_hours: i32) -> Result<Vec<BlockedTask>> {
        let tasks = sqlx::query_as::<_, BlockedTask>(
            "SELECT id AS task_id, assignee_id, title, blocked_at
             FROM tasks
             WHERE status = 'blocked'
               AND blocked_at IS NOT NULL
               AND blocked_at < NOW() - make_interval(hours => $1)
             ORDER BY blocked_at",
        )
        .bind(blocked_hours)
        .fetch_all(&self.pool)
        .await?;
        Ok(tasks)
    }
}

/// Everything the rule engine needs for one scan. Each field is `None` when
/// its rule is disabled or its collector failed; a failed collector only
/// silences its own rule.
#[derive(Debug, Default)]
pub struct CollectorSnapshot {
    pub overdue: Option<Vec<OverdueTask>>,
    pub inactive: Option<Vec<InactiveStudent>>,
    pub project_risk: Option<Vec<ProjectRiskInputs>>,
    pub velocity: Option<Vec<VelocityStat>>,
    pub blocked: Option<Vec<BlockedTask>>,
    pub collector_failures: usize,
}

impl CollectorSnapshot {
    pub async fn gather(source: &dyn MetricSource, configs: &[AlertConfig]) -> Self {
        let enabled = |alert_type: AlertType| {
            configs
                .iter()
                .find(|c| c.alert_type == alert_type && c.is_enabled)
        };

        let mut snapshot = CollectorSnapshot::default();

        if enabled(AlertType::TaskOverdue).is_some() {
            match source.overdue_tasks().await {
                Ok(tasks) => snapshot.overdue = Some(tasks),
                Err(e) => {
                    snapshot.collector_failures += 1;
                    tracing::error!("Overdue-task collector failed: {:?}", e);
                }
            }
        }

        if let Some(config) = enabled(AlertType::StudentInactive) {
            match source
                .inactive_students(config.thresholds.inactivity_days)
                .await
            {
                Ok(students) => snapshot.inactive = Some(students),
                Err(e) => {
                    snapshot.collector_failures += 1;
                    tracing::error!("Inactivity collector failed: {:?}", e);
                }
            }
        }

        if enabled(AlertType::ProjectRisk).is_some() {
            match source.project_risk_inputs().await {
                Ok(projects) => snapshot.project_risk = Some(projects),
                Err(e) => {
                    snapshot.collector_failures += 1;
                    tracing::error!("Project-risk collector failed: {:?}", e);
                }
            }
        }

        if let Some(config) = enabled(AlertType::VelocityDrop) {
            match source
                .velocity_stats(config.thresholds.velocity_window_days)
                .await
            {
                Ok(stats) => snapshot.velocity = Some(stats),
                Err(e) => {
                    snapshot.collector_failures += 1;
                    tracing::error!("Velocity collector failed: {:?}", e);
                }
            }
        }

        if let Some(config) = enabled(AlertType::TaskBlocked) {
            match source.blocked_tasks(config.thresholds.blocked_hours).await {
                Ok(tasks) => snapshot.blocked = Some(tasks),
                Err(e) => {
                    snapshot.collector_failures += 1;
                    tracing::error!("Blocked-task collector failed: {:?}", e);
                }
            }
        }

        snapshot
    }
}
