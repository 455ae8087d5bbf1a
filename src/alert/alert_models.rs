use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    TaskOverdue,
    StudentInactive,
    ProjectRisk,
    VelocityDrop,
    TaskBlocked,
}

impl AlertType {
    /// Rules are evaluated in this fixed order within a scan so that
    /// dedup and rate-limit state stay deterministic.
    pub const RULE_ORDER: [AlertType; 5] = [
        AlertType::TaskOverdue,
        AlertType::StudentInactive,
        AlertType::ProjectRisk,
        AlertType::VelocityDrop,
        AlertType::TaskBlocked,
    ];
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertType::TaskOverdue => write!(f, "task_overdue"),
            AlertType::StudentInactive => write!(f, "student_inactive"),
            AlertType::ProjectRisk => write!(f, "project_risk"),
            AlertType::VelocityDrop => write!(f, "velocity_drop"),
            AlertType::TaskBlocked => write!(f, "task_blocked"),
        }
    }
}

impl std::str::FromStr for AlertType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task_overdue" => Ok(AlertType::TaskOverdue),
            "student_inactive" => Ok(AlertType::StudentInactive),
            "project_risk" => Ok(AlertType::ProjectRisk),
            "velocity_drop" => Ok(AlertType::VelocityDrop),
            "task_blocked" => Ok(AlertType::TaskBlocked),
            other => Err(format!("unknown alert type: {other}")),
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    sqlx::Type,
    ToSchema,
)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::Low => write!(f, "low"),
            AlertSeverity::Medium => write!(f, "medium"),
            AlertSeverity::High => write!(f, "high"),
            AlertSeverity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for AlertSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(AlertSeverity::Low),
            "medium" => Ok(AlertSeverity::Medium),
            "high" => Ok(AlertSeverity::High),
            "critical" => Ok(AlertSeverity::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// A persisted risk condition. Immutable after creation apart from the
/// resolution transition and its `updated_at` stamp.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Alert {
    pub id: Uuid,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub subject_user_id: Option<Uuid>,
    pub subject_project_id: Option<Uuid>,
    pub subject_task_id: Option<Uuid>,
    pub subject_key: String,
    pub data: serde_json::Value,
    pub is_resolved: bool,
    pub resolution_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A candidate alert produced by rule evaluation, before dedup and
/// rate limiting.
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub subject_user_id: Option<Uuid>,
    pub subject_project_id: Option<Uuid>,
    pub subject_task_id: Option<Uuid>,
    pub data: serde_json::Value,
}

impl NewAlert {
    /// Suppression key: the most specific subject wins.
    pub fn subject_key(&self) -> String {
        if let Some(task_id) = self.subject_task_id {
            format!("task:{task_id}")
        } else if let Some(user_id) = self.subject_user_id {
            format!("user:{user_id}")
        } else if let Some(project_id) = self.subject_project_id {
            format!("project:{project_id}")
        } else {
            "global".to_string()
        }
    }
}

fn default_inactivity_days() -> i32 {
    7
}

fn default_risk_score() -> f64 {
    50.0
}

fn default_drop_ratio() -> f64 {
    0.5
}

fn default_blocked_hours() -> i32 {
    48
}

fn default_velocity_window_days() -> i32 {
    7
}

/// Per-type tunables stored as JSON on the configuration row; unknown
/// fields are ignored and missing ones fall back to lab defaults.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct Thresholds {
    #[serde(default = "default_inactivity_days")]
    pub inactivity_days: i32,
    #[serde(default = "default_risk_score")]
    pub risk_score: f64,
    #[serde(default = "default_drop_ratio")]
    pub drop_ratio: f64,
    #[serde(default = "default_blocked_hours")]
    pub blocked_hours: i32,
    #[serde(default = "default_velocity_window_days")]
    pub velocity_window_days: i32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            inactivity_days: default_inactivity_days(),
            risk_score: default_risk_score(),
            drop_ratio: default_drop_ratio(),
            blocked_hours: default_blocked_hours(),
            velocity_window_days: default_velocity_window_days(),
        }
    }
}

/// Admin-managed configuration, one row per alert type.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AlertConfig {
    pub alert_type: AlertType,
    pub is_enabled: bool,
    #[sqlx(json)]
    pub thresholds: Thresholds,
    pub channel_in_app: bool,
    pub channel_email: bool,
    pub max_alerts_per_day: i32,
    pub cooldown_hours: i32,
    pub updated_at: DateTime<Utc>,
}
