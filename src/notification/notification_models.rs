use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::alert::Alert;

/// Durable in-app notification row. Written before the realtime push so a
/// disconnected client can catch up from history.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_type: String,
    pub message: String,
    pub data: serde_json::Value,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// A domain event handed to the dispatcher. Closed set: adding an event
/// type means handling it in every match below, checked at compile time.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum NotificationEvent {
    AlertRaised {
        alert: Alert,
    },
    ScheduleSubmitted {
        schedule_id: Uuid,
        student_id: Uuid,
        week_start_date: NaiveDate,
    },
    ScheduleApproved {
        schedule_id: Uuid,
        student_id: Uuid,
        week_start_date: NaiveDate,
    },
    ScheduleRejected {
        schedule_id: Uuid,
        student_id: Uuid,
        week_start_date: NaiveDate,
        reason: Option<String>,
    },
    DirectMessage {
        sender_id: Uuid,
        sender_name: String,
        recipient_id: Uuid,
        preview: String,
    },
    TaskAssigned {
        task_id: Uuid,
        assignee_id: Uuid,
        title: String,
    },
    TaskOverdue {
        task_id: Uuid,
        assignee_id: Uuid,
        title: String,
        days_overdue: i64,
    },
}

impl NotificationEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            NotificationEvent::AlertRaised { .. } => "alert_raised",
            NotificationEvent::ScheduleSubmitted { .. } => "schedule_submitted",
            NotificationEvent::ScheduleApproved { .. } => "schedule_approved",
            NotificationEvent::ScheduleRejected { .. } => "schedule_rejected",
            NotificationEvent::DirectMessage { .. } => "direct_message",
            NotificationEvent::TaskAssigned { .. } => "task_assigned",
            NotificationEvent::TaskOverdue { .. } => "task_overdue",
        }
    }
}
