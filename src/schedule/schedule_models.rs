use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
}

impl ScheduleStatus {
    /// The schedule lifecycle: draft → submitted → approved | rejected,
    /// with rejected → draft for resubmission. Approved is terminal here;
    /// the admin override path is enforced at the service layer.
    pub fn can_transition(self, to: ScheduleStatus) -> bool {
        matches!(
            (self, to),
            (ScheduleStatus::Draft, ScheduleStatus::Submitted)
                | (ScheduleStatus::Submitted, ScheduleStatus::Approved)
                | (ScheduleStatus::Submitted, ScheduleStatus::Rejected)
                | (ScheduleStatus::Rejected, ScheduleStatus::Draft)
        )
    }

    /// Blocks may only be edited while the schedule is a draft.
    pub fn allows_block_edits(self) -> bool {
        self == ScheduleStatus::Draft
    }
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleStatus::Draft => write!(f, "draft"),
            ScheduleStatus::Submitted => write!(f, "submitted"),
            ScheduleStatus::Approved => write!(f, "approved"),
            ScheduleStatus::Rejected => write!(f, "rejected"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct WorkSchedule {
    pub id: Uuid,
    pub user_id: Uuid,
    pub week_start_date: NaiveDate,
    pub status: ScheduleStatus,
    pub approved: bool,
    pub notes: Option<String>,
    pub total_scheduled_hours: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ScheduleBlock {
    pub id: Uuid,
    pub schedule_id: Uuid,
    /// 0 = Monday .. 6 = Sunday.
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub location: String,
    pub activity: String,
    pub created_at: DateTime<Utc>,
}

impl ScheduleBlock {
    /// Duration in hours; a non-positive interval contributes nothing.
    pub fn duration_hours(&self) -> f64 {
        let minutes = (self.end_time - self.start_time).num_minutes();
        if minutes > 0 {
            minutes as f64 / 60.0
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table_is_exact() {
        use ScheduleStatus::*;

        let all = [Draft, Submitted, Approved, Rejected];
        let allowed = [
            (Draft, Submitted),
            (Submitted, Approved),
            (Submitted, Rejected),
            (Rejected, Draft),
        ];

        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn only_drafts_allow_block_edits() {
        assert!(ScheduleStatus::Draft.allows_block_edits());
        assert!(!ScheduleStatus::Submitted.allows_block_edits());
        assert!(!ScheduleStatus::Approved.allows_block_edits());
        assert!(!ScheduleStatus::Rejected.allows_block_edits());
    }
}
