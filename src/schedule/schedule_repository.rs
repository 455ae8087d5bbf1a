use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use super::schedule_dto::CreateBlockRequest;
use super::schedule_models::{ScheduleBlock, ScheduleStatus, WorkSchedule};
use crate::error::{AppError, Result};

#[derive(Clone)]
pub struct ScheduleRepository {
    pool: PgPool,
}

impl ScheduleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        week_start_date: NaiveDate,
        notes: Option<&str>,
    ) -> Result<WorkSchedule> {
        sqlx::query_as::<_, WorkSchedule>(
            "INSERT INTO work_schedules (user_id, week_start_date, notes)
             VALUES ($1, $2, $3)
             RETURNING *",
        )
        .bind(user_id)
        .bind(week_start_date)
        .bind(notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(
                "An active schedule already exists for this week".to_string(),
            ),
            _ => AppError::from(e),
        })
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<WorkSchedule>> {
        let schedule =
            sqlx::query_as::<_, WorkSchedule>("SELECT * FROM work_schedules WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(schedule)
    }

    pub async fn find_blocks(&self, schedule_id: Uuid) -> Result<Vec<ScheduleBlock>> {
        let blocks = sqlx::query_as::<_, ScheduleBlock>(
            "SELECT * FROM schedule_blocks
             WHERE schedule_id = $1
             ORDER BY day_of_week, start_time",
        )
        .bind(schedule_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(blocks)
    }

    pub async fn insert_block(
        &self,
        schedule_id: Uuid,
        block: &CreateBlockRequest,
    ) -> Result<ScheduleBlock> {
        let block = sqlx::query_as::<_, ScheduleBlock>(
            "INSERT INTO schedule_blocks (schedule_id, day_of_week, start_time, end_time, location, activity)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(schedule_id)
        .bind(block.day_of_week)
        .bind(block.start_time)
        .bind(block.end_time)
        .bind(&block.location)
        .bind(&block.activity)
        .fetch_one(&self.pool)
        .await?;
        Ok(block)
    }

    pub async fn delete_block(&self, schedule_id: Uuid, block_id: Uuid) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM schedule_blocks WHERE id = $1 AND schedule_id = $2")
                .bind(block_id)
                .bind(schedule_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    pub async fn update_total_hours(&self, id: Uuid, total_hours: f64) -> Result<()> {
        sqlx::query(
            "UPDATE work_schedules SET total_scheduled_hours = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(total_hours)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Move a schedule between lifecycle states with an optimistic check on
    /// the expected current status. Returns `None` when the schedule was not
    /// in `from` anymore, which the service surfaces as a conflict.
    pub async fn transition(
        &self,
        id: Uuid,
        from: ScheduleStatus,
        to: ScheduleStatus,
        total_hours: Option<f64>,
    ) -> Result<Option<WorkSchedule>> {
        let schedule = sqlx::query_as::<_, WorkSchedule>(
            "UPDATE work_schedules SET
                status = $1,
                approved = $2,
                total_scheduled_hours = COALESCE($3, total_scheduled_hours),
                updated_at = NOW()
             WHERE id = $4 AND status = $5
             RETURNING *",
        )
        .bind(to)
        .bind(to == ScheduleStatus::Approved)
        .bind(total_hours)
        .bind(id)
        .bind(from)
        .fetch_optional(&self.pool)
        .await?;
        Ok(schedule)
    }
}
