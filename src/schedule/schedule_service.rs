use std::sync::Arc;

use uuid::Uuid;

use super::compliance::{self, ComplianceResult};
use super::schedule_dto::{CreateBlockRequest, CreateScheduleRequest};
use super::schedule_models::{ScheduleBlock, ScheduleStatus, WorkSchedule};
use super::schedule_repository::ScheduleRepository;
use crate::error::{AppError, Result};
use crate::middleware::AuthContext;
use crate::notification::{NotificationDispatcher, NotificationEvent};
use crate::user::{Role, UserRepository};

/// Business logic around weekly schedules: ownership checks, the
/// draft/submitted/approved/rejected lifecycle and compliance gating.
#[derive(Clone)]
pub struct ScheduleService {
    repo: ScheduleRepository,
    users: UserRepository,
    dispatcher: Arc<NotificationDispatcher>,
    min_weekly_hours: f64,
}

impl ScheduleService {
    pub fn new(
        repo: ScheduleRepository,
        users: UserRepository,
        dispatcher: Arc<NotificationDispatcher>,
        min_weekly_hours: f64,
    ) -> Self {
        Self {
            repo,
            users,
            dispatcher,
            min_weekly_hours,
        }
    }

    pub async fn create_schedule(
        &self,
        ctx: &AuthContext,
        payload: CreateScheduleRequest,
    ) -> Result<WorkSchedule> {
        self.repo
            .create(ctx.user_id, payload.week_start_date, payload.notes.as_deref())
            .await
    }

    pub async fn get_schedule(
        &self,
        ctx: &AuthContext,
        id: Uuid,
    ) -> Result<(WorkSchedule, Vec<ScheduleBlock>, ComplianceResult)> {
        let schedule = self.load(id).await?;
        if schedule.user_id != ctx.user_id && !ctx.role.is_operator() {
            return Err(AppError::Forbidden(
                "You may only view your own schedule".to_string(),
            ));
        }
        let blocks = self.repo.find_blocks(id).await?;
        let compliance = compliance::validate(&blocks, self.min_weekly_hours);
        Ok((schedule, blocks, compliance))
    }

    pub async fn add_block(
        &self,
        ctx: &AuthContext,
        schedule_id: Uuid,
        payload: CreateBlockRequest,
    ) -> Result<(ScheduleBlock, ComplianceResult)> {
        let schedule = self.load_owned(ctx, schedule_id).await?;
        if !schedule.status.allows_block_edits() {
            return Err(AppError::Validation(
                "Blocks can only be edited while the schedule is a draft".to_string(),
            ));
        }
        if payload.end_time <= payload.start_time {
            return Err(AppError::Validation(
                "Block end time must be after its start time".to_string(),
            ));
        }

        let block = self.repo.insert_block(schedule_id, &payload).await?;
        let compliance = self.refresh_total(schedule_id).await?;
        Ok((block, compliance))
    }

    pub async fn remove_block(
        &self,
        ctx: &AuthContext,
        schedule_id: Uuid,
        block_id: Uuid,
    ) -> Result<ComplianceResult> {
        let schedule = self.load_owned(ctx, schedule_id).await?;
        if !schedule.status.allows_block_edits() {
            return Err(AppError::Validation(
                "Blocks can only be edited while the schedule is a draft".to_string(),
            ));
        }

        let deleted = self.repo.delete_block(schedule_id, block_id).await?;
        if deleted == 0 {
            return Err(AppError::NotFound("Block not found".to_string()));
        }
        self.refresh_total(schedule_id).await
    }

    /// Submit a draft for approval. The submission is blocked with the full
    /// violation list when the week is out of compliance; a concurrent
    /// submission losing the optimistic status check gets a conflict.
    pub async fn submit(&self, ctx: &AuthContext, id: Uuid) -> Result<WorkSchedule> {
        let schedule = self.load_owned(ctx, id).await?;
        Self::ensure_transition(&schedule, ScheduleStatus::Submitted)?;

        let blocks = self.repo.find_blocks(id).await?;
        let compliance = compliance::validate(&blocks, self.min_weekly_hours);
        if !compliance.is_valid {
            let detail: Vec<String> = compliance.violations.iter().map(ToString::to_string).collect();
            return Err(AppError::Validation(format!(
                "Schedule cannot be submitted: {}",
                detail.join("; ")
            )));
        }

        let updated = self
            .repo
            .transition(
                schedule.id,
                schedule.status,
                ScheduleStatus::Submitted,
                Some(compliance.total_hours),
            )
            .await?
            .ok_or_else(|| AppError::Conflict("Schedule is not in draft state".to_string()))?;

        if let Err(e) = self.users.record_activity(ctx.user_id, "schedule_submitted").await {
            tracing::warn!("Failed to record submission activity: {:?}", e);
        }

        self.notify(NotificationEvent::ScheduleSubmitted {
            schedule_id: updated.id,
            student_id: updated.user_id,
            week_start_date: updated.week_start_date,
        });

        Ok(updated)
    }

    pub async fn approve(&self, id: Uuid) -> Result<WorkSchedule> {
        let schedule = self.load(id).await?;
        Self::ensure_transition(&schedule, ScheduleStatus::Approved)?;

        let updated = self
            .repo
            .transition(schedule.id, schedule.status, ScheduleStatus::Approved, None)
            .await?
            .ok_or_else(|| AppError::Conflict("Schedule is not awaiting approval".to_string()))?;

        self.notify(NotificationEvent::ScheduleApproved {
            schedule_id: updated.id,
            student_id: updated.user_id,
            week_start_date: updated.week_start_date,
        });

        Ok(updated)
    }

    /// Reject a submitted schedule. An already-approved schedule can only be
    /// rejected by an admin override.
    pub async fn reject(
        &self,
        ctx: &AuthContext,
        id: Uuid,
        reason: Option<String>,
    ) -> Result<WorkSchedule> {
        let schedule = self.load(id).await?;

        match schedule.status {
            // Operator override: admins may pull back an approved schedule.
            ScheduleStatus::Approved if ctx.role == Role::Admin => {}
            ScheduleStatus::Approved => {
                return Err(AppError::Forbidden(
                    "Only an admin may reject an approved schedule".to_string(),
                ))
            }
            _ => Self::ensure_transition(&schedule, ScheduleStatus::Rejected)?,
        }

        let updated = self
            .repo
            .transition(schedule.id, schedule.status, ScheduleStatus::Rejected, None)
            .await?
            .ok_or_else(|| AppError::Conflict("Schedule is not awaiting approval".to_string()))?;

        self.notify(NotificationEvent::ScheduleRejected {
            schedule_id: updated.id,
            student_id: updated.user_id,
            week_start_date: updated.week_start_date,
            reason,
        });

        Ok(updated)
    }

    /// Reopen a rejected schedule as a draft for resubmission.
    pub async fn reopen(&self, ctx: &AuthContext, id: Uuid) -> Result<WorkSchedule> {
        let schedule = self.load_owned(ctx, id).await?;
        Self::ensure_transition(&schedule, ScheduleStatus::Draft)?;
        self.repo
            .transition(schedule.id, schedule.status, ScheduleStatus::Draft, None)
            .await?
            .ok_or_else(|| AppError::Conflict("Only rejected schedules can be reopened".to_string()))
    }

    /// Gate every status move on the lifecycle table before racing it
    /// through the repository's optimistic update.
    fn ensure_transition(schedule: &WorkSchedule, to: ScheduleStatus) -> Result<()> {
        if !schedule.status.can_transition(to) {
            return Err(AppError::Validation(format!(
                "Invalid schedule status transition: {} to {}",
                schedule.status, to
            )));
        }
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<WorkSchedule> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Schedule not found".to_string()))
    }

    async fn load_owned(&self, ctx: &AuthContext, id: Uuid) -> Result<WorkSchedule> {
        let schedule = self.load(id).await?;
        if schedule.user_id != ctx.user_id {
            return Err(AppError::Forbidden(
                "You may only modify your own schedule".to_string(),
            ));
        }
        Ok(schedule)
    }

    /// Re-run compliance after a block mutation and persist the new total
    /// back onto the schedule row.
    async fn refresh_total(&self, schedule_id: Uuid) -> Result<ComplianceResult> {
        let blocks = self.repo.find_blocks(schedule_id).await?;
        let compliance = compliance::validate(&blocks, self.min_weekly_hours);
        self.repo
            .update_total_hours(schedule_id, compliance.total_hours)
            .await?;
        Ok(compliance)
    }

    /// Delivery is best-effort and must not block or fail the caller.
    fn notify(&self, event: NotificationEvent) {
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            dispatcher.dispatch(event).await;
        });
    }
}
