use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use super::schedule_dto::{
    BlockMutationResponse, CreateBlockRequest, CreateScheduleRequest, RejectScheduleRequest,
    ScheduleResponse,
};
use super::schedule_models::WorkSchedule;
use crate::{
    error::{AppError, Result},
    middleware::{require_operator, AuthUser},
    state::AppState,
};

pub async fn create_schedule(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Json(payload): Json<CreateScheduleRequest>,
) -> Result<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let schedule = state.schedule_service.create_schedule(&ctx, payload).await?;
    Ok((StatusCode::CREATED, Json(schedule)))
}

pub async fn get_schedule(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<ScheduleResponse>> {
    let (schedule, blocks, compliance) =
        state.schedule_service.get_schedule(&ctx, schedule_id).await?;

    Ok(Json(ScheduleResponse {
        schedule,
        blocks,
        compliance,
    }))
}

pub async fn add_block(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(schedule_id): Path<Uuid>,
    Json(payload): Json<CreateBlockRequest>,
) -> Result<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let (block, compliance) = state
        .schedule_service
        .add_block(&ctx, schedule_id, payload)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(BlockMutationResponse {
            block: Some(block),
            compliance,
        }),
    ))
}

pub async fn delete_block(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path((schedule_id, block_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<BlockMutationResponse>> {
    let compliance = state
        .schedule_service
        .remove_block(&ctx, schedule_id, block_id)
        .await?;

    Ok(Json(BlockMutationResponse {
        block: None,
        compliance,
    }))
}

/// Submit a draft schedule for approval
#[utoipa::path(
    post,
    path = "/api/schedules/{id}/submit",
    params(
        ("id" = Uuid, Path, description = "Schedule ID")
    ),
    responses(
        (status = 200, description = "Schedule submitted", body = WorkSchedule),
        (status = 400, description = "Schedule out of compliance"),
        (status = 409, description = "Schedule not in draft state"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "schedules",
    security(("bearer_auth" = []))
)]
pub async fn submit_schedule(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<WorkSchedule>> {
    let schedule = state.schedule_service.submit(&ctx, schedule_id).await?;
    Ok(Json(schedule))
}

/// Approve a submitted schedule
#[utoipa::path(
    put,
    path = "/api/schedules/{id}/approve",
    params(
        ("id" = Uuid, Path, description = "Schedule ID")
    ),
    responses(
        (status = 200, description = "Schedule approved", body = WorkSchedule),
        (status = 403, description = "Operator access required"),
        (status = 409, description = "Schedule not awaiting approval")
    ),
    tag = "schedules",
    security(("bearer_auth" = []))
)]
pub async fn approve_schedule(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<WorkSchedule>> {
    require_operator(&ctx)?;
    let schedule = state.schedule_service.approve(schedule_id).await?;
    Ok(Json(schedule))
}

/// Reject a submitted schedule
#[utoipa::path(
    put,
    path = "/api/schedules/{id}/reject",
    params(
        ("id" = Uuid, Path, description = "Schedule ID")
    ),
    request_body = RejectScheduleRequest,
    responses(
        (status = 200, description = "Schedule rejected", body = WorkSchedule),
        (status = 403, description = "Operator access required"),
        (status = 409, description = "Schedule not awaiting approval")
    ),
    tag = "schedules",
    security(("bearer_auth" = []))
)]
pub async fn reject_schedule(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(schedule_id): Path<Uuid>,
    Json(payload): Json<RejectScheduleRequest>,
) -> Result<Json<WorkSchedule>> {
    require_operator(&ctx)?;
    let schedule = state
        .schedule_service
        .reject(&ctx, schedule_id, payload.reason)
        .await?;
    Ok(Json(schedule))
}

pub async fn reopen_schedule(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<WorkSchedule>> {
    let schedule = state.schedule_service.reopen(&ctx, schedule_id).await?;
    Ok(Json(schedule))
}
