use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use super::alert_config::AlertConfigStore;
use super::alert_dto::{AlertListQuery, ResolveAlertRequest, UpdateAlertConfigRequest};
use super::alert_models::{Alert, AlertConfig, AlertSeverity, AlertType};
use super::alert_repository::{AlertFilters, AlertStats, AlertStore};
use super::rule_engine::ScanSummary;
use crate::{
    error::{AppError, Result},
    middleware::{require_admin, require_operator, AuthUser},
    state::AppState,
};

/// Trigger an on-demand scan
#[utoipa::path(
    post,
    path = "/api/alerts/generate",
    responses(
        (status = 200, description = "Scan finished; coalesced with any scan already in flight", body = ScanSummary),
        (status = 403, description = "Operator access required"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "alerts",
    security(("bearer_auth" = []))
)]
pub async fn generate_alerts(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
) -> Result<Json<ScanSummary>> {
    require_operator(&ctx)?;
    let summary = state.alert_engine.run_scan().await;
    Ok(Json(summary))
}

/// List alerts, optionally filtered by severity, type and resolution state
#[utoipa::path(
    get,
    path = "/api/alerts",
    params(
        ("severity" = Option<String>, Query, description = "Filter by severity"),
        ("type" = Option<String>, Query, description = "Filter by alert type"),
        ("resolved" = Option<bool>, Query, description = "Filter by resolution state")
    ),
    responses(
        (status = 200, description = "List of alerts", body = Vec<Alert>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "alerts",
    security(("bearer_auth" = []))
)]
pub async fn list_alerts(
    State(state): State<AppState>,
    AuthUser(_ctx): AuthUser,
    Query(query): Query<AlertListQuery>,
) -> Result<Json<Vec<Alert>>> {
    let severity = query
        .severity
        .map(|s| s.parse::<AlertSeverity>())
        .transpose()
        .map_err(AppError::Validation)?;
    let alert_type = query
        .alert_type
        .map(|t| t.parse::<AlertType>())
        .transpose()
        .map_err(AppError::Validation)?;

    let alerts = state
        .alert_repository
        .list(AlertFilters {
            severity,
            alert_type,
            resolved: query.resolved,
        })
        .await?;
    Ok(Json(alerts))
}

/// Resolve an alert (idempotent)
#[utoipa::path(
    patch,
    path = "/api/alerts/{id}/resolve",
    params(
        ("id" = Uuid, Path, description = "Alert ID")
    ),
    request_body = ResolveAlertRequest,
    responses(
        (status = 200, description = "Alert resolved (or already resolved)", body = Alert),
        (status = 404, description = "Alert not found"),
        (status = 403, description = "Operator access required")
    ),
    tag = "alerts",
    security(("bearer_auth" = []))
)]
pub async fn resolve_alert(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(alert_id): Path<Uuid>,
    Json(payload): Json<ResolveAlertRequest>,
) -> Result<Json<Alert>> {
    require_operator(&ctx)?;
    let alert = state
        .alert_repository
        .resolve(alert_id, payload.reason.as_deref())
        .await?;
    Ok(Json(alert))
}

/// Alert counts by severity and type
#[utoipa::path(
    get,
    path = "/api/alerts/stats",
    responses(
        (status = 200, description = "Aggregate alert counts", body = AlertStats),
        (status = 401, description = "Unauthorized")
    ),
    tag = "alerts",
    security(("bearer_auth" = []))
)]
pub async fn alert_stats(
    State(state): State<AppState>,
    AuthUser(_ctx): AuthUser,
) -> Result<Json<AlertStats>> {
    let stats = state.alert_repository.stats().await?;
    Ok(Json(stats))
}

pub async fn list_alert_configs(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
) -> Result<Json<Vec<AlertConfig>>> {
    require_operator(&ctx)?;
    let configs = state.alert_config_repository.load_all().await?;
    Ok(Json(configs))
}

pub async fn update_alert_config(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(alert_type): Path<String>,
    Json(payload): Json<UpdateAlertConfigRequest>,
) -> Result<Json<AlertConfig>> {
    require_admin(&ctx)?;
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let alert_type = alert_type
        .parse::<AlertType>()
        .map_err(AppError::Validation)?;

    let config = state
        .alert_config_repository
        .update(alert_type, &payload)
        .await?;
    Ok(Json(config))
}
