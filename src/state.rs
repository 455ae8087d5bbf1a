use std::sync::Arc;

use crate::alert::{AlertConfigRepository, AlertEngine, AlertRepository};
use crate::db::DbPool;
use crate::notification::NotificationRepository;
use crate::realtime::HubHandle;
use crate::schedule::{compliance::DEFAULT_MIN_WEEKLY_HOURS, ScheduleService};
use crate::user::UserRepository;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Arc<Config>,
    pub hub: HubHandle,
    pub alert_engine: Arc<AlertEngine>,
    pub alert_repository: AlertRepository,
    pub alert_config_repository: AlertConfigRepository,
    pub notification_repository: NotificationRepository,
    pub user_repository: UserRepository,
    pub schedule_service: ScheduleService,
}

#[derive(Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub min_weekly_hours: f64,
    pub alert_scan_cron: String,
    pub ws_auth_grace_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            jwt_secret: std::env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            min_weekly_hours: std::env::var("MIN_WEEKLY_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MIN_WEEKLY_HOURS),
            alert_scan_cron: std::env::var("ALERT_SCAN_CRON")
                .unwrap_or_else(|_| "0 */5 * * * *".to_string()),
            ws_auth_grace_secs: std::env::var("WS_AUTH_GRACE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
        }
    }
}
