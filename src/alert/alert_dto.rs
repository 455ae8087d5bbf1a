use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use super::alert_models::Thresholds;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AlertListQuery {
    pub severity: Option<String>,
    #[serde(rename = "type")]
    pub alert_type: Option<String>,
    pub resolved: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolveAlertRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateAlertConfigRequest {
    pub is_enabled: Option<bool>,
    pub thresholds: Option<Thresholds>,
    pub channel_in_app: Option<bool>,
    pub channel_email: Option<bool>,
    #[validate(range(min = 1, max = 1000))]
    pub max_alerts_per_day: Option<i32>,
    #[validate(range(min = 0, max = 720))]
    pub cooldown_hours: Option<i32>,
}
