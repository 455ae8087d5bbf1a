use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::compliance::ComplianceResult;
use super::schedule_models::{ScheduleBlock, WorkSchedule};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateScheduleRequest {
    pub week_start_date: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBlockRequest {
    #[validate(range(min = 0, max = 6))]
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[validate(length(min = 1, max = 255))]
    pub location: String,
    #[validate(length(min = 1, max = 255))]
    pub activity: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RejectScheduleRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    #[serde(flatten)]
    pub schedule: WorkSchedule,
    pub blocks: Vec<ScheduleBlock>,
    pub compliance: ComplianceResult,
}

#[derive(Debug, Serialize)]
pub struct BlockMutationResponse {
    pub block: Option<ScheduleBlock>,
    pub compliance: ComplianceResult,
}
