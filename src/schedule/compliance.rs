use chrono::NaiveTime;
use serde::Serialize;

use super::schedule_models::ScheduleBlock;

pub const DEFAULT_MIN_WEEKLY_HOURS: f64 = 20.0;

/// A single lab-policy violation, rendered verbatim to the student on a
/// blocked submission.
#[derive(Debug, Clone, PartialEq)]
pub enum ComplianceViolation {
    MinimumHoursNotMet {
        total: f64,
        required: f64,
    },
    OverlappingBlocks {
        day_of_week: i16,
        first_start: NaiveTime,
        second_start: NaiveTime,
    },
    InvalidBlockDuration {
        day_of_week: i16,
        start: NaiveTime,
        end: NaiveTime,
    },
}

impl std::fmt::Display for ComplianceViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComplianceViolation::MinimumHoursNotMet { total, required } => {
                write!(f, "minimum hours not met ({total} < {required})")
            }
            ComplianceViolation::OverlappingBlocks {
                day_of_week,
                first_start,
                second_start,
            } => write!(
                f,
                "overlapping blocks on day {day_of_week} (starting {first_start} and {second_start})"
            ),
            ComplianceViolation::InvalidBlockDuration {
                day_of_week,
                start,
                end,
            } => write!(
                f,
                "block on day {day_of_week} has non-positive duration ({start} to {end})"
            ),
        }
    }
}

impl Serialize for ComplianceViolation {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Outcome of a compliance check. Derived from the current blocks on every
/// call and never cached; blocks can change between calls.
#[derive(Debug, Clone, Serialize)]
pub struct ComplianceResult {
    pub total_hours: f64,
    pub is_valid: bool,
    pub violations: Vec<ComplianceViolation>,
}

/// Evaluate a week's blocks against lab policy.
///
/// Violations are checked in a fixed order and all of them are reported:
/// minimum weekly hours, same-day overlaps, non-positive block durations.
/// Pure over its inputs; persisting `total_hours` back onto the schedule is
/// the caller's job.
pub fn validate(blocks: &[ScheduleBlock], minimum_hours: f64) -> ComplianceResult {
    let total_hours: f64 = blocks.iter().map(ScheduleBlock::duration_hours).sum();

    let mut violations = Vec::new();

    if total_hours < minimum_hours {
        violations.push(ComplianceViolation::MinimumHoursNotMet {
            total: total_hours,
            required: minimum_hours,
        });
    }

    // Same-day [start, end) overlaps. Empty intervals cannot overlap.
    for (i, a) in blocks.iter().enumerate() {
        for b in &blocks[i + 1..] {
            if a.day_of_week == b.day_of_week
                && a.start_time < b.end_time
                && b.start_time < a.end_time
            {
                violations.push(ComplianceViolation::OverlappingBlocks {
                    day_of_week: a.day_of_week,
                    first_start: a.start_time,
                    second_start: b.start_time,
                });
            }
        }
    }

    for block in blocks {
        if block.end_time <= block.start_time {
            violations.push(ComplianceViolation::InvalidBlockDuration {
                day_of_week: block.day_of_week,
                start: block.start_time,
                end: block.end_time,
            });
        }
    }

    ComplianceResult {
        total_hours,
        is_valid: violations.is_empty(),
        violations,
    }
}
