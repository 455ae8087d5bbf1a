use std::collections::HashMap;

use chrono::NaiveDate;

use super::alert_models::AlertType;

/// Per-(type, subject) daily emission counters. The window is the UTC
/// calendar day; counters clear on the first acquire after midnight.
///
/// The limiter is process-local state: the scan path is the single writer
/// (scans are serialized by the engine's single-flight guard) and a restart
/// starts the day's counts over.
#[derive(Debug)]
pub struct DailyRateLimiter {
    day: NaiveDate,
    counts: HashMap<(AlertType, String), u32>,
}

impl DailyRateLimiter {
    pub fn new(day: NaiveDate) -> Self {
        Self {
            day,
            counts: HashMap::new(),
        }
    }

    /// Returns true and counts the emission when the subject is still under
    /// its daily budget; false drops the candidate until the next UTC day.
    pub fn try_acquire(
        &mut self,
        today: NaiveDate,
        alert_type: AlertType,
        subject_key: &str,
        max_per_day: u32,
    ) -> bool {
        if today != self.day {
            self.day = today;
            self.counts.clear();
        }

        let count = self
            .counts
            .entry((alert_type, subject_key.to_string()))
            .or_insert(0);
        if *count >= max_per_day {
            return false;
        }
        *count += 1;
        true
    }
}
