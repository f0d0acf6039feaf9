//! Age-based eviction of generated content
//!
//! Maintenance takes no lock. A record saved while a pass is running may or
//! may not be evaluated against the cutoff.

use chrono::{DateTime, Duration, Utc};
use postcraft_storage::{parse_timestamp, Record};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceOptions {
    pub max_age_days: u32,
}

impl Default for MaintenanceOptions {
    fn default() -> Self {
        Self { max_age_days: 30 }
    }
}

impl MaintenanceOptions {
    /// Records created before this instant are eligible. An age reaching
    /// past the representable range means nothing is eligible.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        Duration::try_days(i64::from(self.max_age_days))
            .and_then(|age| now.checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceReport {
    pub deleted_count: usize,
    /// Records left alone because their creation time could not be read
    pub skipped_count: usize,
    pub cutoff: DateTime<Utc>,
}

/// `Some(true)` when the record was created strictly before `cutoff`;
/// `None` when it has no readable creation time.
pub(crate) fn is_expired(record: &Record, cutoff: DateTime<Utc>) -> Option<bool> {
    let created = record
        .get("createdAt")
        .and_then(serde_json::Value::as_str)
        .and_then(parse_timestamp)?;
    Some(created < cutoff)
}
