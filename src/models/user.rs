use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Time between two quota resets of the same user.
pub const QUOTA_PERIOD_HOURS: i64 = 24;

pub const DEFAULT_DAILY_QUOTA: i32 = 50;

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub google_id: String,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub daily_request_quota: i32,
    pub remaining_requests: i32,
    pub last_reset: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Quota metadata attached to every data API response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaInfo {
    pub remaining_requests: i32,
    pub daily_request_quota: i32,
    pub last_reset: DateTime<Utc>,
}

impl User {
    pub fn quota_info(&self) -> QuotaInfo {
        QuotaInfo {
            remaining_requests: self.remaining_requests,
            daily_request_quota: self.daily_request_quota,
            last_reset: self.last_reset,
        }
    }

    pub fn reset_due(&self, now: DateTime<Utc>) -> bool {
        now - self.last_reset >= Duration::hours(QUOTA_PERIOD_HOURS)
    }

    /// Restore the full quota when the last reset is at least one period old.
    pub fn reset_if_due(&mut self, now: DateTime<Utc>) -> bool {
        if !self.reset_due(now) {
            return false;
        }
        self.remaining_requests = self.daily_request_quota;
        self.last_reset = now;
        true
    }
}
