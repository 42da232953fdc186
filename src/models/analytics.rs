use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Listing row for a token: truncated prefix only, never the full id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSummary {
    pub token_prefix: String,
    pub project_id: Uuid,
    pub usage_count: i32,
    pub max_usage: i32,
    pub is_active: bool,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// One recorded consumption, as stored in the analytics table. Unlike the
/// on-token audit ring this table is append-only and unbounded (subject to
/// retention), so windowed aggregates stay meaningful.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillEvent {
    pub token_id: String,
    pub owner_id: Uuid,
    pub project_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub caller_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Aggregate usage over a caller-selected window.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct UsageSummary {
    pub total_fills: i64,
    pub distinct_tokens: i64,
    pub distinct_ips: i64,
}

/// Hourly fill volume bucket for sparklines.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct VolumeStat {
    pub bucket: DateTime<Utc>,
    pub count: i64,
}
