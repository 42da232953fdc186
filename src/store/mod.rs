use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::analytics::{FillEvent, TokenSummary, UsageSummary, VolumeStat};
use crate::models::token::{CapabilityToken, UsageEvent};

pub mod memory;
pub mod postgres;

/// Why a consumption attempt was denied, in check order: existence, active
/// flag, expiry, quota, rate floor. The first failing check determines the
/// variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeDenied {
    NotFound,
    /// Terminal: the owner (or policy) deactivated the token.
    Inactive,
    /// Terminal: past `expires_at`.
    Expired,
    /// Terminal: `usage_count` reached `max_usage`; no replenishment.
    QuotaExhausted,
    /// Transient: the caller may retry after the given wait.
    RateLimited { retry_after_seconds: i64 },
}

/// Result of an atomic consumption attempt. A grant carries the token state
/// *after* the increment, so callers can report remaining uses directly.
#[derive(Debug)]
pub enum ConsumeOutcome {
    Granted(CapabilityToken),
    Denied(ConsumeDenied),
}

/// Repository interface for capability tokens and their usage analytics.
///
/// Injected into the issuance and consumption services rather than accessed
/// as a singleton, so tests substitute the in-memory implementation.
///
/// `consume_token` is the one operation with a hard atomicity contract: the
/// quota check, counter increment, `last_used_at` stamp, and audit-ring
/// append must be indivisible with respect to concurrent attempts on the
/// same token. Two callers racing on the last remaining use must see exactly
/// one grant.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert_token(&self, token: &CapabilityToken) -> anyhow::Result<()>;

    async fn get_token(&self, token_id: &str) -> anyhow::Result<Option<CapabilityToken>>;

    /// Atomically validate and consume one use. Fully succeeds (counted) or
    /// fully fails (not counted) — no partial state.
    async fn consume_token(
        &self,
        token_id: &str,
        now: DateTime<Utc>,
        event: UsageEvent,
    ) -> anyhow::Result<ConsumeOutcome>;

    /// Owner-scoped, one-way deactivation. Returns false when the token does
    /// not exist, belongs to someone else, or is already inactive.
    async fn deactivate_token(&self, token_id: &str, owner_id: Uuid) -> anyhow::Result<bool>;

    /// Paginated summaries for an owner — truncated prefixes only.
    async fn list_tokens(
        &self,
        owner_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<TokenSummary>>;

    /// Append-only analytics row; best-effort, never load-bearing for the
    /// security decision.
    async fn record_fill_event(&self, event: &FillEvent) -> anyhow::Result<()>;

    async fn usage_summary(&self, owner_id: Uuid, hours: i32) -> anyhow::Result<UsageSummary>;

    async fn usage_volume(&self, owner_id: Uuid, hours: i32) -> anyhow::Result<Vec<VolumeStat>>;

    /// Garbage-collect tokens past `expires_at`. Returns rows removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> anyhow::Result<u64>;
}
