use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::profile::BusinessProfileSnapshot;
use crate::models::tier::TierLimits;

/// The audit ring keeps only the newest consumption events. It exists for
/// anomaly review, not enforcement — quota and rate limits never read it.
pub const AUDIT_RING_CAPACITY: usize = 10;

/// Characters of the token id shown in listings after creation. The full id
/// is returned exactly once, at issuance.
pub const TOKEN_PREFIX_LEN: usize = 12;

/// One successful consumption, as recorded in the audit ring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    pub at: DateTime<Utc>,
    pub caller_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// A short-lived, usage-capped, rate-limited capability token.
///
/// The id is the sole credential: an opaque, high-entropy identifier backed
/// by server-side state. Validity requires all three of `is_active`,
/// `usage_count < max_usage`, and `now < expires_at`; the checks are
/// independent and each is individually necessary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityToken {
    pub id: String,
    pub owner_id: Uuid,
    pub project_id: Uuid,
    pub data_snapshot: BusinessProfileSnapshot,
    pub usage_count: i32,
    pub max_usage: i32,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    /// None until the first successful consumption, so the rate floor never
    /// blocks the first call.
    pub last_used_at: Option<DateTime<Utc>>,
    pub min_interval_seconds: i64,
    pub usage_audit: Vec<UsageEvent>,
}

impl CapabilityToken {
    /// Build a fresh token for an owner/project with tier-driven limits.
    /// `expires_at` and `max_usage` are fixed here and never change.
    pub fn issue(
        owner_id: Uuid,
        project_id: Uuid,
        snapshot: BusinessProfileSnapshot,
        limits: &TierLimits,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: generate_token_id(),
            owner_id,
            project_id,
            data_snapshot: snapshot,
            usage_count: 0,
            max_usage: limits.max_usage,
            issued_at: now,
            expires_at: now + Duration::hours(limits.ttl_hours),
            is_active: true,
            last_used_at: None,
            min_interval_seconds: limits.rate_limit_seconds,
            usage_audit: Vec::new(),
        }
    }

    pub fn remaining_uses(&self) -> i32 {
        (self.max_usage - self.usage_count).max(0)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_exhausted(&self) -> bool {
        self.usage_count >= self.max_usage
    }

    /// Seconds a caller must still wait before the rate floor permits the
    /// next consumption. None when no wait is required.
    pub fn rate_limit_wait(&self, now: DateTime<Utc>) -> Option<i64> {
        let last = self.last_used_at?;
        let elapsed = (now - last).num_seconds();
        let wait = self.min_interval_seconds - elapsed;
        (wait > 0).then_some(wait)
    }

    /// Listing-safe identifier: a truncated prefix, never the full id.
    pub fn display_prefix(&self) -> String {
        token_prefix(&self.id)
    }
}

/// Generate an unguessable token id: 16 OS-random bytes, hex-encoded (128
/// bits of entropy) behind a versioned prefix.
pub fn generate_token_id() -> String {
    let mut random_bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut random_bytes);
    format!("flg_v1_{}", hex::encode(random_bytes))
}

pub fn token_prefix(id: &str) -> String {
    id.chars().take(TOKEN_PREFIX_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tier::TierLimits;

    fn limits() -> TierLimits {
        TierLimits {
            max_usage: 10,
            ttl_hours: 24,
            rate_limit_seconds: 5,
        }
    }

    #[test]
    fn issued_token_starts_clean() {
        let now = Utc::now();
        let t = CapabilityToken::issue(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Default::default(),
            &limits(),
            now,
        );

        assert_eq!(t.usage_count, 0);
        assert!(t.is_active);
        assert!(t.last_used_at.is_none());
        assert_eq!(t.expires_at, now + Duration::hours(24));
        assert_eq!(t.remaining_uses(), 10);
        assert!(!t.is_expired(now));
        assert!(!t.is_exhausted());
    }

    #[test]
    fn token_ids_are_long_and_distinct() {
        let a = generate_token_id();
        let b = generate_token_id();
        assert_ne!(a, b);
        assert!(a.starts_with("flg_v1_"));
        // 32 hex chars of randomness after the prefix.
        assert_eq!(a.len(), "flg_v1_".len() + 32);
    }

    #[test]
    fn rate_limit_wait_skipped_before_first_use() {
        let now = Utc::now();
        let t = CapabilityToken::issue(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Default::default(),
            &limits(),
            now,
        );
        assert_eq!(t.rate_limit_wait(now), None);
    }

    #[test]
    fn rate_limit_wait_counts_down_from_last_use() {
        let now = Utc::now();
        let mut t = CapabilityToken::issue(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Default::default(),
            &limits(),
            now,
        );
        t.last_used_at = Some(now);

        assert_eq!(t.rate_limit_wait(now), Some(5));
        assert_eq!(t.rate_limit_wait(now + Duration::seconds(3)), Some(2));
        assert_eq!(t.rate_limit_wait(now + Duration::seconds(5)), None);
    }

    #[test]
    fn display_prefix_truncates() {
        let t = CapabilityToken::issue(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Default::default(),
            &limits(),
            Utc::now(),
        );
        assert_eq!(t.display_prefix().len(), TOKEN_PREFIX_LEN);
        assert!(t.id.starts_with(&t.display_prefix()));
    }
}
