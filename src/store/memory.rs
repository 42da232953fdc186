//! In-memory `TokenStore` used by tests (and available for single-node dev
//! runs). Consumption mutates the token under the map entry's exclusive
//! guard, which gives the same atomicity as the Postgres conditional update.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, DurationRound, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::analytics::{FillEvent, TokenSummary, UsageSummary, VolumeStat};
use crate::models::token::{token_prefix, CapabilityToken, UsageEvent, AUDIT_RING_CAPACITY};
use crate::store::{ConsumeDenied, ConsumeOutcome, TokenStore};

#[derive(Default)]
pub struct MemoryStore {
    tokens: DashMap<String, CapabilityToken>,
    events: Mutex<Vec<FillEvent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert_token(&self, token: &CapabilityToken) -> anyhow::Result<()> {
        self.tokens.insert(token.id.clone(), token.clone());
        Ok(())
    }

    async fn get_token(&self, token_id: &str) -> anyhow::Result<Option<CapabilityToken>> {
        Ok(self.tokens.get(token_id).map(|t| t.clone()))
    }

    async fn consume_token(
        &self,
        token_id: &str,
        now: DateTime<Utc>,
        event: UsageEvent,
    ) -> anyhow::Result<ConsumeOutcome> {
        // get_mut holds the entry's write guard for the whole check-then-act
        // sequence; concurrent consumers of the same token serialize here.
        let Some(mut entry) = self.tokens.get_mut(token_id) else {
            return Ok(ConsumeOutcome::Denied(ConsumeDenied::NotFound));
        };
        let token = entry.value_mut();

        if !token.is_active {
            return Ok(ConsumeOutcome::Denied(ConsumeDenied::Inactive));
        }
        if token.is_expired(now) {
            return Ok(ConsumeOutcome::Denied(ConsumeDenied::Expired));
        }
        if token.is_exhausted() {
            return Ok(ConsumeOutcome::Denied(ConsumeDenied::QuotaExhausted));
        }
        if let Some(wait) = token.rate_limit_wait(now) {
            return Ok(ConsumeOutcome::Denied(ConsumeDenied::RateLimited {
                retry_after_seconds: wait,
            }));
        }

        token.usage_count += 1;
        token.last_used_at = Some(now);
        token.usage_audit.push(event);
        if token.usage_audit.len() > AUDIT_RING_CAPACITY {
            let excess = token.usage_audit.len() - AUDIT_RING_CAPACITY;
            token.usage_audit.drain(..excess);
        }

        Ok(ConsumeOutcome::Granted(token.clone()))
    }

    async fn deactivate_token(&self, token_id: &str, owner_id: Uuid) -> anyhow::Result<bool> {
        let Some(mut entry) = self.tokens.get_mut(token_id) else {
            return Ok(false);
        };
        let token = entry.value_mut();
        if token.owner_id != owner_id || !token.is_active {
            return Ok(false);
        }
        token.is_active = false;
        Ok(true)
    }

    async fn list_tokens(
        &self,
        owner_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<TokenSummary>> {
        let mut owned: Vec<CapabilityToken> = self
            .tokens
            .iter()
            .filter(|t| t.owner_id == owner_id)
            .map(|t| t.clone())
            .collect();
        owned.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));

        Ok(owned
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|t| TokenSummary {
                token_prefix: token_prefix(&t.id),
                project_id: t.project_id,
                usage_count: t.usage_count,
                max_usage: t.max_usage,
                is_active: t.is_active,
                issued_at: t.issued_at,
                expires_at: t.expires_at,
                last_used_at: t.last_used_at,
            })
            .collect())
    }

    async fn record_fill_event(&self, event: &FillEvent) -> anyhow::Result<()> {
        self.events
            .lock()
            .expect("fill-event lock poisoned")
            .push(event.clone());
        Ok(())
    }

    async fn usage_summary(&self, owner_id: Uuid, hours: i32) -> anyhow::Result<UsageSummary> {
        let since = Utc::now() - Duration::hours(hours as i64);
        let events = self.events.lock().expect("fill-event lock poisoned");

        let window: Vec<&FillEvent> = events
            .iter()
            .filter(|e| e.owner_id == owner_id && e.occurred_at > since)
            .collect();

        let mut tokens: Vec<&str> = window.iter().map(|e| e.token_id.as_str()).collect();
        tokens.sort_unstable();
        tokens.dedup();

        let mut ips: Vec<&str> = window
            .iter()
            .filter_map(|e| e.caller_ip.as_deref())
            .collect();
        ips.sort_unstable();
        ips.dedup();

        Ok(UsageSummary {
            total_fills: window.len() as i64,
            distinct_tokens: tokens.len() as i64,
            distinct_ips: ips.len() as i64,
        })
    }

    async fn usage_volume(&self, owner_id: Uuid, hours: i32) -> anyhow::Result<Vec<VolumeStat>> {
        let since = Utc::now() - Duration::hours(hours as i64);
        let events = self.events.lock().expect("fill-event lock poisoned");

        let mut buckets: Vec<(DateTime<Utc>, i64)> = Vec::new();
        for event in events
            .iter()
            .filter(|e| e.owner_id == owner_id && e.occurred_at > since)
        {
            let bucket = event
                .occurred_at
                .duration_trunc(Duration::hours(1))
                .unwrap_or(event.occurred_at);
            match buckets.iter_mut().find(|(b, _)| *b == bucket) {
                Some((_, count)) => *count += 1,
                None => buckets.push((bucket, 1)),
            }
        }
        buckets.sort_by_key(|(b, _)| *b);

        Ok(buckets
            .into_iter()
            .map(|(bucket, count)| VolumeStat { bucket, count })
            .collect())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> anyhow::Result<u64> {
        let before = self.tokens.len();
        self.tokens.retain(|_, t| t.expires_at > now);
        Ok((before - self.tokens.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tier::TierLimits;

    fn limits(max_usage: i32, rate: i64) -> TierLimits {
        TierLimits {
            max_usage,
            ttl_hours: 24,
            rate_limit_seconds: rate,
        }
    }

    fn event(now: DateTime<Utc>) -> UsageEvent {
        UsageEvent {
            at: now,
            caller_ip: Some("203.0.113.9".into()),
            user_agent: Some("test-agent".into()),
        }
    }

    #[tokio::test]
    async fn consume_increments_and_stamps() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let token = CapabilityToken::issue(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Default::default(),
            &limits(3, 0),
            now,
        );
        store.insert_token(&token).await.unwrap();

        let outcome = store.consume_token(&token.id, now, event(now)).await.unwrap();
        let ConsumeOutcome::Granted(after) = outcome else {
            panic!("expected grant");
        };
        assert_eq!(after.usage_count, 1);
        assert_eq!(after.last_used_at, Some(now));
        assert_eq!(after.usage_audit.len(), 1);
    }

    #[tokio::test]
    async fn audit_ring_is_bounded() {
        let store = MemoryStore::new();
        let issued = Utc::now();
        let token = CapabilityToken::issue(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Default::default(),
            &limits(50, 0),
            issued,
        );
        store.insert_token(&token).await.unwrap();

        for i in 0..15 {
            let now = issued + Duration::seconds(i);
            let outcome = store.consume_token(&token.id, now, event(now)).await.unwrap();
            assert!(matches!(outcome, ConsumeOutcome::Granted(_)));
        }

        let after = store.get_token(&token.id).await.unwrap().unwrap();
        assert_eq!(after.usage_count, 15);
        assert_eq!(after.usage_audit.len(), AUDIT_RING_CAPACITY);
        // Ring keeps the newest events.
        assert_eq!(
            after.usage_audit.last().unwrap().at,
            issued + Duration::seconds(14)
        );
    }

    #[tokio::test]
    async fn deactivate_is_owner_scoped_and_one_way() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let token = CapabilityToken::issue(
            owner,
            Uuid::new_v4(),
            Default::default(),
            &limits(3, 0),
            Utc::now(),
        );
        store.insert_token(&token).await.unwrap();

        assert!(!store
            .deactivate_token(&token.id, Uuid::new_v4())
            .await
            .unwrap());
        assert!(store.deactivate_token(&token.id, owner).await.unwrap());
        // Second deactivation reports false — already inactive.
        assert!(!store.deactivate_token(&token.id, owner).await.unwrap());
    }

    #[tokio::test]
    async fn delete_expired_sweeps_only_past_tokens() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let live = CapabilityToken::issue(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Default::default(),
            &limits(3, 0),
            now,
        );
        let mut dead = CapabilityToken::issue(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Default::default(),
            &limits(3, 0),
            now,
        );
        dead.expires_at = now - Duration::hours(1);
        store.insert_token(&live).await.unwrap();
        store.insert_token(&dead).await.unwrap();

        assert_eq!(store.delete_expired(now).await.unwrap(), 1);
        assert!(store.get_token(&live.id).await.unwrap().is_some());
        assert!(store.get_token(&dead.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn listing_paginates_newest_first_with_prefixes_only() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let base = Utc::now();
        for i in 0..3 {
            let mut t = CapabilityToken::issue(
                owner,
                Uuid::new_v4(),
                Default::default(),
                &limits(3, 0),
                base,
            );
            t.issued_at = base + Duration::seconds(i);
            store.insert_token(&t).await.unwrap();
        }

        let page = store.list_tokens(owner, 2, 0).await.unwrap();
        assert_eq!(page.len(), 2);
        assert!(page[0].issued_at > page[1].issued_at);
        for summary in &page {
            assert_eq!(summary.token_prefix.len(), 12);
        }

        let rest = store.list_tokens(owner, 2, 2).await.unwrap();
        assert_eq!(rest.len(), 1);
    }
}
