use serde::{Deserialize, Serialize};

/// Issuance parameters for one subscription tier.
///
/// These numbers are policy, not protocol: the table below is data, and a new
/// tier slots in without touching issuance or consumption code. A tier with
/// `max_usage == 0` does not grant the bookmarklet capability at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLimits {
    pub max_usage: i32,
    pub ttl_hours: i64,
    pub rate_limit_seconds: i64,
}

impl TierLimits {
    pub fn grants_capability(&self) -> bool {
        self.max_usage > 0
    }
}

/// Tier-dependent quota/expiry/rate-limit parameters for a user.
///
/// Fails closed: an unknown tier maps to the most restrictive issuable row,
/// never to unlimited.
pub trait SubscriptionPolicy: Send + Sync {
    fn limits_for(&self, tier: &str) -> TierLimits;
}

/// Table-driven policy. The default table carries the launch tiers; a custom
/// table can be injected (tests, per-deployment overrides).
pub struct TierTable {
    rows: Vec<(String, TierLimits)>,
    fallback: TierLimits,
}

const DEFAULT_TIERS: &[(&str, TierLimits)] = &[
    (
        "free",
        TierLimits {
            max_usage: 10,
            ttl_hours: 24,
            rate_limit_seconds: 5,
        },
    ),
    (
        "pro",
        TierLimits {
            max_usage: 50,
            ttl_hours: 72,
            rate_limit_seconds: 2,
        },
    ),
    (
        "agency",
        TierLimits {
            max_usage: 100,
            ttl_hours: 168,
            rate_limit_seconds: 1,
        },
    ),
];

impl TierTable {
    /// Custom table. The first row doubles as the fail-closed fallback, so
    /// order rows from most to least restrictive.
    pub fn new(rows: Vec<(String, TierLimits)>) -> Self {
        let fallback = rows.first().map(|(_, l)| *l).unwrap_or(TierLimits {
            max_usage: 0,
            ttl_hours: 0,
            rate_limit_seconds: 0,
        });
        Self { rows, fallback }
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self::new(
            DEFAULT_TIERS
                .iter()
                .map(|(name, limits)| (name.to_string(), *limits))
                .collect(),
        )
    }
}

impl SubscriptionPolicy for TierTable {
    fn limits_for(&self, tier: &str) -> TierLimits {
        self.rows
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(tier))
            .map(|(_, limits)| *limits)
            .unwrap_or(self.fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_matches_launch_tiers() {
        let policy = TierTable::default();

        let free = policy.limits_for("free");
        assert_eq!(free.max_usage, 10);
        assert_eq!(free.ttl_hours, 24);
        assert_eq!(free.rate_limit_seconds, 5);

        let agency = policy.limits_for("agency");
        assert_eq!(agency.max_usage, 100);
        assert_eq!(agency.ttl_hours, 168);
        assert_eq!(agency.rate_limit_seconds, 1);
    }

    #[test]
    fn unknown_tier_fails_closed_to_most_restrictive() {
        let policy = TierTable::default();
        assert_eq!(policy.limits_for("platinum"), policy.limits_for("free"));
        assert_eq!(policy.limits_for(""), policy.limits_for("free"));
    }

    #[test]
    fn tier_lookup_is_case_insensitive() {
        let policy = TierTable::default();
        assert_eq!(policy.limits_for("PRO"), policy.limits_for("pro"));
    }

    #[test]
    fn zero_usage_tier_does_not_grant_capability() {
        let policy = TierTable::new(vec![(
            "suspended".into(),
            TierLimits {
                max_usage: 0,
                ttl_hours: 0,
                rate_limit_seconds: 0,
            },
        )]);
        assert!(!policy.limits_for("suspended").grants_capability());
        // Unknown tiers inherit the suspended fallback, not something looser.
        assert!(!policy.limits_for("pro").grants_capability());
    }
}
