use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::analytics::{FillEvent, TokenSummary, UsageSummary, VolumeStat};
use crate::models::profile::BusinessProfileSnapshot;
use crate::models::token::{CapabilityToken, UsageEvent, AUDIT_RING_CAPACITY};
use crate::store::{ConsumeDenied, ConsumeOutcome, TokenStore};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // -- Owner Operations --

    /// Look up an owner by the SHA-256 hash of their API key.
    /// Inactive owners do not resolve.
    pub async fn get_owner_by_key_hash(&self, key_hash: &str) -> anyhow::Result<Option<OwnerRow>> {
        let row = sqlx::query_as::<_, OwnerRow>(
            "SELECT id, email, tier, api_key_hash, is_active, created_at FROM owners WHERE api_key_hash = $1 AND is_active = true"
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    // -- Project Operations --

    pub async fn get_project(&self, project_id: Uuid) -> anyhow::Result<Option<ProjectRow>> {
        let row = sqlx::query_as::<_, ProjectRow>(
            r#"SELECT id, owner_id, name, email, phone, company, url, description,
                      address, city, state, country, postal_code, created_at
               FROM projects WHERE id = $1"#,
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn insert_token(&self, token: &CapabilityToken) -> anyhow::Result<()> {
        sqlx::query(
            r#"INSERT INTO capability_tokens
                   (id, owner_id, project_id, data_snapshot, usage_count, max_usage,
                    issued_at, expires_at, is_active, last_used_at, min_interval_seconds, usage_audit)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"#,
        )
        .bind(&token.id)
        .bind(token.owner_id)
        .bind(token.project_id)
        .bind(serde_json::to_value(&token.data_snapshot)?)
        .bind(token.usage_count)
        .bind(token.max_usage)
        .bind(token.issued_at)
        .bind(token.expires_at)
        .bind(token.is_active)
        .bind(token.last_used_at)
        .bind(token.min_interval_seconds)
        .bind(serde_json::to_value(&token.usage_audit)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_token(&self, token_id: &str) -> anyhow::Result<Option<CapabilityToken>> {
        let row = sqlx::query_as::<_, TokenRow>(
            r#"SELECT id, owner_id, project_id, data_snapshot, usage_count, max_usage,
                      issued_at, expires_at, is_active, last_used_at, min_interval_seconds, usage_audit
               FROM capability_tokens WHERE id = $1"#,
        )
        .bind(token_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CapabilityToken::try_from).transpose()
    }

    async fn consume_token(
        &self,
        token_id: &str,
        now: DateTime<Utc>,
        event: UsageEvent,
    ) -> anyhow::Result<ConsumeOutcome> {
        // Single conditional update: the database re-checks every validity
        // guard under its row lock, so two concurrent callers racing on the
        // last remaining use cannot both pass. The audit-ring append rides
        // the same statement and is trimmed to the newest entries in place.
        let appended = serde_json::to_value(vec![&event])?;
        let row = sqlx::query_as::<_, TokenRow>(
            r#"UPDATE capability_tokens
               SET usage_count = usage_count + 1,
                   last_used_at = $2,
                   usage_audit = (
                       SELECT COALESCE(jsonb_agg(elem ORDER BY idx), '[]'::jsonb)
                       FROM (
                           SELECT elem, idx
                           FROM jsonb_array_elements(usage_audit || $3::jsonb)
                                WITH ORDINALITY AS entries(elem, idx)
                           ORDER BY idx DESC
                           LIMIT $4
                       ) newest
                   )
               WHERE id = $1
                 AND is_active
                 AND usage_count < max_usage
                 AND expires_at > $2
                 AND (last_used_at IS NULL
                      OR last_used_at + make_interval(secs => min_interval_seconds::double precision) <= $2)
               RETURNING id, owner_id, project_id, data_snapshot, usage_count, max_usage,
                         issued_at, expires_at, is_active, last_used_at, min_interval_seconds, usage_audit"#,
        )
        .bind(token_id)
        .bind(now)
        .bind(appended)
        .bind(AUDIT_RING_CAPACITY as i64)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(ConsumeOutcome::Granted(CapabilityToken::try_from(row)?));
        }

        // No row updated — re-read to report which guard failed, in check
        // order. The read races with other consumers by nature; the answer
        // is advisory, the grant decision above is not.
        let denial = match self.get_token(token_id).await? {
            None => ConsumeDenied::NotFound,
            Some(t) if !t.is_active => ConsumeDenied::Inactive,
            Some(t) if t.is_expired(now) => ConsumeDenied::Expired,
            Some(t) if t.is_exhausted() => ConsumeDenied::QuotaExhausted,
            Some(t) => ConsumeDenied::RateLimited {
                retry_after_seconds: t.rate_limit_wait(now).unwrap_or(1),
            },
        };
        Ok(ConsumeOutcome::Denied(denial))
    }

    async fn deactivate_token(&self, token_id: &str, owner_id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE capability_tokens SET is_active = false WHERE id = $1 AND owner_id = $2 AND is_active = true"
        )
        .bind(token_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_tokens(
        &self,
        owner_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<TokenSummary>> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            r#"SELECT LEFT(id, 12) AS token_prefix, project_id, usage_count, max_usage,
                      is_active, issued_at, expires_at, last_used_at
               FROM capability_tokens
               WHERE owner_id = $1
               ORDER BY issued_at DESC
               LIMIT $2 OFFSET $3"#,
        )
        .bind(owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TokenSummary::from).collect())
    }

    async fn record_fill_event(&self, event: &FillEvent) -> anyhow::Result<()> {
        sqlx::query(
            r#"INSERT INTO fill_events (token_id, owner_id, project_id, occurred_at, caller_ip, user_agent)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(&event.token_id)
        .bind(event.owner_id)
        .bind(event.project_id)
        .bind(event.occurred_at)
        .bind(&event.caller_ip)
        .bind(&event.user_agent)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn usage_summary(&self, owner_id: Uuid, hours: i32) -> anyhow::Result<UsageSummary> {
        let row = sqlx::query_as::<_, UsageSummary>(
            r#"
            SELECT
                count(*)::bigint as total_fills,
                count(distinct token_id)::bigint as distinct_tokens,
                count(distinct caller_ip)::bigint as distinct_ips
            FROM fill_events
            WHERE owner_id = $1 AND occurred_at > now() - ($2 || ' hours')::interval
            "#,
        )
        .bind(owner_id)
        .bind(hours.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn usage_volume(&self, owner_id: Uuid, hours: i32) -> anyhow::Result<Vec<VolumeStat>> {
        let rows = sqlx::query_as::<_, VolumeStat>(
            r#"
            SELECT
                date_trunc('hour', occurred_at) as bucket,
                count(*)::bigint as count
            FROM fill_events
            WHERE owner_id = $1 AND occurred_at > now() - ($2 || ' hours')::interval
            GROUP BY 1
            ORDER BY 1 ASC
            "#,
        )
        .bind(owner_id)
        .bind(hours.to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM capability_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// -- Output structs --

#[derive(Debug, sqlx::FromRow, Serialize, Deserialize)]
pub struct OwnerRow {
    pub id: Uuid,
    pub email: String,
    pub tier: String,
    pub api_key_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow, Serialize, Deserialize)]
pub struct ProjectRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub url: String,
    pub description: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub postal_code: String,
    pub created_at: DateTime<Utc>,
}

impl ProjectRow {
    pub fn snapshot(&self) -> BusinessProfileSnapshot {
        BusinessProfileSnapshot {
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            company: self.company.clone(),
            url: self.url.clone(),
            description: self.description.clone(),
            address: self.address.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            country: self.country.clone(),
            postal_code: self.postal_code.clone(),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TokenRow {
    id: String,
    owner_id: Uuid,
    project_id: Uuid,
    data_snapshot: serde_json::Value,
    usage_count: i32,
    max_usage: i32,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    is_active: bool,
    last_used_at: Option<DateTime<Utc>>,
    min_interval_seconds: i64,
    usage_audit: serde_json::Value,
}

impl TryFrom<TokenRow> for CapabilityToken {
    type Error = anyhow::Error;

    fn try_from(row: TokenRow) -> anyhow::Result<Self> {
        Ok(CapabilityToken {
            id: row.id,
            owner_id: row.owner_id,
            project_id: row.project_id,
            data_snapshot: serde_json::from_value(row.data_snapshot)?,
            usage_count: row.usage_count,
            max_usage: row.max_usage,
            issued_at: row.issued_at,
            expires_at: row.expires_at,
            is_active: row.is_active,
            last_used_at: row.last_used_at,
            min_interval_seconds: row.min_interval_seconds,
            usage_audit: serde_json::from_value(row.usage_audit)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    token_prefix: String,
    project_id: Uuid,
    usage_count: i32,
    max_usage: i32,
    is_active: bool,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    last_used_at: Option<DateTime<Utc>>,
}

impl From<SummaryRow> for TokenSummary {
    fn from(row: SummaryRow) -> Self {
        TokenSummary {
            token_prefix: row.token_prefix,
            project_id: row.project_id,
            usage_count: row.usage_count,
            max_usage: row.max_usage,
            is_active: row.is_active,
            issued_at: row.issued_at,
            expires_at: row.expires_at,
            last_used_at: row.last_used_at,
        }
    }
}
