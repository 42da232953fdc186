use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::AppError;
use crate::models::analytics::FillEvent;
use crate::models::profile::BusinessProfileSnapshot;
use crate::models::token::UsageEvent;
use crate::store::{ConsumeDenied, ConsumeOutcome, TokenStore};

/// Successful consumption result: the embedded snapshot plus quota state.
#[derive(Debug, Serialize)]
pub struct ConsumeGrant {
    pub project_data: BusinessProfileSnapshot,
    pub usage_count: i32,
    pub max_usage: i32,
    pub remaining_uses: i32,
    pub expires_at: DateTime<Utc>,
}

/// Validates and consumes capability tokens. Public surface — the token is
/// the sole credential, callers are unauthenticated.
#[derive(Clone)]
pub struct ConsumeService {
    store: Arc<dyn TokenStore>,
}

impl ConsumeService {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Consume one use of a token.
    ///
    /// Not idempotent in effect: every grant counts. Callers must not retry
    /// blindly on ambiguous transport failures — a timeout after a
    /// server-side grant has already spent the use. Denials are
    /// differentiated so clients can distinguish dead tokens (stop retrying)
    /// from the transient rate floor (wait and retry).
    pub async fn consume(
        &self,
        token_id: &str,
        caller_ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<ConsumeGrant, AppError> {
        let now = Utc::now();
        let event = UsageEvent {
            at: now,
            caller_ip: caller_ip.clone(),
            user_agent: user_agent.clone(),
        };

        let token = match self.store.consume_token(token_id, now, event).await? {
            ConsumeOutcome::Granted(token) => token,
            ConsumeOutcome::Denied(denied) => {
                tracing::debug!(token_prefix = %crate::models::token::token_prefix(token_id), ?denied, "consumption denied");
                return Err(match denied {
                    ConsumeDenied::NotFound => AppError::TokenNotFound,
                    ConsumeDenied::Inactive => AppError::TokenInactive,
                    ConsumeDenied::Expired => AppError::TokenExpired,
                    ConsumeDenied::QuotaExhausted => AppError::QuotaExhausted,
                    ConsumeDenied::RateLimited {
                        retry_after_seconds,
                    } => AppError::RateLimited {
                        retry_after_seconds,
                    },
                });
            }
        };

        // Analytics append happens off the grant path: a failed write is
        // logged, never surfaced to the caller.
        let fill = FillEvent {
            token_id: token.id.clone(),
            owner_id: token.owner_id,
            project_id: token.project_id,
            occurred_at: now,
            caller_ip,
            user_agent,
        };
        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(e) = store.record_fill_event(&fill).await {
                tracing::warn!(token_prefix = %crate::models::token::token_prefix(&fill.token_id), "failed to record fill event: {}", e);
            }
        });

        Ok(ConsumeGrant {
            project_data: token.data_snapshot.clone(),
            usage_count: token.usage_count,
            max_usage: token.max_usage,
            remaining_uses: token.remaining_uses(),
            expires_at: token.expires_at,
        })
    }
}
