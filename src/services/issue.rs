use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::tier::SubscriptionPolicy;
use crate::models::token::CapabilityToken;
use crate::services::provider::ProjectDataProvider;
use crate::services::OwnerIdentity;
use crate::store::TokenStore;

/// What the owner gets back at issuance — the only moment the full token id
/// is ever returned.
#[derive(Debug, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub max_usage: i32,
    pub usage_count: i32,
    pub rate_limit_seconds: i64,
}

/// Issues capability tokens for authenticated project owners.
#[derive(Clone)]
pub struct IssueService {
    store: Arc<dyn TokenStore>,
    projects: Arc<dyn ProjectDataProvider>,
    policy: Arc<dyn SubscriptionPolicy>,
}

impl IssueService {
    pub fn new(
        store: Arc<dyn TokenStore>,
        projects: Arc<dyn ProjectDataProvider>,
        policy: Arc<dyn SubscriptionPolicy>,
    ) -> Self {
        Self {
            store,
            projects,
            policy,
        }
    }

    /// Issue a fresh token for one of the caller's projects.
    ///
    /// A project that is missing *or* owned by someone else both surface as
    /// ProjectNotFound, so the endpoint does not leak project existence.
    /// Issuance is all-or-nothing: any failure before the final insert
    /// leaves no partial token behind. Prior tokens for the same project are
    /// untouched — multiple concurrent tokens are permitted.
    pub async fn issue(
        &self,
        owner: &OwnerIdentity,
        project_id: Uuid,
    ) -> Result<IssuedToken, AppError> {
        let record = self
            .projects
            .snapshot(project_id)
            .await?
            .filter(|r| r.owner_id == owner.id)
            .ok_or(AppError::ProjectNotFound)?;

        let limits = self.policy.limits_for(&owner.tier);
        if !limits.grants_capability() {
            return Err(AppError::PermissionDenied {
                reason: format!("tier '{}' does not include form autofill", owner.tier),
            });
        }

        let token = CapabilityToken::issue(
            owner.id,
            project_id,
            record.profile,
            &limits,
            Utc::now(),
        );
        self.store.insert_token(&token).await?;

        tracing::info!(
            owner_id = %owner.id,
            project_id = %project_id,
            token_prefix = %token.display_prefix(),
            max_usage = token.max_usage,
            "capability token issued"
        );

        Ok(IssuedToken {
            token: token.id,
            expires_at: token.expires_at,
            max_usage: token.max_usage,
            usage_count: token.usage_count,
            rate_limit_seconds: token.min_interval_seconds,
        })
    }
}
