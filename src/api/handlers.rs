use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::analytics::TokenSummary;
use crate::script::generator;
use crate::script::install::{self, ClientCapabilities, InstallPlan};
use crate::services::consume::ConsumeGrant;
use crate::services::issue::IssuedToken;
use crate::services::OwnerIdentity;
use crate::AppState;

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Deserialize)]
pub struct IssueTokenRequest {
    pub project_id: Uuid,
}

#[derive(Deserialize)]
pub struct ConsumeRequest {
    pub token: String,
}

#[derive(Serialize)]
pub struct DeactivateResponse {
    pub token_id: String,
    pub deactivated: bool,
}

#[derive(Serialize)]
pub struct TokenScriptResponse {
    pub script: String,
    pub bookmarklet: String,
    pub install: InstallPlan,
}

#[derive(Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ── Handlers ─────────────────────────────────────────────────

/// POST /api/v1/tokens — issue a capability token for an owned project.
/// The full token id appears in this response and nowhere else.
pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    Extension(owner): Extension<OwnerIdentity>,
    Json(payload): Json<IssueTokenRequest>,
) -> Result<(StatusCode, Json<IssuedToken>), AppError> {
    let issued = state.issuer.issue(&owner, payload.project_id).await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

/// POST /api/v1/fill — validate and consume one use of a token.
/// Unauthenticated: the token in the body is the sole credential.
pub async fn consume_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<ConsumeRequest>,
) -> Result<Json<ConsumeGrant>, AppError> {
    let caller_ip = client_ip(&headers);
    let user_agent = header_string(&headers, "user-agent");

    let grant = state
        .consumer
        .consume(&payload.token, caller_ip, user_agent)
        .await?;

    Ok(Json(grant))
}

/// DELETE /api/v1/tokens/:id — deactivate a token. One-way: nothing in this
/// API sets `is_active` back to true.
pub async fn deactivate_token(
    State(state): State<Arc<AppState>>,
    Extension(owner): Extension<OwnerIdentity>,
    Path(token_id): Path<String>,
) -> Result<Json<DeactivateResponse>, AppError> {
    let deactivated = state.tokens.deactivate_token(&token_id, owner.id).await?;

    Ok(Json(DeactivateResponse {
        token_id,
        deactivated,
    }))
}

/// GET /api/v1/tokens — paginated token summaries for the caller.
/// Only truncated prefixes are returned, never full token ids.
pub async fn list_tokens(
    State(state): State<Arc<AppState>>,
    Extension(owner): Extension<OwnerIdentity>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Vec<TokenSummary>>, AppError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 200); // 1 <= limit <= 200
    let offset = params.offset.unwrap_or(0).max(0); // non-negative

    let tokens = state.tokens.list_tokens(owner.id, limit, offset).await?;

    Ok(Json(tokens))
}

/// GET /api/v1/tokens/:id/script — the generated fill script for a token's
/// snapshot, plus a bookmarklet href and install guidance matched to the
/// requesting client.
pub async fn get_token_script(
    State(state): State<Arc<AppState>>,
    Extension(owner): Extension<OwnerIdentity>,
    Path(token_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<TokenScriptResponse>, AppError> {
    let token = state
        .tokens
        .get_token(&token_id)
        .await?
        .filter(|t| t.owner_id == owner.id)
        .ok_or(AppError::TokenNotFound)?;

    let script = generator::generate(&token.data_snapshot);
    let bookmarklet = generator::bookmarklet_href(&token.data_snapshot);
    let caps = ClientCapabilities::from_user_agent(
        header_string(&headers, "user-agent").as_deref().unwrap_or(""),
    );

    Ok(Json(TokenScriptResponse {
        script,
        bookmarklet,
        install: install::install_plan(&caps),
    }))
}

// ── Transport metadata helpers ───────────────────────────────

/// Caller IP for the audit trail: first X-Forwarded-For hop when present.
/// Advisory only — it feeds anomaly review, not enforcement.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}
