use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Router,
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tower_http::trace::TraceLayer;

use crate::services::OwnerIdentity;
use crate::AppState;

pub mod analytics;
pub mod handlers;

/// Build the API router. All routes are relative — the caller mounts this
/// under `/api/v1`.
///
/// The consumption endpoint is deliberately outside the owner-auth layer:
/// the capability token in the request body is its sole credential.
pub fn api_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let management = Router::new()
        .route(
            "/tokens",
            get(handlers::list_tokens).post(handlers::issue_token),
        )
        .route("/tokens/:id", delete(handlers::deactivate_token))
        .route("/tokens/:id/script", get(handlers::get_token_script))
        .route("/analytics/usage", get(analytics::get_usage_summary))
        .route("/analytics/volume", get(analytics::get_usage_volume))
        .layer(middleware::from_fn_with_state(state, owner_auth));

    Router::new()
        .route("/fill", post(handlers::consume_token))
        .merge(management)
        .layer(TraceLayer::new_for_http())
        .fallback(fallback_404)
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Middleware: resolves the owner behind `Authorization: Bearer <key>` (or
/// `X-Api-Key`) and injects an `OwnerIdentity` extension. Keys are stored
/// hashed; the provided key is hashed and compared constant-time against the
/// stored digest.
async fn owner_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let provided_key = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            req.headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(|t| t.trim())
        });

    let Some(key) = provided_key else {
        tracing::warn!("management API: missing owner key");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let provided_hash = hex::encode(Sha256::digest(key.as_bytes()));

    let owner = state
        .db
        .get_owner_by_key_hash(&provided_hash)
        .await
        .map_err(|e| {
            tracing::error!("owner lookup failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    match owner {
        Some(row)
            if bool::from(provided_hash.as_bytes().ct_eq(row.api_key_hash.as_bytes())) =>
        {
            req.extensions_mut().insert(OwnerIdentity {
                id: row.id,
                tier: row.tier,
            });
            Ok(next.run(req).await)
        }
        _ => {
            // SECURITY: never log the provided key itself
            let masked = if key.len() > 8 {
                format!("{}…{}", &key[..4], &key[key.len() - 4..])
            } else {
                "****".to_string()
            };
            tracing::warn!("management API: invalid owner key (provided: '{}')", masked);
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
