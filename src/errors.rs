use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("token not found")]
    TokenNotFound,

    #[error("project not found")]
    ProjectNotFound,

    #[error("permission denied: {reason}")]
    PermissionDenied { reason: String },

    #[error("token deactivated")]
    TokenInactive,

    #[error("token expired")]
    TokenExpired,

    #[error("usage quota exhausted")]
    QuotaExhausted,

    #[error("rate limited")]
    RateLimited { retry_after_seconds: i64 },

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Terminal errors mean the token (or request) is dead — the client
    /// should stop retrying and prompt re-issuance instead.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AppError::RateLimited { .. })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg) = match &self {
            AppError::TokenNotFound => (
                StatusCode::NOT_FOUND,
                "authentication_error",
                "token_not_found",
                "unknown token".to_string(),
            ),
            AppError::ProjectNotFound => (
                StatusCode::NOT_FOUND,
                "invalid_request_error",
                "project_not_found",
                "project not found".to_string(),
            ),
            AppError::PermissionDenied { reason } => (
                StatusCode::FORBIDDEN,
                "permission_error",
                "permission_denied",
                reason.clone(),
            ),
            AppError::TokenInactive => (
                StatusCode::FORBIDDEN,
                "token_error",
                "token_inactive",
                "token has been deactivated".to_string(),
            ),
            AppError::TokenExpired => (
                StatusCode::FORBIDDEN,
                "token_error",
                "token_expired",
                "token has expired".to_string(),
            ),
            AppError::QuotaExhausted => (
                StatusCode::FORBIDDEN,
                "token_error",
                "quota_exhausted",
                "usage quota exhausted".to_string(),
            ),
            AppError::RateLimited {
                retry_after_seconds,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limit_error",
                "rate_limited",
                format!("rate limited, retry in {}s", retry_after_seconds),
            ),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        let mut response = (status, body).into_response();

        // Exact Retry-After for rate limit errors so clients back off
        // precisely instead of polling.
        if let AppError::RateLimited {
            retry_after_seconds,
        } = self
        {
            if let Ok(val) = axum::http::HeaderValue::from_str(&retry_after_seconds.to_string()) {
                response.headers_mut().insert("retry-after", val);
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_is_the_only_transient_error() {
        assert!(!AppError::RateLimited {
            retry_after_seconds: 3
        }
        .is_terminal());
        assert!(AppError::TokenExpired.is_terminal());
        assert!(AppError::QuotaExhausted.is_terminal());
        assert!(AppError::TokenInactive.is_terminal());
        assert!(AppError::TokenNotFound.is_terminal());
    }

    #[test]
    fn rate_limited_response_carries_retry_after() {
        let resp = AppError::RateLimited {
            retry_after_seconds: 4,
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers().get("retry-after").unwrap(), "4");
    }

    #[test]
    fn terminal_token_errors_map_to_distinct_codes() {
        assert_eq!(
            AppError::TokenNotFound.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::TokenExpired.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::QuotaExhausted.into_response().status(),
            StatusCode::FORBIDDEN
        );
    }
}
