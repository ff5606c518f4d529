use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{api_types::ErrorResponse, cache::CacheError, db::DbError, observability::metrics};

#[derive(Debug, Error)]
pub enum AuthError {
    /// No authentication credentials provided
    #[error("Authentication credentials required")]
    MissingCredentials,

    /// Authorization header present but not `Bearer <token>`
    #[error("Malformed authorization header")]
    MalformedHeader,

    /// Bad signature, algorithm, format or token kind
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token has expired")]
    ExpiredToken,

    /// Token is well-formed but its session is gone (revoked, rotated or expired)
    #[error("Session not found")]
    SessionNotFound,

    #[error("Subject not found")]
    SubjectNotFound,

    #[error("Subject is disabled")]
    SubjectDisabled,

    /// A concurrent rotation holds the refresh token
    #[error("Refresh token is being rotated")]
    RotationInProgress,

    /// Login failed. Covers unknown users and wrong passwords alike.
    #[error("username or password is not valid")]
    InvalidLogin,

    /// Logout of a session that no longer exists
    #[error("session already expired")]
    SessionAlreadyExpired,

    #[error("Session store error: {0}")]
    Store(#[from] CacheError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Whether this error means "not authenticated" rather than a failure of
    /// the gateway itself.
    pub fn is_unauthenticated(&self) -> bool {
        !matches!(
            self,
            AuthError::Store(_) | AuthError::Database(_) | AuthError::Internal(_)
        )
    }

    /// Stable reason code for logs and metrics. Never sent to callers.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => "missing_credentials",
            AuthError::MalformedHeader => "malformed_header",
            AuthError::InvalidToken(_) => "invalid_token",
            AuthError::ExpiredToken => "expired_token",
            AuthError::SessionNotFound => "session_not_found",
            AuthError::SubjectNotFound => "subject_not_found",
            AuthError::SubjectDisabled => "subject_disabled",
            AuthError::RotationInProgress => "rotation_in_progress",
            AuthError::InvalidLogin => "invalid_login",
            AuthError::SessionAlreadyExpired => "session_already_expired",
            AuthError::Store(_) => "session_store_error",
            AuthError::Database(_) => "database_error",
            AuthError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            // Messages the caller is expected to act on
            AuthError::InvalidLogin | AuthError::SessionAlreadyExpired => {
                tracing::warn!(reason = self.reason(), "Authentication failed");
                (
                    StatusCode::UNAUTHORIZED,
                    ErrorResponse::with_type(
                        "authentication_error",
                        "invalid_credentials",
                        self.to_string(),
                    ),
                )
            }
            e if e.is_unauthenticated() => {
                tracing::warn!(reason = e.reason(), error = %e, "Authentication failed");
                (
                    StatusCode::UNAUTHORIZED,
                    ErrorResponse::with_type(
                        "authentication_error",
                        "invalid_credentials",
                        "Invalid authentication credentials",
                    ),
                )
            }
            e => {
                tracing::error!(reason = e.reason(), error = %e, "Authentication dependency failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_type("server_error", "internal_error", "Internal server error"),
                )
            }
        };

        metrics::record_gateway_error(self.reason(), status.as_u16());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(error: AuthError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_unauthenticated_reasons_look_identical() {
        let (s1, b1) = body_json(AuthError::ExpiredToken).await;
        let (s2, b2) = body_json(AuthError::SessionNotFound).await;
        let (s3, b3) = body_json(AuthError::InvalidToken("bad signature".into())).await;
        let (s4, b4) = body_json(AuthError::SubjectDisabled).await;

        assert_eq!(s1, StatusCode::UNAUTHORIZED);
        assert_eq!(s1, s2);
        assert_eq!(s2, s3);
        assert_eq!(s3, s4);
        assert_eq!(b1, b2);
        assert_eq!(b2, b3);
        assert_eq!(b3, b4);
        assert!(!b3.to_string().contains("signature"));
    }

    #[tokio::test]
    async fn test_login_failure_message() {
        let (status, body) = body_json(AuthError::InvalidLogin).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["message"], "username or password is not valid");
    }

    #[tokio::test]
    async fn test_dependency_failure_is_500_without_detail() {
        let (status, body) =
            body_json(AuthError::Store(CacheError::Internal("redis at 10.0.0.5".into()))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.to_string().contains("10.0.0.5"));
    }

    #[test]
    fn test_disabled_subject_has_distinct_reason() {
        assert!(AuthError::SubjectDisabled.is_unauthenticated());
        assert_ne!(
            AuthError::SubjectDisabled.reason(),
            AuthError::SessionNotFound.reason()
        );
    }
}
