//! JSON shapes shared by the RPC endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::TokenPair;

/// Error body returned by every JSON endpoint.
///
/// Format: `{"error": {"type": "...", "message": "...", "code": ..., "request_id": ...}}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorInfo,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error type classification (e.g., "invalid_request_error", "authentication_error")
    #[serde(rename = "type")]
    pub error_type: String,
    /// Human-readable error message
    pub message: String,
    /// Machine-readable error code
    pub code: Option<String>,
    /// Request ID for correlating errors with logs.
    /// Populated by the request-id middleware.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorResponse {
    /// Create an error with the default "invalid_request_error" type.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_type("invalid_request_error", code, message)
    }

    /// Create an error with an explicit type.
    ///
    /// Common error types:
    /// - "invalid_request_error" - Invalid parameters or malformed request
    /// - "authentication_error" - Missing or invalid credentials
    /// - "permission_error" - Authenticated but not allowed
    /// - "not_found_error" - Resource not found
    /// - "server_error" - Internal server error
    pub fn with_type(
        error_type: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorInfo {
                error_type: error_type.into(),
                message: message.into(),
                code: Some(code.into()),
                request_id: None,
            },
        }
    }
}

/// Wrapper for list responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(data: Vec<T>) -> Self {
        Self { data }
    }
}

/// Request body for methods that address an entity by id.
#[derive(Debug, Deserialize)]
pub struct IdRequest {
    pub id: i64,
}

/// Empty request/response body.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Empty {}

// ─────────────────────────────────────────────────────────────────────────────
// auth.v1.AuthService
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 6, max = 128))]
    pub username: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
}

/// Token pair returned by Login and RefreshToken.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

impl From<TokenPair> for TokenPairResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            access_expires_at: pair.access_expires_at,
            refresh_expires_at: pair.refresh_expires_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 6, max = 128))]
    pub username: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub redirect_to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyTokenRequest {
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyTokenResponse {
    pub access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Admin services
// ─────────────────────────────────────────────────────────────────────────────

/// Update request for methods that address an entity by id. The update
/// fields are flattened next to `id`.
#[derive(Debug, Deserialize)]
pub struct UpdateRequest<T> {
    pub id: i64,
    #[serde(flatten)]
    pub update: T,
}

impl<T: Validate> Validate for UpdateRequest<T> {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        self.update.validate()
    }
}
