use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    api_types::ErrorResponse, auth::AuthError, gateway::GatewayError, observability::metrics,
    services::ServiceError,
};

/// Errors returned by the RPC methods as JSON bodies.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Validation(String),
    NotFound(String),
    Conflict(String),
    Forbidden,
    /// Rendered by [`AuthError`], which keeps unauthenticated bodies uniform.
    Auth(AuthError),
    Internal(String),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => ApiError::Validation(msg),
            ServiceError::NotFound(msg) => ApiError::NotFound(msg),
            ServiceError::Conflict(msg) => ApiError::Conflict(msg),
            ServiceError::Auth(e) => ApiError::Auth(e),
            ServiceError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::MethodNotAllowed | GatewayError::MissingHeader(_) => {
                ApiError::BadRequest(err.to_string())
            }
            GatewayError::Unauthenticated(e) => ApiError::Auth(e),
            GatewayError::Forbidden => ApiError::Forbidden,
            GatewayError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, error_type) = match self {
            ApiError::Auth(e) => return e.into_response(),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "bad_request",
                msg,
                "invalid_request_error",
            ),
            ApiError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                msg,
                "invalid_request_error",
            ),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, "not_found_error"),
            ApiError::Conflict(msg) => (
                StatusCode::CONFLICT,
                "conflict",
                msg,
                "invalid_request_error",
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "forbidden",
                "forbidden".to_string(),
                "permission_error",
            ),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "RPC call failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    "server_error",
                )
            }
        };

        metrics::record_gateway_error(code, status.as_u16());
        (
            status,
            Json(ErrorResponse::with_type(error_type, code, message)),
        )
            .into_response()
    }
}
