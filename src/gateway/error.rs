use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    auth::AuthError,
    authz::{AuthzError, RouteMatchError},
    observability::metrics,
};

/// Forward-auth failures. Bodies are plain text and never carry internal
/// error detail.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("{0} header is required")]
    MissingHeader(&'static str),

    /// The internal reason is logged, never returned.
    #[error("unauthenticated: {0}")]
    Unauthenticated(AuthError),

    #[error("forbidden")]
    Forbidden,

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::MissingHeader(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Forbidden => StatusCode::FORBIDDEN,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn reason(&self) -> &'static str {
        match self {
            GatewayError::MethodNotAllowed => "method_not_allowed",
            GatewayError::MissingHeader(_) => "missing_header",
            GatewayError::Unauthenticated(e) => e.reason(),
            GatewayError::Forbidden => "forbidden",
            GatewayError::Internal(_) => "internal",
        }
    }

    pub(crate) fn public_message(&self) -> String {
        match self {
            GatewayError::Unauthenticated(_) => "unauthenticated".to_string(),
            GatewayError::Internal(_) => "check permission failed".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<AuthError> for GatewayError {
    fn from(err: AuthError) -> Self {
        if err.is_unauthenticated() {
            GatewayError::Unauthenticated(err)
        } else {
            GatewayError::Internal(err.to_string())
        }
    }
}

impl From<AuthzError> for GatewayError {
    fn from(err: AuthzError) -> Self {
        GatewayError::Internal(err.to_string())
    }
}

impl From<RouteMatchError> for GatewayError {
    fn from(err: RouteMatchError) -> Self {
        GatewayError::Internal(format!("parse forwarded uri failed: {err}"))
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            GatewayError::Unauthenticated(e) => {
                tracing::warn!(reason = e.reason(), error = %e, "Forward-auth rejected credentials");
            }
            GatewayError::Internal(msg) => {
                tracing::error!(error = %msg, "Forward-auth failed");
            }
            _ => {}
        }
        metrics::record_gateway_error(self.reason(), status.as_u16());
        (status, self.public_message()).into_response()
    }
}
