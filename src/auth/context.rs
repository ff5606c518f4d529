use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use super::AuthError;

/// The authenticated caller of a request.
///
/// Inserted into request extensions by the RPC middleware once the access
/// token and its session have been verified.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub subject_id: i64,
    pub subject_uuid: Uuid,
    pub username: String,
    pub email: String,
    /// Access id of the session the token belongs to.
    pub access_id: Uuid,
}

impl AuthContext {
    pub fn from_extensions(extensions: &http::Extensions) -> Option<&Self> {
        extensions.get::<Self>()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuthContext {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_extensions(&parts.extensions)
            .cloned()
            .ok_or(AuthError::MissingCredentials)
    }
}
