//! HS256 token encoding.

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AuthError;
use crate::config::TokenConfig;

/// Claims carried by both halves of a pair. Exactly one of `access_uuid` and
/// `refresh_uuid` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub subject_uuid: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_uuid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_uuid: Option<Uuid>,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenClaims {
    pub fn access(subject_uuid: Uuid, access_uuid: Uuid, exp: DateTime<Utc>) -> Self {
        Self {
            subject_uuid,
            access_uuid: Some(access_uuid),
            refresh_uuid: None,
            exp: exp.timestamp(),
        }
    }

    pub fn refresh(subject_uuid: Uuid, refresh_uuid: Uuid, exp: DateTime<Utc>) -> Self {
        Self {
            subject_uuid,
            access_uuid: None,
            refresh_uuid: Some(refresh_uuid),
            exp: exp.timestamp(),
        }
    }

    /// The session id this token refers to, if it is of `kind`.
    pub fn session_id(&self, kind: TokenKind) -> Option<Uuid> {
        match (kind, self.access_uuid, self.refresh_uuid) {
            (TokenKind::Access, Some(id), None) => Some(id),
            (TokenKind::Refresh, None, Some(id)) => Some(id),
            _ => None,
        }
    }
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Signs and verifies tokens with a shared HMAC secret.
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenSigner {
    pub fn new(config: &TokenConfig) -> Self {
        let secret = config.jwt_secret.as_bytes();

        // Only HS256 is accepted; a token whose header names any other
        // algorithm fails validation.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_secs;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn sign(&self, claims: &TokenClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("Failed to sign token: {e}")))
    }

    /// Check signature, algorithm and expiry, and that the token is of
    /// `kind`. Returns the session id the token names.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<(TokenClaims, Uuid), AuthError> {
        let data = decode::<TokenClaims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken(e.to_string()),
            }
        })?;

        let session_id = data.claims.session_id(kind).ok_or_else(|| {
            AuthError::InvalidToken(format!("expected a {kind:?} token"))
        })?;

        Ok((data.claims, session_id))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn signer(secret: &str) -> TokenSigner {
        TokenSigner::new(&TokenConfig {
            jwt_secret: secret.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_sign_and_verify_access() {
        let signer = signer("secret-a");
        let subject = Uuid::new_v4();
        let access = Uuid::new_v4();
        let claims = TokenClaims::access(subject, access, Utc::now() + Duration::minutes(5));

        let token = signer.sign(&claims).unwrap();
        let (decoded, id) = signer.verify(&token, TokenKind::Access).unwrap();
        assert_eq!(decoded, claims);
        assert_eq!(id, access);
    }

    #[test]
    fn test_wrong_kind_is_rejected() {
        let signer = signer("secret-a");
        let claims =
            TokenClaims::refresh(Uuid::new_v4(), Uuid::new_v4(), Utc::now() + Duration::hours(1));
        let token = signer.sign(&claims).unwrap();

        assert!(matches!(
            signer.verify(&token, TokenKind::Access),
            Err(AuthError::InvalidToken(_))
        ));
        assert!(signer.verify(&token, TokenKind::Refresh).is_ok());
    }

    #[test]
    fn test_other_secret_is_rejected() {
        let claims =
            TokenClaims::access(Uuid::new_v4(), Uuid::new_v4(), Utc::now() + Duration::minutes(5));
        let token = signer("secret-a").sign(&claims).unwrap();

        assert!(matches!(
            signer("secret-b").verify(&token, TokenKind::Access),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_expired_token() {
        let signer = signer("secret-a");
        let claims =
            TokenClaims::access(Uuid::new_v4(), Uuid::new_v4(), Utc::now() - Duration::minutes(5));
        let token = signer.sign(&claims).unwrap();

        assert!(matches!(
            signer.verify(&token, TokenKind::Access),
            Err(AuthError::ExpiredToken)
        ));
    }

    #[test]
    fn test_non_hmac_algorithm_is_rejected() {
        // Header claims "none"; signature segment empty
        let signer = signer("secret-a");
        let token = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.\
                     eyJzdWJqZWN0X3V1aWQiOiIwMDAwMDAwMC0wMDAwLTAwMDAtMDAwMC0wMDAwMDAwMDAwMDAiLCJleHAiOjQxMDI0NDQ4MDB9.";
        assert!(matches!(
            signer.verify(token, TokenKind::Access),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(
            signer("secret-a").verify("not.a.token", TokenKind::Access),
            Err(AuthError::InvalidToken(_))
        ));
    }
}
