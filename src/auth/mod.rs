//! Authentication: password hashing, signed token pairs and the session
//! records that back them.

mod context;
mod error;
mod password;
mod service;
mod session_store;
mod tokens;

pub use context::AuthContext;
pub use error::AuthError;
pub use password::{hash_password, verify_dummy, verify_password};
pub use service::TokenService;
pub use session_store::{Session, SessionStore};
pub use tokens::{TokenClaims, TokenKind, TokenPair, TokenSigner};

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn parse_bearer(header: &str) -> Result<&str, AuthError> {
    let (scheme, token) = header
        .trim()
        .split_once(' ')
        .ok_or(AuthError::MalformedHeader)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MalformedHeader);
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MalformedHeader);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bearer() {
        assert_eq!(parse_bearer("Bearer abc.def").unwrap(), "abc.def");
        assert_eq!(parse_bearer("bearer   abc ").unwrap(), "abc");
        assert!(matches!(
            parse_bearer("Basic abc"),
            Err(AuthError::MalformedHeader)
        ));
        assert!(matches!(
            parse_bearer("Bearer"),
            Err(AuthError::MalformedHeader)
        ));
        assert!(matches!(
            parse_bearer("Bearer  "),
            Err(AuthError::MalformedHeader)
        ));
    }
}
