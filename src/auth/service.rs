//! Issuing, verifying, rotating and revoking token pairs.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use uuid::Uuid;

use super::{
    AuthContext, AuthError, Session, SessionStore, TokenClaims, TokenKind, TokenPair, TokenSigner,
};
use crate::{config::TokenConfig, db::repos::SubjectRepo, models::Subject};

/// Owns the token lifecycle. Tokens are only valid while their session
/// record exists, so revocation is a store delete.
pub struct TokenService {
    signer: TokenSigner,
    store: SessionStore,
    subjects: Arc<dyn SubjectRepo>,
    access_ttl: Duration,
    refresh_ttl: Duration,
    rotation_lock_ttl: Duration,
}

impl TokenService {
    pub fn new(config: &TokenConfig, store: SessionStore, subjects: Arc<dyn SubjectRepo>) -> Self {
        Self {
            signer: TokenSigner::new(config),
            store,
            subjects,
            access_ttl: config.access_ttl(),
            refresh_ttl: config.refresh_ttl(),
            rotation_lock_ttl: Duration::from_secs(config.rotation_lock_secs),
        }
    }

    /// Mint a pair for `subject` and persist its session.
    pub async fn issue(&self, subject: &Subject) -> Result<TokenPair, AuthError> {
        let (pair, session) = self.mint(subject)?;
        self.store.save(&session).await?;
        tracing::debug!(
            subject = %subject.uuid,
            access_id = %session.access_id,
            "Issued token pair"
        );
        Ok(pair)
    }

    fn mint(&self, subject: &Subject) -> Result<(TokenPair, Session), AuthError> {
        let now = Utc::now();
        let access_expires_at = now + chrono_ttl(self.access_ttl)?;
        let refresh_expires_at = now + chrono_ttl(self.refresh_ttl)?;
        let access_id = Uuid::new_v4();
        let refresh_id = Uuid::new_v4();

        let access_token = self.signer.sign(&TokenClaims::access(
            subject.uuid,
            access_id,
            access_expires_at,
        ))?;
        let refresh_token = self.signer.sign(&TokenClaims::refresh(
            subject.uuid,
            refresh_id,
            refresh_expires_at,
        ))?;

        let session = Session {
            access_id,
            refresh_id,
            subject_id: subject.id,
            subject_uuid: subject.uuid,
            username: subject.username.clone(),
            access_expires_at,
            refresh_expires_at,
            created_at: now,
        };
        let pair = TokenPair {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
        };
        Ok((pair, session))
    }

    /// Verify an access token and return its live session.
    pub async fn verify_access(&self, token: &str) -> Result<Session, AuthError> {
        let (claims, access_id) = self.signer.verify(token, TokenKind::Access)?;
        let session = self
            .store
            .get_by_access(access_id)
            .await?
            .ok_or(AuthError::SessionNotFound)?;
        if session.subject_uuid != claims.subject_uuid {
            return Err(AuthError::InvalidToken("subject mismatch".into()));
        }
        Ok(session)
    }

    /// Verify a refresh token and return its live session.
    pub async fn verify_refresh(&self, token: &str) -> Result<Session, AuthError> {
        let (claims, refresh_id) = self.signer.verify(token, TokenKind::Refresh)?;
        let session = self
            .store
            .get_by_refresh(refresh_id)
            .await?
            .ok_or(AuthError::SessionNotFound)?;
        if session.subject_uuid != claims.subject_uuid {
            return Err(AuthError::InvalidToken("subject mismatch".into()));
        }
        Ok(session)
    }

    /// Verify an access token and resolve the subject behind it. Disabled
    /// or deleted subjects are rejected even while the session lives.
    pub async fn authenticate(&self, token: &str) -> Result<AuthContext, AuthError> {
        let session = self.verify_access(token).await?;
        let subject = self.active_subject(session.subject_uuid).await?;
        Ok(AuthContext {
            subject_id: subject.id,
            subject_uuid: subject.uuid,
            username: subject.username,
            email: subject.email,
            access_id: session.access_id,
        })
    }

    /// Exchange a refresh token for a new pair. The old pair stops working;
    /// of two concurrent rotations of one token at most one succeeds.
    pub async fn rotate(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let (_, refresh_id) = self.signer.verify(refresh_token, TokenKind::Refresh)?;

        if !self
            .store
            .lock_refresh(refresh_id, self.rotation_lock_ttl)
            .await?
        {
            return Err(AuthError::RotationInProgress);
        }

        let result = self.rotate_locked(refresh_token).await;

        if let Err(e) = self.store.unlock_refresh(refresh_id).await {
            tracing::warn!(error = %e, "Failed to release rotation lock; it will expire");
        }
        result
    }

    async fn rotate_locked(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let old = self.verify_refresh(refresh_token).await?;
        let subject = self.active_subject(old.subject_uuid).await?;

        let (pair, session) = self.mint(&subject)?;
        self.store.save(&session).await?;

        match self.store.delete(&old).await {
            Ok(true) => {}
            Ok(false) => {
                // The old pair vanished under us (revoked or expired), so
                // this rotation must not hand out a live pair.
                let _ = self.store.delete(&session).await;
                return Err(AuthError::SessionNotFound);
            }
            Err(e) => {
                let _ = self.store.delete(&session).await;
                return Err(e.into());
            }
        }

        tracing::debug!(
            subject = %subject.uuid,
            old_access_id = %old.access_id,
            new_access_id = %session.access_id,
            "Rotated token pair"
        );
        Ok(pair)
    }

    /// Revoke the session behind an access token. Both halves of the pair
    /// stop working.
    pub async fn revoke(&self, access_token: &str) -> Result<(), AuthError> {
        let session = match self.verify_access(access_token).await {
            Ok(session) => session,
            Err(AuthError::SessionNotFound | AuthError::ExpiredToken) => {
                return Err(AuthError::SessionAlreadyExpired);
            }
            Err(e) => return Err(e),
        };
        if !self.store.delete(&session).await? {
            return Err(AuthError::SessionAlreadyExpired);
        }
        tracing::debug!(access_id = %session.access_id, "Revoked session");
        Ok(())
    }

    async fn active_subject(&self, uuid: Uuid) -> Result<Subject, AuthError> {
        let subject = self
            .subjects
            .get_by_uuid(uuid)
            .await?
            .ok_or(AuthError::SubjectNotFound)?;
        if !subject.enabled {
            return Err(AuthError::SubjectDisabled);
        }
        Ok(subject)
    }
}

fn chrono_ttl(ttl: Duration) -> Result<chrono::Duration, AuthError> {
    chrono::Duration::from_std(ttl).map_err(|e| AuthError::Internal(e.to_string()))
}
