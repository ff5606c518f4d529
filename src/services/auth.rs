use std::sync::Arc;

use super::{ServiceError, ServiceResult};
use crate::{
    auth::{
        AuthContext, AuthError, TokenPair, TokenService, hash_password, verify_dummy,
        verify_password,
    },
    config::PasswordConfig,
    db::{DbError, DbPool},
    events::{ChangeKind, EntityKind, EventBus},
    models::{CreateSubject, Subject},
    observability::metrics,
};

/// Session operations behind the `auth.v1.AuthService` methods.
#[derive(Clone)]
pub struct AuthService {
    db: Arc<DbPool>,
    tokens: Arc<TokenService>,
    events: EventBus,
    password: PasswordConfig,
}

impl AuthService {
    pub fn new(
        db: Arc<DbPool>,
        tokens: Arc<TokenService>,
        events: EventBus,
        password: PasswordConfig,
    ) -> Self {
        Self {
            db,
            tokens,
            events,
            password,
        }
    }

    fn check_password_length(&self, password: &str) -> ServiceResult<()> {
        let len = password.chars().count();
        if len < self.password.min_length || len > self.password.max_length {
            return Err(ServiceError::Validation(format!(
                "password must be between {} and {} characters",
                self.password.min_length, self.password.max_length
            )));
        }
        Ok(())
    }

    /// Exchange a username and password for a token pair.
    ///
    /// Unknown users, disabled users and wrong passwords all fail with the
    /// same error.
    #[tracing::instrument(name = "auth.login", skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> ServiceResult<TokenPair> {
        self.check_password_length(password)?;

        let result = self.login_inner(username, password).await;
        metrics::record_auth_attempt("password", result.is_ok());
        result
    }

    async fn login_inner(&self, username: &str, password: &str) -> ServiceResult<TokenPair> {
        let subject = self.db.subjects().get_by_username(username).await?;

        // Unknown users still pay for one verification
        let hash = subject.as_ref().map(|s| s.password_hash.clone());
        let password = password.to_owned();
        let valid = tokio::task::spawn_blocking(move || match hash {
            Some(hash) => verify_password(&password, &hash),
            None => verify_dummy(&password),
        })
        .await
        .map_err(|e| AuthError::Internal(format!("Password check panicked: {e}")))?;

        let Some(subject) = subject else {
            tracing::warn!(reason = "unknown_user", "Login failed");
            return Err(AuthError::InvalidLogin.into());
        };

        if !valid {
            tracing::warn!(reason = "wrong_password", "Login failed");
            return Err(AuthError::InvalidLogin.into());
        }
        if !subject.enabled {
            tracing::warn!(reason = "subject_disabled", "Login failed");
            return Err(AuthError::InvalidLogin.into());
        }

        Ok(self.tokens.issue(&subject).await?)
    }

    /// Create an enabled subject with a hashed password.
    #[tracing::instrument(name = "auth.register", skip(self, password))]
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> ServiceResult<Subject> {
        self.check_password_length(password)?;

        let password = password.to_owned();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("Password hashing panicked: {e}")))??;

        let subject = self
            .db
            .subjects()
            .create(CreateSubject {
                username: username.to_owned(),
                email: email.to_owned(),
                password_hash,
                enabled: true,
            })
            .await
            .map_err(|e| match e {
                DbError::Conflict(_) => {
                    ServiceError::Conflict(format!("username '{username}' is already taken"))
                }
                other => other.into(),
            })?;

        self.events
            .notify(EntityKind::Subject, ChangeKind::Created, subject.id);
        Ok(subject)
    }

    /// Revoke the session behind an access token.
    pub async fn logout(&self, access_token: &str) -> ServiceResult<()> {
        Ok(self.tokens.revoke(access_token).await?)
    }

    /// Check that an access token is live and its subject is enabled.
    pub async fn verify(&self, access_token: &str) -> ServiceResult<AuthContext> {
        Ok(self.tokens.authenticate(access_token).await?)
    }

    /// Rotate a refresh token into a new pair.
    pub async fn refresh(&self, refresh_token: &str) -> ServiceResult<TokenPair> {
        let result = self.tokens.rotate(refresh_token).await;
        metrics::record_auth_attempt("refresh", result.is_ok());
        Ok(result?)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        auth::SessionStore,
        cache::MemoryCache,
        config::{MemoryCacheConfig, TokenConfig},
        db::tests::harness::migrated_db,
        models::UpdateSubject,
    };

    async fn service() -> (Arc<DbPool>, AuthService) {
        let db = Arc::new(migrated_db().await);
        let store = SessionStore::new(
            Arc::new(MemoryCache::new(&MemoryCacheConfig::default())),
            Duration::from_secs(1),
        );
        let tokens = Arc::new(TokenService::new(
            &TokenConfig::default(),
            store,
            db.subjects(),
        ));
        let service = AuthService::new(
            db.clone(),
            tokens,
            EventBus::new(),
            PasswordConfig::default(),
        );
        (db, service)
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let (_db, service) = service().await;
        let subject = service
            .register("bob_smith", "bob@example.com", "hunter22")
            .await
            .unwrap();
        assert!(subject.enabled);
        assert!(subject.password_hash.starts_with("$argon2"));

        let pair = service.login("bob_smith", "hunter22").await.unwrap();
        let ctx = service.verify(&pair.access_token).await.unwrap();
        assert_eq!(ctx.subject_uuid, subject.uuid);
    }

    #[tokio::test]
    async fn test_login_failures_look_alike() {
        let (db, service) = service().await;
        let subject = service
            .register("bob_smith", "bob@example.com", "hunter22")
            .await
            .unwrap();

        let wrong = service.login("bob_smith", "hunter23").await.unwrap_err();
        let unknown = service.login("nobody_here", "hunter22").await.unwrap_err();
        assert_eq!(wrong.to_string(), "username or password is not valid");
        assert_eq!(wrong.to_string(), unknown.to_string());

        db.subjects()
            .update(
                subject.id,
                UpdateSubject {
                    enabled: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let disabled = service.login("bob_smith", "hunter22").await.unwrap_err();
        assert_eq!(disabled.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let (_db, service) = service().await;
        service
            .register("bob_smith", "bob@example.com", "hunter22")
            .await
            .unwrap();
        let err = service
            .register("bob_smith", "other@example.com", "hunter22")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_password_bounds() {
        let (_db, service) = service().await;
        assert!(matches!(
            service.register("bob_smith", "bob@example.com", "short").await,
            Err(ServiceError::Validation(_))
        ));
        let long = "x".repeat(129);
        assert!(matches!(
            service.login("bob_smith", &long).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_logout_twice() {
        let (_db, service) = service().await;
        service
            .register("bob_smith", "bob@example.com", "hunter22")
            .await
            .unwrap();
        let pair = service.login("bob_smith", "hunter22").await.unwrap();

        service.logout(&pair.access_token).await.unwrap();
        let err = service.logout(&pair.access_token).await.unwrap_err();
        assert_eq!(err.to_string(), "session already expired");
    }
}
