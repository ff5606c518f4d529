//! The credential gateway: forward-auth for a reverse proxy and the
//! interceptor in front of the RPC methods. Both run the same verify and
//! enforce sequence over shared components.

mod error;
mod methods;

use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, header};
pub use error::GatewayError;
pub use methods::{AUTH_SERVICE, MethodPolicy, MethodRegistry};

use crate::{
    auth::{AuthContext, AuthError, TokenService, parse_bearer},
    authz::{PolicyEnforcer, RouteMatcher},
    config::RpcAuthzConfig,
    models::WILDCARD,
    observability::metrics,
};

pub const X_FORWARDED_URI: HeaderName = HeaderName::from_static("x-forwarded-uri");
pub const X_FORWARDED_METHOD: HeaderName = HeaderName::from_static("x-forwarded-method");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

pub const X_AUTH_USER_NAME: HeaderName = HeaderName::from_static("x-auth-user-name");
pub const X_AUTH_USER_EMAIL: HeaderName = HeaderName::from_static("x-auth-user-email");
pub const X_AUTH_USER_UUID: HeaderName = HeaderName::from_static("x-auth-user-uuid");

/// Identity headers handed back to the proxy on an allow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub email: String,
    pub uuid: String,
}

impl Credential {
    pub fn headers(&self) -> Result<HeaderMap, GatewayError> {
        let mut headers = HeaderMap::new();
        for (name, value) in [
            (X_AUTH_USER_NAME, &self.username),
            (X_AUTH_USER_EMAIL, &self.email),
            (X_AUTH_USER_UUID, &self.uuid),
        ] {
            let value = HeaderValue::from_str(value).map_err(|e| {
                GatewayError::Internal(format!("{name} is not a valid header value: {e}"))
            })?;
            headers.insert(name, value);
        }
        Ok(headers)
    }
}

impl From<AuthContext> for Credential {
    fn from(ctx: AuthContext) -> Self {
        Self {
            username: ctx.username,
            email: ctx.email,
            uuid: ctx.subject_uuid.to_string(),
        }
    }
}

pub struct CredentialGateway {
    tokens: Arc<TokenService>,
    enforcer: Arc<PolicyEnforcer>,
    matcher: Arc<RouteMatcher>,
    registry: MethodRegistry,
    tenant_header: HeaderName,
}

impl CredentialGateway {
    pub fn new(
        tokens: Arc<TokenService>,
        enforcer: Arc<PolicyEnforcer>,
        matcher: Arc<RouteMatcher>,
        rpc: &RpcAuthzConfig,
    ) -> Result<Self, GatewayError> {
        let tenant_header = HeaderName::try_from(rpc.tenant_header.as_str()).map_err(|e| {
            GatewayError::Internal(format!("invalid tenant header '{}': {e}", rpc.tenant_header))
        })?;
        Ok(Self {
            tokens,
            enforcer,
            matcher,
            registry: MethodRegistry::new(&rpc.methods),
            tenant_header,
        })
    }

    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    /// Forward-auth check for one proxied request. Steps run in order and
    /// stop at the first failure.
    pub async fn check(
        &self,
        method: &Method,
        headers: &HeaderMap,
    ) -> Result<Credential, GatewayError> {
        if method != Method::GET {
            return Err(GatewayError::MethodNotAllowed);
        }

        let uri = required_header(headers, &X_FORWARDED_URI, "X-Forwarded-Uri")?;
        let forwarded_method = required_header(headers, &X_FORWARDED_METHOD, "X-Forwarded-Method")?;
        let host = required_header(headers, &X_FORWARDED_HOST, "X-Forwarded-Host")?;

        let token = bearer_token(headers)?;
        let ctx = self.tokens.authenticate(token).await?;

        let route = self.matcher.match_uri(uri)?;
        self.authorize(
            "forward_auth",
            &ctx,
            host,
            &route.resource,
            forwarded_method,
            &route.object,
        )?;

        Ok(ctx.into())
    }

    /// Interceptor check for an RPC method. Returns the caller for methods
    /// that need one.
    pub async fn check_rpc(
        &self,
        method: &str,
        headers: &HeaderMap,
    ) -> Result<Option<AuthContext>, GatewayError> {
        let Some(policy) = self.registry.get(method) else {
            tracing::debug!(method, "RPC method not in registry");
            return Err(GatewayError::Forbidden);
        };

        match policy {
            MethodPolicy::Open => Ok(None),
            MethodPolicy::Authenticated => {
                let token = bearer_token(headers)?;
                Ok(Some(self.tokens.authenticate(token).await?))
            }
            MethodPolicy::Enforced { resource, action } => {
                let tenant = self.rpc_tenant(headers)?;
                let token = bearer_token(headers)?;
                let ctx = self.tokens.authenticate(token).await?;
                self.authorize("rpc", &ctx, tenant, resource, action, WILDCARD)?;
                Ok(Some(ctx))
            }
        }
    }

    /// Trusted tenant header, else the call's authority.
    fn rpc_tenant<'a>(&self, headers: &'a HeaderMap) -> Result<&'a str, GatewayError> {
        header_str(headers, &self.tenant_header)
            .or_else(|| header_str(headers, &header::HOST))
            .ok_or(GatewayError::MissingHeader("Host"))
    }

    fn authorize(
        &self,
        entrypoint: &'static str,
        ctx: &AuthContext,
        tenant: &str,
        resource: &str,
        action: &str,
        object: &str,
    ) -> Result<(), GatewayError> {
        let decision = self
            .enforcer
            .enforce(&ctx.username, tenant, resource, action, object)?;
        metrics::record_authz_decision(entrypoint, decision.is_allowed());

        if decision.is_allowed() {
            Ok(())
        } else {
            tracing::info!(
                subject = %ctx.username,
                tenant,
                resource,
                action,
                object,
                decision = decision.as_str(),
                entrypoint,
                "Request denied"
            );
            Err(GatewayError::Forbidden)
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn required_header<'a>(
    headers: &'a HeaderMap,
    name: &HeaderName,
    display: &'static str,
) -> Result<&'a str, GatewayError> {
    header_str(headers, name).ok_or(GatewayError::MissingHeader(display))
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, GatewayError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredentials)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;
    Ok(parse_bearer(value)?)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::StatusCode;

    use super::*;
    use crate::{
        auth::SessionStore,
        authz::DbPolicyAdapter,
        cache::MemoryCache,
        config::{MemoryCacheConfig, TokenConfig, default_route_patterns},
        db::{
            DbPool,
            tests::harness::{AcmeFixture, migrated_db, seed_acme},
        },
    };

    struct Fixture {
        _db: DbPool,
        gateway: CredentialGateway,
        seeded: AcmeFixture,
        token: String,
    }

    async fn fixture() -> Fixture {
        let db = migrated_db().await;
        let seeded = seed_acme(&db).await;

        let enforcer = Arc::new(PolicyEnforcer::new(Arc::new(DbPolicyAdapter::new(&db))));
        enforcer.reload().await.unwrap();

        let tokens = Arc::new(TokenService::new(
            &TokenConfig::default(),
            SessionStore::new(
                Arc::new(MemoryCache::new(&MemoryCacheConfig::default())),
                Duration::from_secs(1),
            ),
            db.subjects(),
        ));
        let token = tokens.issue(&seeded.alice).await.unwrap().access_token;

        let gateway = CredentialGateway::new(
            tokens,
            enforcer,
            Arc::new(RouteMatcher::new(&default_route_patterns()).unwrap()),
            &RpcAuthzConfig::default(),
        )
        .unwrap();

        Fixture {
            _db: db,
            gateway,
            seeded,
            token,
        }
    }

    fn forwarded(uri: &str, host: &str, token: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_URI, HeaderValue::from_str(uri).unwrap());
        headers.insert(X_FORWARDED_METHOD, HeaderValue::from_static("GET"));
        headers.insert(X_FORWARDED_HOST, HeaderValue::from_str(host).unwrap());
        if let Some(token) = token {
            headers.insert(
                header::AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
            );
        }
        headers
    }

    #[tokio::test]
    async fn test_allowed_request_returns_identity() {
        let f = fixture().await;
        let credential = f
            .gateway
            .check(
                &Method::GET,
                &forwarded("/v1/domains/abc", "acme", Some(&f.token)),
            )
            .await
            .unwrap();

        assert_eq!(credential.username, "alice");
        assert_eq!(credential.email, "alice@acme.test");
        assert_eq!(credential.uuid, f.seeded.alice.uuid.to_string());

        let headers = credential.headers().unwrap();
        assert_eq!(headers[X_AUTH_USER_NAME], "alice");
    }

    #[tokio::test]
    async fn test_other_tenant_is_forbidden() {
        let f = fixture().await;
        let err = f
            .gateway
            .check(
                &Method::GET,
                &forwarded("/v1/domains/abc", "globex", Some(&f.token)),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_steps_fail_in_order() {
        let f = fixture().await;

        // Wrong method wins over everything else
        let err = f
            .gateway
            .check(&Method::POST, &HeaderMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);

        let mut headers = forwarded("/v1/domains", "acme", None);
        headers.remove(X_FORWARDED_HOST);
        let err = f.gateway.check(&Method::GET, &headers).await.unwrap_err();
        assert!(matches!(err, GatewayError::MissingHeader("X-Forwarded-Host")));

        let err = f
            .gateway
            .check(&Method::GET, &forwarded("/v1/domains", "acme", None))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let err = f
            .gateway
            .check(
                &Method::GET,
                &forwarded("/v1/domains", "acme", Some("not-a-token")),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unmatched_path_is_internal_error() {
        let f = fixture().await;
        let err = f
            .gateway
            .check(&Method::GET, &forwarded("/healthz", "acme", Some(&f.token)))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "check permission failed");
    }

    #[tokio::test]
    async fn test_rpc_access_levels() {
        let f = fixture().await;
        let anonymous = HeaderMap::new();

        let open = f
            .gateway
            .check_rpc("auth.v1.AuthService/Login", &anonymous)
            .await
            .unwrap();
        assert!(open.is_none());

        let err = f
            .gateway
            .check_rpc("auth.v1.AuthService/Logout", &anonymous)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        // alice has no rule on `tenants`
        let mut headers = forwarded("/", "acme", Some(&f.token));
        headers.insert(header::HOST, HeaderValue::from_static("ignored"));
        let err = f
            .gateway
            .check_rpc("auth.v1.TenantService/ListTenants", &headers)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let err = f
            .gateway
            .check_rpc("auth.v1.Unknown/Method", &headers)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }
}
