//! Multi-tenant authorization and session gateway.
//!
//! Two entry points share one policy engine: a forward-auth endpoint that
//! reverse proxies consult before passing a request upstream, and an RPC
//! interceptor guarding the session and policy administration methods.

pub mod api_types;
pub mod auth;
pub mod authz;
pub mod cache;
pub mod config;
pub mod db;
pub mod events;
pub mod gateway;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::StatusCode,
    routing::{any, get},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::{
    auth::{SessionStore, TokenService},
    authz::{DbPolicyAdapter, PolicyEnforcer, RouteMatcher},
    cache::Cache,
    config::GatewayConfig,
    db::DbPool,
    events::{EventBus, PolicyInvalidationListener},
    gateway::CredentialGateway,
    services::Services,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub db: Arc<DbPool>,
    /// TTL key-value store holding sessions.
    pub cache: Arc<dyn Cache>,
    pub events: EventBus,
    pub enforcer: Arc<PolicyEnforcer>,
    pub tokens: Arc<TokenService>,
    pub gateway: Arc<CredentialGateway>,
    pub services: Services,
    /// Background tasks (invalidation listener, event relay) that must
    /// finish during graceful shutdown.
    pub task_tracker: TaskTracker,
    /// Cancelled on shutdown to stop the background tasks.
    pub cancel: CancellationToken,
}

impl AppState {
    /// Connect the stores, load the initial policy and start the background
    /// tasks. Fails if the first policy load fails, since the gateway
    /// would otherwise deny everything.
    pub async fn new(config: GatewayConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let pool = DbPool::from_config(&config.database).await?;
        if let crate::config::DatabaseConfig::Sqlite(cfg) = &config.database
            && cfg.run_migrations
        {
            pool.run_migrations().await?;
        }
        let db = Arc::new(pool);

        let cache = cache::from_config(&config.cache).await?;
        tracing::info!(kind = cache.kind(), "Session store initialized");

        if config.auth.tokens.uses_default_secret() {
            tracing::warn!(
                "auth.tokens.jwt_secret is the built-in development secret. \
                 Anyone can mint valid tokens. Set WARDEN_JWT_SECRET for production."
            );
        }

        let matcher = RouteMatcher::new(&config.authz.route_patterns)?;
        for duplicate in matcher.duplicates() {
            tracing::warn!(template = duplicate, "Duplicate route template ignored");
        }
        tracing::info!(templates = matcher.len(), "Route matcher compiled");

        let enforcer = Arc::new(PolicyEnforcer::new(Arc::new(DbPolicyAdapter::new(&db))));
        let stats = enforcer
            .reload()
            .await
            .map_err(|e| format!("Initial policy load failed: {e}"))?;
        tracing::info!(
            generation = stats.generation,
            facts = stats.facts,
            "Initial policy loaded"
        );

        let store = SessionStore::new(cache.clone(), config.auth.tokens.store_timeout());
        let tokens = Arc::new(TokenService::new(
            &config.auth.tokens,
            store,
            db.subjects(),
        ));

        let gateway = Arc::new(CredentialGateway::new(
            tokens.clone(),
            enforcer.clone(),
            Arc::new(matcher),
            &config.authz.rpc,
        )?);
        tracing::debug!(methods = gateway.registry().len(), "RPC method registry built");

        let events = EventBus::new();
        let services = Services::new(
            db.clone(),
            tokens.clone(),
            events.clone(),
            config.auth.password.clone(),
        );

        let task_tracker = TaskTracker::new();
        let cancel = CancellationToken::new();

        PolicyInvalidationListener::spawn(
            &events,
            enforcer.clone(),
            Duration::from_millis(config.authz.invalidation.debounce_ms),
            cancel.clone(),
            &task_tracker,
        );

        #[cfg(feature = "redis")]
        if let crate::config::EventsConfig::Redis(cfg) = &config.events {
            let relay = crate::events::RedisEventRelay::connect(cfg, events.clone()).await?;
            relay.spawn(cancel.clone(), &task_tracker);
            tracing::info!(stream = %cfg.stream, "Policy events relayed through Redis");
        }

        Ok(Self {
            config: Arc::new(config),
            db,
            cache,
            events,
            enforcer,
            tokens,
            gateway,
            services,
            task_tracker,
            cancel,
        })
    }
}

pub fn build_app(config: &GatewayConfig, state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/health/live", get(routes::health::liveness))
        .route("/health/ready", get(routes::health::readiness));

    if config.observability.metrics.enabled {
        app = app.route(
            &config.observability.metrics.path,
            get(routes::health::metrics),
        );
    }

    // Non-GET methods reach the handler and get a 405 from the gateway
    app = app.route(
        routes::credential::CREDENTIAL_PATH,
        any(routes::credential::check),
    );

    app = app.merge(routes::rpc::rpc_routes().route_layer(
        axum::middleware::from_fn_with_state(state.clone(), middleware::rpc_auth_middleware),
    ));

    app.layer(axum::middleware::from_fn(
        middleware::http_metrics_middleware,
    ))
    .layer(axum::middleware::from_fn(middleware::request_id_middleware))
    .layer(TraceLayer::new_for_http())
    .layer(request_timeout(Duration::from_secs(config.server.timeout_secs)))
    .layer(RequestBodyLimitLayer::new(config.server.body_limit_bytes))
    .with_state(state)
}

/// Requests running past `timeout` are answered with 408.
fn request_timeout(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, header},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::{
        db::tests::harness::{AcmeFixture, seed_acme},
        gateway::{X_AUTH_USER_NAME, X_FORWARDED_HOST, X_FORWARDED_METHOD, X_FORWARDED_URI},
        models::{CreatePermissionRule, Effect},
    };

    const CONFIG: &str = r#"
[database]
type = "sqlite"
path = ":memory:"

[authz.invalidation]
debounce_ms = 10
"#;

    struct Harness {
        state: AppState,
        app: Router,
        seeded: AcmeFixture,
        token: String,
    }

    async fn harness() -> Harness {
        let config = GatewayConfig::from_str(CONFIG).unwrap();
        let state = AppState::new(config.clone()).await.unwrap();

        // Seeded straight into the repos, so no events fire
        let seeded = seed_acme(&state.db).await;
        state.enforcer.reload().await.unwrap();

        let token = state
            .tokens
            .issue(&seeded.alice)
            .await
            .unwrap()
            .access_token;
        let app = build_app(&config, state.clone());

        Harness {
            state,
            app,
            seeded,
            token,
        }
    }

    fn forward_auth(uri: &str, host: &str, token: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(routes::credential::CREDENTIAL_PATH)
            .header(X_FORWARDED_URI, uri)
            .header(X_FORWARDED_METHOD, "GET")
            .header(X_FORWARDED_HOST, host)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    fn rpc(method: &str, host: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(format!("/rpc/{method}"))
            .header(header::HOST, host)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_forward_auth_allows_granted_tenant() {
        let h = harness().await;
        let response = h
            .app
            .oneshot(forward_auth("/v1/domains/abc", "acme", &h.token))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[X_AUTH_USER_NAME], "alice");
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_forward_auth_denies_other_tenant() {
        let h = harness().await;
        let response = h
            .app
            .oneshot(forward_auth("/v1/domains/abc", "globex", &h.token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_forward_auth_rejects_post() {
        let h = harness().await;
        let request = Request::builder()
            .method("POST")
            .uri(routes::credential::CREDENTIAL_PATH)
            .body(Body::empty())
            .unwrap();
        let response = h.app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_register_login_logout_flow() {
        let h = harness().await;

        let response = h
            .app
            .clone()
            .oneshot(rpc(
                "auth.v1.AuthService/Register",
                "acme",
                None,
                json!({"username": "carol_k", "password": "correct-horse", "email": "carol@acme.test"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let subject = json_body(response).await;
        assert_eq!(subject["username"], "carol_k");
        assert!(subject.get("password_hash").is_none());

        let response = h
            .app
            .clone()
            .oneshot(rpc(
                "auth.v1.AuthService/Login",
                "acme",
                None,
                json!({"username": "carol_k", "password": "correct-horse"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let pair = json_body(response).await;
        let access = pair["access_token"].as_str().unwrap().to_string();

        let response = h
            .app
            .clone()
            .oneshot(rpc(
                "auth.v1.AuthService/Logout",
                "acme",
                Some(&access),
                json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["redirect_to"], "/v1/auth/login");

        let response = h
            .app
            .oneshot(rpc(
                "auth.v1.AuthService/VerifyToken",
                "acme",
                None,
                json!({"access_token": access}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_requires_token() {
        let h = harness().await;
        let response = h
            .app
            .oneshot(rpc("auth.v1.AuthService/Logout", "acme", None, json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_rpc_enforced_per_tenant() {
        let h = harness().await;

        // No rule covers "tenants" yet
        let response = h
            .app
            .clone()
            .oneshot(rpc(
                "auth.v1.TenantService/ListTenants",
                "acme",
                Some(&h.token),
                json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "forbidden");
        assert!(body["error"]["request_id"].is_string());

        h.state
            .services
            .rules
            .create(CreatePermissionRule {
                role_id: h.seeded.admin_role_id,
                tenant_id: Some(h.seeded.acme_id),
                resource: "tenants".into(),
                action: "GET".into(),
                object: "*".into(),
                effect: Effect::Allow,
            })
            .await
            .unwrap();

        let status = wait_for_status(&h.app, StatusCode::OK, || {
            rpc(
                "auth.v1.TenantService/ListTenants",
                "acme",
                Some(&h.token),
                json!({}),
            )
        })
        .await;
        assert_eq!(status, StatusCode::OK);

        // The rule is scoped to acme
        let response = h
            .app
            .clone()
            .oneshot(rpc(
                "auth.v1.TenantService/ListTenants",
                "globex",
                Some(&h.token),
                json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_deny_rule_takes_effect_without_restart() {
        let h = harness().await;

        let response = h
            .app
            .clone()
            .oneshot(forward_auth("/v1/domains/abc", "acme", &h.token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        h.state
            .services
            .rules
            .create(CreatePermissionRule {
                role_id: h.seeded.admin_role_id,
                tenant_id: None,
                resource: "domains".into(),
                action: "GET".into(),
                object: "abc".into(),
                effect: Effect::Deny,
            })
            .await
            .unwrap();

        let status = wait_for_status(&h.app, StatusCode::FORBIDDEN, || {
            forward_auth("/v1/domains/abc", "acme", &h.token)
        })
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // Other objects are still allowed
        let response = h
            .app
            .oneshot(forward_auth("/v1/domains/xyz", "acme", &h.token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_reports_policy() {
        let h = harness().await;
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = h.app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["policy"]["ready"], true);
    }

    #[tokio::test]
    async fn test_slow_request_times_out_with_408() {
        let app = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "done"
                }),
            )
            .layer(request_timeout(Duration::from_millis(50)));

        let request = Request::builder()
            .uri("/slow")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }

    /// Poll until the listener's reload lands or two seconds pass.
    async fn wait_for_status(
        app: &Router,
        expected: StatusCode,
        request: impl Fn() -> Request<Body>,
    ) -> StatusCode {
        let mut status = StatusCode::INTERNAL_SERVER_ERROR;
        for _ in 0..40 {
            status = app.clone().oneshot(request()).await.unwrap().status();
            if status == expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        status
    }
}
