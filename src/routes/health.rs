//! Health check endpoints for probes and monitoring.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppState;
#[cfg(feature = "prometheus")]
use crate::observability::metrics::get_prometheus_handle;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    /// "healthy" or "unhealthy"
    pub status: &'static str,
    pub version: &'static str,
    pub database: ComponentStatus,
    pub cache: ComponentStatus,
    pub policy: PolicyStatus,
}

#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub latency_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct PolicyStatus {
    pub ready: bool,
    pub generation: u64,
    pub facts: usize,
    pub loaded_at: DateTime<Utc>,
}

async fn probe<F, E>(check: F, failure: &str) -> ComponentStatus
where
    F: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    let start = std::time::Instant::now();
    let result = check.await;
    let latency_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok(()) => ComponentStatus {
            healthy: true,
            message: None,
            latency_ms,
        },
        Err(e) => {
            tracing::warn!(error = %e, "{failure}");
            ComponentStatus {
                healthy: false,
                message: Some(failure.to_string()),
                latency_ms,
            }
        }
    }
}

/// Full health check: database, session store and policy generation.
#[tracing::instrument(name = "health.check", skip(state))]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = probe(state.db.health_check(), "Database connection failed").await;
    let cache = probe(state.cache.health_check(), "Session store unavailable").await;

    let snapshot = state.enforcer.snapshot();
    let policy = PolicyStatus {
        ready: state.enforcer.is_ready(),
        generation: snapshot.generation(),
        facts: snapshot.fact_count(),
        loaded_at: snapshot.loaded_at(),
    };

    let healthy = database.healthy && cache.healthy && policy.ready;
    let health = HealthStatus {
        status: if healthy { "healthy" } else { "unhealthy" },
        version: env!("CARGO_PKG_VERSION"),
        database,
        cache,
        policy,
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(health))
}

/// Liveness probe. Succeeds while the process can serve HTTP.
#[tracing::instrument(name = "health.liveness")]
pub async fn liveness() -> impl IntoResponse {
    StatusCode::OK
}

/// Readiness probe. Not ready until the first policy load has succeeded and
/// while the database is unreachable.
#[tracing::instrument(name = "health.readiness", skip(state))]
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if !state.enforcer.is_ready() {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    if state.db.health_check().await.is_err() {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::OK
}

/// Prometheus metrics endpoint.
#[tracing::instrument(name = "health.metrics")]
pub async fn metrics() -> impl IntoResponse {
    #[cfg(feature = "prometheus")]
    {
        return match get_prometheus_handle() {
            Some(handle) => (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                handle.render(),
            ),
            None => (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            ),
        };
    }
    #[cfg(not(feature = "prometheus"))]
    (
        StatusCode::NOT_FOUND,
        [("content-type", "text/plain")],
        "Prometheus metrics not enabled".to_string(),
    )
}
