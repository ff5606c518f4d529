//! Prometheus metrics for the gateway.
//!
//! Provides metrics for:
//! - HTTP request latency and counts
//! - Authorization decisions and policy reloads
//! - Authentication attempts and session store operations

#[cfg(feature = "prometheus")]
use std::sync::OnceLock;

#[cfg(feature = "prometheus")]
use metrics::{counter, gauge, histogram};
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::MetricsConfig;

/// Global Prometheus handle for the metrics endpoint.
#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the metrics system with the given configuration.
#[cfg(feature = "prometheus")]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Ok(());
    }

    let builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Suffix("_duration_seconds".to_string()),
            &[0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
        )
        .map_err(|e| MetricsError::Setup(e.to_string()))?;

    let handle = builder.install_recorder().map_err(MetricsError::Install)?;

    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| MetricsError::Setup("Metrics already initialized".to_string()))?;

    Ok(())
}

/// Initialize the metrics system (no-op without prometheus feature).
#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(_config: &MetricsConfig) -> Result<(), MetricsError> {
    Ok(())
}

/// Get the Prometheus handle for rendering metrics.
#[cfg(feature = "prometheus")]
pub fn get_prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ─────────────────────────────────────────────────────────────────────────────
// Metric Recording Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    #[cfg(feature = "prometheus")]
    {
        let status_class = format!("{}xx", status / 100);

        counter!("http_requests_total", "method" => method.to_string(), "path" => path.to_string(), "status" => status.to_string(), "status_class" => status_class.clone())
            .increment(1);

        histogram!("http_request_duration_seconds", "method" => method.to_string(), "path" => path.to_string(), "status_class" => status_class)
            .record(duration_secs);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (method, path, status, duration_secs);
    }
}

/// Record an enforcement decision. `entrypoint` is "forward_auth" or "rpc".
pub fn record_authz_decision(entrypoint: &str, allowed: bool) {
    #[cfg(feature = "prometheus")]
    {
        let decision = if allowed { "allow" } else { "deny" };
        counter!("authz_decisions_total", "entrypoint" => entrypoint.to_string(), "decision" => decision)
            .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (entrypoint, allowed);
    }
}

/// Record a policy reload and, on success, the size of the new snapshot.
pub fn record_policy_reload(success: bool, duration_secs: f64, generation: u64, facts: usize) {
    #[cfg(feature = "prometheus")]
    {
        let result = if success { "success" } else { "failure" };
        counter!("policy_reloads_total", "result" => result).increment(1);
        histogram!("policy_reload_duration_seconds").record(duration_secs);
        if success {
            gauge!("policy_generation").set(generation as f64);
            gauge!("policy_facts").set(facts as f64);
        }
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (success, duration_secs, generation, facts);
    }
}

/// Record an authentication attempt. `method` is "login", "verify", "refresh"...
pub fn record_auth_attempt(method: &str, success: bool) {
    #[cfg(feature = "prometheus")]
    {
        let result = if success { "success" } else { "failure" };
        counter!("auth_attempts_total", "method" => method.to_string(), "result" => result)
            .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (method, success);
    }
}

/// Record a session store operation.
pub fn record_cache_operation(cache_type: &str, operation: &str, result: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "cache_operations_total",
            "cache_type" => cache_type.to_string(),
            "operation" => operation.to_string(),
            "result" => result.to_string()
        )
        .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (cache_type, operation, result);
    }
}

/// Record an error response produced by the gateway.
pub fn record_gateway_error(error_type: &str, status: u16) {
    #[cfg(feature = "prometheus")]
    {
        counter!("gateway_errors_total", "error_type" => error_type.to_string(), "status" => status.to_string())
            .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (error_type, status);
    }
}

/// Record events dropped by the in-process bus or received late by a listener.
pub fn record_event_lag(component: &str, skipped: u64) {
    #[cfg(feature = "prometheus")]
    {
        counter!("event_lagged_total", "component" => component.to_string()).increment(skipped);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (component, skipped);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Failed to set up metrics: {0}")]
    Setup(String),

    #[cfg(feature = "prometheus")]
    #[error("Failed to install metrics recorder: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),
}
