//! Forward-auth endpoint for reverse proxies.

use axum::{
    extract::State,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};

use crate::{AppState, gateway::GatewayError};

pub const CREDENTIAL_PATH: &str = "/v1/auth/credential";

/// `GET /v1/auth/credential`
///
/// The proxy forwards the original request's URI, method and host in
/// `X-Forwarded-*` headers along with its `Authorization` header. A 200
/// carries the caller's identity in `X-Auth-User-*` headers; any other status
/// means the proxy must reject the original request.
#[tracing::instrument(name = "credential.check", skip_all)]
pub async fn check(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
) -> Result<Response, GatewayError> {
    let credential = state.gateway.check(&method, &headers).await?;
    Ok((StatusCode::OK, credential.headers()?).into_response())
}
