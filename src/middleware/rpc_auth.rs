use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{AppState, routes::rpc::ApiError};

/// Path prefix every RPC method is mounted under.
pub const RPC_PREFIX: &str = "/rpc/";

/// Interceptor in front of the RPC methods.
///
/// Looks the method up in the registry and runs whatever it requires. On
/// success the caller's [`AuthContext`](crate::auth::AuthContext) is placed
/// in request extensions for the handler.
pub async fn rpc_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let method = req
        .uri()
        .path()
        .strip_prefix(RPC_PREFIX)
        .unwrap_or_default()
        .to_string();

    match state.gateway.check_rpc(&method, req.headers()).await {
        Ok(Some(ctx)) => {
            tracing::debug!(method, subject = %ctx.username, "RPC call authorized");
            req.extensions_mut().insert(ctx);
        }
        Ok(None) => {}
        Err(e) => return ApiError::from(e).into_response(),
    }

    next.run(req).await
}
