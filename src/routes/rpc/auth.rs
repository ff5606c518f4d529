//! `auth.v1.AuthService` methods.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, header},
};
use axum_valid::Valid;

use super::ApiError;
use crate::{
    AppState,
    api_types::{
        LoginRequest, LogoutResponse, RefreshTokenRequest, RegisterRequest, TokenPairResponse,
        VerifyTokenRequest, VerifyTokenResponse,
    },
    auth::{AuthContext, AuthError, parse_bearer},
    models::Subject,
};

const LOGIN_PATH: &str = "/v1/auth/login";

#[tracing::instrument(name = "rpc.auth.login", skip_all, fields(username = %input.username))]
pub async fn login(
    State(state): State<AppState>,
    Valid(Json(input)): Valid<Json<LoginRequest>>,
) -> Result<Json<TokenPairResponse>, ApiError> {
    let pair = state
        .services
        .auth
        .login(&input.username, &input.password)
        .await?;
    Ok(Json(pair.into()))
}

/// Returns the created subject. The password hash is never serialized.
#[tracing::instrument(name = "rpc.auth.register", skip_all, fields(username = %input.username))]
pub async fn register(
    State(state): State<AppState>,
    Valid(Json(input)): Valid<Json<RegisterRequest>>,
) -> Result<Json<Subject>, ApiError> {
    let subject = state
        .services
        .auth
        .register(&input.username, &input.email, &input.password)
        .await?;
    Ok(Json(subject))
}

/// Revoke the caller's session.
#[tracing::instrument(name = "rpc.auth.logout", skip_all, fields(subject = %ctx.username))]
pub async fn logout(
    State(state): State<AppState>,
    ctx: AuthContext,
    headers: HeaderMap,
) -> Result<Json<LogoutResponse>, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredentials)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;
    state.services.auth.logout(parse_bearer(value)?).await?;
    Ok(Json(LogoutResponse {
        redirect_to: LOGIN_PATH.to_string(),
    }))
}

#[tracing::instrument(name = "rpc.auth.verify_token", skip_all)]
pub async fn verify_token(
    State(state): State<AppState>,
    Json(input): Json<VerifyTokenRequest>,
) -> Result<Json<VerifyTokenResponse>, ApiError> {
    state.services.auth.verify(&input.access_token).await?;
    Ok(Json(VerifyTokenResponse {
        access_token: input.access_token,
    }))
}

#[tracing::instrument(name = "rpc.auth.refresh_token", skip_all)]
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(input): Json<RefreshTokenRequest>,
) -> Result<Json<TokenPairResponse>, ApiError> {
    let pair = state.services.auth.refresh(&input.refresh_token).await?;
    Ok(Json(pair.into()))
}
