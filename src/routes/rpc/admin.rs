//! Policy administration methods. Every call here has already passed the
//! interceptor's enforce check.

use axum::{Json, extract::State};
use axum_valid::Valid;

use super::ApiError;
use crate::{
    AppState,
    api_types::{Empty, IdRequest, ListResponse, UpdateRequest},
    models::{
        CreateGrant, CreatePermissionRule, CreateRole, CreateTenant, Grant, PermissionRule, Role,
        Subject, Tenant, UpdateGrant, UpdatePermissionRule, UpdateRole, UpdateSubject,
        UpdateTenant,
    },
};

// ─────────────────────────────────────────────────────────────────────────────
// auth.v1.TenantService
// ─────────────────────────────────────────────────────────────────────────────

#[tracing::instrument(name = "rpc.tenants.create", skip_all)]
pub async fn create_tenant(
    State(state): State<AppState>,
    Valid(Json(input)): Valid<Json<CreateTenant>>,
) -> Result<Json<Tenant>, ApiError> {
    Ok(Json(state.services.tenants.create(input).await?))
}

#[tracing::instrument(name = "rpc.tenants.list", skip_all)]
pub async fn list_tenants(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<Tenant>>, ApiError> {
    Ok(Json(state.services.tenants.list().await?.into()))
}

#[tracing::instrument(name = "rpc.tenants.update", skip_all, fields(id = input.id))]
pub async fn update_tenant(
    State(state): State<AppState>,
    Valid(Json(input)): Valid<Json<UpdateRequest<UpdateTenant>>>,
) -> Result<Json<Tenant>, ApiError> {
    Ok(Json(
        state.services.tenants.update(input.id, input.update).await?,
    ))
}

// ─────────────────────────────────────────────────────────────────────────────
// auth.v1.RoleService
// ─────────────────────────────────────────────────────────────────────────────

#[tracing::instrument(name = "rpc.roles.create", skip_all)]
pub async fn create_role(
    State(state): State<AppState>,
    Valid(Json(input)): Valid<Json<CreateRole>>,
) -> Result<Json<Role>, ApiError> {
    Ok(Json(state.services.roles.create(input).await?))
}

#[tracing::instrument(name = "rpc.roles.list", skip_all)]
pub async fn list_roles(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<Role>>, ApiError> {
    Ok(Json(state.services.roles.list().await?.into()))
}

#[tracing::instrument(name = "rpc.roles.update", skip_all, fields(id = input.id))]
pub async fn update_role(
    State(state): State<AppState>,
    Valid(Json(input)): Valid<Json<UpdateRequest<UpdateRole>>>,
) -> Result<Json<Role>, ApiError> {
    Ok(Json(state.services.roles.update(input.id, input.update).await?))
}

// ─────────────────────────────────────────────────────────────────────────────
// auth.v1.UserService
// ─────────────────────────────────────────────────────────────────────────────

#[tracing::instrument(name = "rpc.users.list", skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<Subject>>, ApiError> {
    Ok(Json(state.services.users.list().await?.into()))
}

#[tracing::instrument(name = "rpc.users.update", skip_all, fields(id = input.id))]
pub async fn update_user(
    State(state): State<AppState>,
    Valid(Json(input)): Valid<Json<UpdateRequest<UpdateSubject>>>,
) -> Result<Json<Subject>, ApiError> {
    Ok(Json(state.services.users.update(input.id, input.update).await?))
}

// ─────────────────────────────────────────────────────────────────────────────
// auth.v1.GrantService
// ─────────────────────────────────────────────────────────────────────────────

#[tracing::instrument(name = "rpc.grants.create", skip_all)]
pub async fn create_grant(
    State(state): State<AppState>,
    Valid(Json(input)): Valid<Json<CreateGrant>>,
) -> Result<Json<Grant>, ApiError> {
    Ok(Json(state.services.grants.create(input).await?))
}

#[tracing::instrument(name = "rpc.grants.list", skip_all)]
pub async fn list_grants(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<Grant>>, ApiError> {
    Ok(Json(state.services.grants.list().await?.into()))
}

#[tracing::instrument(name = "rpc.grants.update", skip_all, fields(id = input.id))]
pub async fn update_grant(
    State(state): State<AppState>,
    Valid(Json(input)): Valid<Json<UpdateRequest<UpdateGrant>>>,
) -> Result<Json<Grant>, ApiError> {
    Ok(Json(state.services.grants.update(input.id, input.update).await?))
}

#[tracing::instrument(name = "rpc.grants.delete", skip_all, fields(id = input.id))]
pub async fn delete_grant(
    State(state): State<AppState>,
    Json(input): Json<IdRequest>,
) -> Result<Json<Empty>, ApiError> {
    state.services.grants.delete(input.id).await?;
    Ok(Json(Empty {}))
}

// ─────────────────────────────────────────────────────────────────────────────
// auth.v1.RuleService
// ─────────────────────────────────────────────────────────────────────────────

#[tracing::instrument(name = "rpc.rules.create", skip_all)]
pub async fn create_rule(
    State(state): State<AppState>,
    Valid(Json(input)): Valid<Json<CreatePermissionRule>>,
) -> Result<Json<PermissionRule>, ApiError> {
    Ok(Json(state.services.rules.create(input).await?))
}

#[tracing::instrument(name = "rpc.rules.list", skip_all)]
pub async fn list_rules(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<PermissionRule>>, ApiError> {
    Ok(Json(state.services.rules.list().await?.into()))
}

#[tracing::instrument(name = "rpc.rules.update", skip_all, fields(id = input.id))]
pub async fn update_rule(
    State(state): State<AppState>,
    Valid(Json(input)): Valid<Json<UpdateRequest<UpdatePermissionRule>>>,
) -> Result<Json<PermissionRule>, ApiError> {
    Ok(Json(state.services.rules.update(input.id, input.update).await?))
}

#[tracing::instrument(name = "rpc.rules.delete", skip_all, fields(id = input.id))]
pub async fn delete_rule(
    State(state): State<AppState>,
    Json(input): Json<IdRequest>,
) -> Result<Json<Empty>, ApiError> {
    state.services.rules.delete(input.id).await?;
    Ok(Json(Empty {}))
}
