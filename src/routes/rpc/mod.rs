//! RPC methods served as `POST /rpc/{package.Service}/{Method}` with JSON
//! bodies. Authorization for every method happens in
//! [`rpc_auth_middleware`](crate::middleware::rpc_auth_middleware), applied
//! with `route_layer` in `build_app`.

mod admin;
mod auth;
mod error;

use axum::{Router, routing::post};
pub use error::ApiError;

use crate::AppState;

pub fn rpc_routes() -> Router<AppState> {
    Router::new()
        .route("/rpc/auth.v1.AuthService/Login", post(auth::login))
        .route("/rpc/auth.v1.AuthService/Register", post(auth::register))
        .route("/rpc/auth.v1.AuthService/Logout", post(auth::logout))
        .route(
            "/rpc/auth.v1.AuthService/VerifyToken",
            post(auth::verify_token),
        )
        .route(
            "/rpc/auth.v1.AuthService/RefreshToken",
            post(auth::refresh_token),
        )
        // Tenants
        .route(
            "/rpc/auth.v1.TenantService/CreateTenant",
            post(admin::create_tenant),
        )
        .route(
            "/rpc/auth.v1.TenantService/ListTenants",
            post(admin::list_tenants),
        )
        .route(
            "/rpc/auth.v1.TenantService/UpdateTenant",
            post(admin::update_tenant),
        )
        // Roles
        .route(
            "/rpc/auth.v1.RoleService/CreateRole",
            post(admin::create_role),
        )
        .route("/rpc/auth.v1.RoleService/ListRoles", post(admin::list_roles))
        .route(
            "/rpc/auth.v1.RoleService/UpdateRole",
            post(admin::update_role),
        )
        // Users
        .route("/rpc/auth.v1.UserService/ListUsers", post(admin::list_users))
        .route(
            "/rpc/auth.v1.UserService/UpdateUser",
            post(admin::update_user),
        )
        // Grants
        .route(
            "/rpc/auth.v1.GrantService/CreateGrant",
            post(admin::create_grant),
        )
        .route(
            "/rpc/auth.v1.GrantService/ListGrants",
            post(admin::list_grants),
        )
        .route(
            "/rpc/auth.v1.GrantService/UpdateGrant",
            post(admin::update_grant),
        )
        .route(
            "/rpc/auth.v1.GrantService/DeleteGrant",
            post(admin::delete_grant),
        )
        // Rules
        .route(
            "/rpc/auth.v1.RuleService/CreateRule",
            post(admin::create_rule),
        )
        .route("/rpc/auth.v1.RuleService/ListRules", post(admin::list_rules))
        .route(
            "/rpc/auth.v1.RuleService/UpdateRule",
            post(admin::update_rule),
        )
        .route(
            "/rpc/auth.v1.RuleService/DeleteRule",
            post(admin::delete_rule),
        )
}
