mod auth;
mod error;
mod grants;
mod roles;
mod rules;
mod tenants;
mod users;

use std::sync::Arc;

pub use auth::AuthService;
pub use error::{ServiceError, ServiceResult};
pub use grants::GrantService;
pub use roles::RoleService;
pub use rules::RuleService;
pub use tenants::TenantService;
pub use users::UserService;

use crate::{auth::TokenService, config::PasswordConfig, db::DbPool, events::EventBus};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: AuthService,
    pub tenants: TenantService,
    pub roles: RoleService,
    pub users: UserService,
    pub grants: GrantService,
    pub rules: RuleService,
}

impl Services {
    /// Every mutating service publishes on `events`.
    pub fn new(
        db: Arc<DbPool>,
        tokens: Arc<TokenService>,
        events: EventBus,
        password: PasswordConfig,
    ) -> Self {
        Self {
            auth: AuthService::new(db.clone(), tokens, events.clone(), password),
            tenants: TenantService::new(db.clone(), events.clone()),
            roles: RoleService::new(db.clone(), events.clone()),
            users: UserService::new(db.clone(), events.clone()),
            grants: GrantService::new(db.clone(), events.clone()),
            rules: RuleService::new(db, events),
        }
    }
}
