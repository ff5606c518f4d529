use std::sync::Arc;

use super::ServiceResult;
use crate::{
    db::DbPool,
    events::{ChangeKind, EntityKind, EventBus},
    models::{CreateRole, Role, UpdateRole},
};

/// Service layer for role operations
#[derive(Clone)]
pub struct RoleService {
    db: Arc<DbPool>,
    events: EventBus,
}

impl RoleService {
    pub fn new(db: Arc<DbPool>, events: EventBus) -> Self {
        Self { db, events }
    }

    pub async fn create(&self, input: CreateRole) -> ServiceResult<Role> {
        let role = self.db.roles().create(input).await?;
        self.events
            .notify(EntityKind::Role, ChangeKind::Created, role.id);
        Ok(role)
    }

    pub async fn list(&self) -> ServiceResult<Vec<Role>> {
        Ok(self.db.roles().list().await?)
    }

    /// Renaming or disabling a role changes every fact that names it.
    pub async fn update(&self, id: i64, input: UpdateRole) -> ServiceResult<Role> {
        let role = self.db.roles().update(id, input).await?;
        self.events
            .notify(EntityKind::Role, ChangeKind::Updated, role.id);
        Ok(role)
    }
}
