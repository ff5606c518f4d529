use std::sync::Arc;

use super::{ServiceError, ServiceResult};
use crate::{
    db::DbPool,
    events::{ChangeKind, EntityKind, EventBus},
    models::{CreateGrant, Grant, UpdateGrant},
};

/// Service layer for role grants
#[derive(Clone)]
pub struct GrantService {
    db: Arc<DbPool>,
    events: EventBus,
}

impl GrantService {
    pub fn new(db: Arc<DbPool>, events: EventBus) -> Self {
        Self { db, events }
    }

    /// Create a grant after checking that everything it references exists.
    pub async fn create(&self, input: CreateGrant) -> ServiceResult<Grant> {
        if self.db.subjects().get(input.subject_id).await?.is_none() {
            return Err(ServiceError::Validation(format!(
                "Subject {} does not exist",
                input.subject_id
            )));
        }
        if self.db.roles().get(input.role_id).await?.is_none() {
            return Err(ServiceError::Validation(format!(
                "Role {} does not exist",
                input.role_id
            )));
        }
        if let Some(tenant_id) = input.tenant_id
            && self.db.tenants().get(tenant_id).await?.is_none()
        {
            return Err(ServiceError::Validation(format!(
                "Tenant {tenant_id} does not exist"
            )));
        }

        let grant = self.db.grants().create(input).await?;
        self.events
            .notify(EntityKind::Grant, ChangeKind::Created, grant.id);
        Ok(grant)
    }

    pub async fn list(&self) -> ServiceResult<Vec<Grant>> {
        Ok(self.db.grants().list().await?)
    }

    pub async fn update(&self, id: i64, input: UpdateGrant) -> ServiceResult<Grant> {
        let grant = self.db.grants().update(id, input).await?;
        self.events
            .notify(EntityKind::Grant, ChangeKind::Updated, grant.id);
        Ok(grant)
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        self.db.grants().delete(id).await?;
        self.events
            .notify(EntityKind::Grant, ChangeKind::Deleted, id);
        Ok(())
    }
}
