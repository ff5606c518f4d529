use std::sync::Arc;

use super::{ServiceError, ServiceResult};
use crate::{
    db::DbPool,
    events::{ChangeKind, EntityKind, EventBus},
    models::{CreatePermissionRule, PermissionRule, UpdatePermissionRule},
};

/// Service layer for permission rules
#[derive(Clone)]
pub struct RuleService {
    db: Arc<DbPool>,
    events: EventBus,
}

impl RuleService {
    pub fn new(db: Arc<DbPool>, events: EventBus) -> Self {
        Self { db, events }
    }

    pub async fn create(&self, input: CreatePermissionRule) -> ServiceResult<PermissionRule> {
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

        let rule = self.db.rules().create(input).await?;
        self.events
            .notify(EntityKind::Rule, ChangeKind::Created, rule.id);
        Ok(rule)
    }

    pub async fn list(&self) -> ServiceResult<Vec<PermissionRule>> {
        Ok(self.db.rules().list_all().await?)
    }

    pub async fn update(
        &self,
        id: i64,
        input: UpdatePermissionRule,
    ) -> ServiceResult<PermissionRule> {
        let rule = self.db.rules().update(id, input).await?;
        self.events
            .notify(EntityKind::Rule, ChangeKind::Updated, rule.id);
        Ok(rule)
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        self.db.rules().delete(id).await?;
        self.events
            .notify(EntityKind::Rule, ChangeKind::Deleted, id);
        Ok(())
    }
}
