use std::sync::Arc;

use super::{ServiceError, ServiceResult};
use crate::{
    db::DbPool,
    events::{ChangeKind, EntityKind, EventBus},
    models::{CreateTenant, Tenant, UpdateTenant, WILDCARD},
};

/// Service layer for tenant operations
#[derive(Clone)]
pub struct TenantService {
    db: Arc<DbPool>,
    events: EventBus,
}

impl TenantService {
    pub fn new(db: Arc<DbPool>, events: EventBus) -> Self {
        Self { db, events }
    }

    /// Create a tenant. `*` is reserved for "every tenant".
    pub async fn create(&self, input: CreateTenant) -> ServiceResult<Tenant> {
        reject_wildcard(&input.name)?;
        let tenant = self.db.tenants().create(input).await?;
        self.events
            .notify(EntityKind::Tenant, ChangeKind::Created, tenant.id);
        Ok(tenant)
    }

    pub async fn list(&self) -> ServiceResult<Vec<Tenant>> {
        Ok(self.db.tenants().list().await?)
    }

    pub async fn update(&self, id: i64, input: UpdateTenant) -> ServiceResult<Tenant> {
        if let Some(name) = &input.name {
            reject_wildcard(name)?;
        }
        let tenant = self.db.tenants().update(id, input).await?;
        self.events
            .notify(EntityKind::Tenant, ChangeKind::Updated, tenant.id);
        Ok(tenant)
    }
}

fn reject_wildcard(name: &str) -> ServiceResult<()> {
    if name.trim() == WILDCARD {
        return Err(ServiceError::Validation(format!(
            "Tenant name '{WILDCARD}' is reserved"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::tests::harness::migrated_db, events::EventTopic};

    #[tokio::test]
    async fn test_create_publishes_rule_change() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let service = TenantService::new(Arc::new(migrated_db().await), bus);

        let tenant = service
            .create(CreateTenant {
                name: "acme".into(),
                enabled: true,
            })
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.topic, EventTopic::RuleChange);
        assert_eq!(event.kind, ChangeKind::Created);
        assert_eq!(event.id, tenant.id);
    }

    #[tokio::test]
    async fn test_wildcard_name_rejected() {
        let service = TenantService::new(Arc::new(migrated_db().await), EventBus::new());
        let result = service
            .create(CreateTenant {
                name: "*".into(),
                enabled: true,
            })
            .await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_duplicate_name_conflicts() {
        let service = TenantService::new(Arc::new(migrated_db().await), EventBus::new());
        let input = CreateTenant {
            name: "acme".into(),
            enabled: true,
        };
        service.create(input.clone()).await.unwrap();
        assert!(matches!(
            service.create(input).await,
            Err(ServiceError::Conflict(_))
        ));
    }
}
