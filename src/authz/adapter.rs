use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;

use super::{AuthzError, GroupFact, PermissionFact, PolicyFacts};
use crate::{
    db::{DbPool, GrantRepo, RoleRepo, RuleRepo, SubjectRepo, TenantRepo},
    models::{Role, Subject, Tenant, WILDCARD},
};

/// Source of policy facts for the enforcer.
///
/// Implementations must be read-only: a load may run while an older fact set
/// is still serving requests.
#[async_trait]
pub trait PolicyAdapter: Send + Sync {
    async fn load(&self) -> Result<PolicyFacts, AuthzError>;
}

/// Builds facts from the relational policy store.
///
/// Grants and rules pointing at a missing or disabled subject, role or tenant
/// are skipped with a warning rather than failing the load.
pub struct DbPolicyAdapter {
    tenants: Arc<dyn TenantRepo>,
    roles: Arc<dyn RoleRepo>,
    subjects: Arc<dyn SubjectRepo>,
    grants: Arc<dyn GrantRepo>,
    rules: Arc<dyn RuleRepo>,
}

impl DbPolicyAdapter {
    pub fn new(db: &DbPool) -> Self {
        Self {
            tenants: db.tenants(),
            roles: db.roles(),
            subjects: db.subjects(),
            grants: db.grants(),
            rules: db.rules(),
        }
    }
}

/// Lookup tables for one load. Only enabled rows are kept, so a miss covers
/// both the missing and the disabled case.
struct References {
    tenants: HashMap<i64, Tenant>,
    roles: HashMap<i64, Role>,
    subjects: HashMap<i64, Subject>,
}

impl References {
    /// Resolve an optional tenant reference to the name used in facts.
    fn tenant_name(&self, tenant_id: Option<i64>) -> Option<String> {
        match tenant_id {
            None => Some(WILDCARD.to_string()),
            Some(id) => self.tenants.get(&id).map(|t| normalize(&t.name)),
        }
    }
}

/// Empty fact fields mean "any".
fn normalize(value: &str) -> String {
    if value.trim().is_empty() {
        WILDCARD.to_string()
    } else {
        value.to_string()
    }
}

#[async_trait]
impl PolicyAdapter for DbPolicyAdapter {
    async fn load(&self) -> Result<PolicyFacts, AuthzError> {
        let refs = References {
            tenants: self
                .tenants
                .list()
                .await?
                .into_iter()
                .filter(|t| t.enabled)
                .map(|t| (t.id, t))
                .collect(),
            roles: self
                .roles
                .list()
                .await?
                .into_iter()
                .filter(|r| r.enabled)
                .map(|r| (r.id, r))
                .collect(),
            subjects: self
                .subjects
                .list()
                .await?
                .into_iter()
                .filter(|s| s.enabled)
                .map(|s| (s.id, s))
                .collect(),
        };

        let grants = self.grants.list_enabled().await?;
        let rules = self.rules.list_all().await?;

        let mut facts = PolicyFacts::default();
        let mut skipped = 0usize;

        for grant in grants {
            let Some(subject) = refs.subjects.get(&grant.subject_id) else {
                tracing::warn!(
                    grant_id = grant.id,
                    subject_id = grant.subject_id,
                    "Skipping grant: subject missing or disabled"
                );
                skipped += 1;
                continue;
            };
            let Some(role) = refs.roles.get(&grant.role_id) else {
                tracing::warn!(
                    grant_id = grant.id,
                    role_id = grant.role_id,
                    "Skipping grant: role missing or disabled"
                );
                skipped += 1;
                continue;
            };
            let Some(tenant) = refs.tenant_name(grant.tenant_id) else {
                tracing::warn!(
                    grant_id = grant.id,
                    tenant_id = ?grant.tenant_id,
                    "Skipping grant: tenant missing or disabled"
                );
                skipped += 1;
                continue;
            };

            facts.groups.push(GroupFact {
                subject: subject.username.clone(),
                role: role.title.clone(),
                tenant,
            });
        }

        for rule in rules {
            let Some(role) = refs.roles.get(&rule.role_id) else {
                tracing::warn!(
                    rule_id = rule.id,
                    role_id = rule.role_id,
                    "Skipping rule: role missing or disabled"
                );
                skipped += 1;
                continue;
            };
            let Some(tenant) = refs.tenant_name(rule.tenant_id) else {
                tracing::warn!(
                    rule_id = rule.id,
                    tenant_id = ?rule.tenant_id,
                    "Skipping rule: tenant missing or disabled"
                );
                skipped += 1;
                continue;
            };

            facts.permissions.push(PermissionFact {
                role: role.title.clone(),
                tenant,
                resource: normalize(&rule.resource),
                action: normalize(&rule.action),
                object: normalize(&rule.object),
                effect: rule.effect,
            });
        }

        tracing::debug!(
            groups = facts.groups.len(),
            permissions = facts.permissions.len(),
            skipped,
            "Loaded policy facts"
        );

        Ok(facts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::tests::harness::migrated_db,
        models::{
            CreateGrant, CreatePermissionRule, CreateRole, CreateSubject, CreateTenant, Effect,
            UpdateSubject, UpdateTenant,
        },
    };

    async fn seed_subject(db: &DbPool, username: &str) -> i64 {
        db.subjects()
            .create(CreateSubject {
                username: username.into(),
                email: format!("{username}@example.com"),
                password_hash: "hash".into(),
                enabled: true,
            })
            .await
            .unwrap()
            .id
    }

    async fn seed_role(db: &DbPool, title: &str) -> i64 {
        db.roles()
            .create(CreateRole {
                title: title.into(),
                enabled: true,
            })
            .await
            .unwrap()
            .id
    }

    async fn seed_tenant(db: &DbPool, name: &str) -> i64 {
        db.tenants()
            .create(CreateTenant {
                name: name.into(),
                enabled: true,
            })
            .await
            .unwrap()
            .id
    }

    fn rule(role_id: i64, tenant_id: Option<i64>, effect: Effect) -> CreatePermissionRule {
        CreatePermissionRule {
            role_id,
            tenant_id,
            resource: "orders".into(),
            action: "GET".into(),
            object: "*".into(),
            effect,
        }
    }

    #[tokio::test]
    async fn test_load_builds_group_and_permission_facts() {
        let db = migrated_db().await;
        let alice = seed_subject(&db, "alice").await;
        let reader = seed_role(&db, "reader").await;
        let acme = seed_tenant(&db, "acme").await;

        db.grants()
            .create(CreateGrant {
                subject_id: alice,
                role_id: reader,
                tenant_id: Some(acme),
                enabled: true,
            })
            .await
            .unwrap();
        db.rules()
            .create(rule(reader, None, Effect::Allow))
            .await
            .unwrap();

        let facts = DbPolicyAdapter::new(&db).load().await.unwrap();

        assert_eq!(
            facts.groups,
            vec![GroupFact {
                subject: "alice".into(),
                role: "reader".into(),
                tenant: "acme".into(),
            }]
        );
        assert_eq!(facts.permissions.len(), 1);
        assert_eq!(facts.permissions[0].tenant, "*");
        assert_eq!(facts.permissions[0].effect, Effect::Allow);
    }

    #[tokio::test]
    async fn test_unset_grant_tenant_loads_as_wildcard() {
        let db = migrated_db().await;
        let alice = seed_subject(&db, "alice").await;
        let reader = seed_role(&db, "reader").await;

        db.grants()
            .create(CreateGrant {
                subject_id: alice,
                role_id: reader,
                tenant_id: None,
                enabled: true,
            })
            .await
            .unwrap();

        let facts = DbPolicyAdapter::new(&db).load().await.unwrap();
        assert_eq!(facts.groups[0].tenant, "*");
    }

    #[tokio::test]
    async fn test_dangling_references_are_skipped() {
        let db = migrated_db().await;
        let alice = seed_subject(&db, "alice").await;
        let reader = seed_role(&db, "reader").await;

        // Unknown role
        db.grants()
            .create(CreateGrant {
                subject_id: alice,
                role_id: 404,
                tenant_id: None,
                enabled: true,
            })
            .await
            .unwrap();
        // Unknown tenant
        db.rules()
            .create(rule(reader, Some(404), Effect::Allow))
            .await
            .unwrap();
        // Valid
        db.rules()
            .create(rule(reader, None, Effect::Deny))
            .await
            .unwrap();

        let facts = DbPolicyAdapter::new(&db).load().await.unwrap();
        assert!(facts.groups.is_empty());
        assert_eq!(facts.permissions.len(), 1);
        assert_eq!(facts.permissions[0].effect, Effect::Deny);
    }

    #[tokio::test]
    async fn test_disabled_rows_are_not_loaded() {
        let db = migrated_db().await;
        let alice = seed_subject(&db, "alice").await;
        let bob = seed_subject(&db, "bob").await;
        let reader = seed_role(&db, "reader").await;
        let acme = seed_tenant(&db, "acme").await;

        // Disabled grant
        db.grants()
            .create(CreateGrant {
                subject_id: alice,
                role_id: reader,
                tenant_id: None,
                enabled: false,
            })
            .await
            .unwrap();
        // Grant in a tenant that gets disabled
        db.grants()
            .create(CreateGrant {
                subject_id: alice,
                role_id: reader,
                tenant_id: Some(acme),
                enabled: true,
            })
            .await
            .unwrap();
        // Grant for a subject that gets disabled
        db.grants()
            .create(CreateGrant {
                subject_id: bob,
                role_id: reader,
                tenant_id: None,
                enabled: true,
            })
            .await
            .unwrap();

        db.tenants()
            .update(
                acme,
                UpdateTenant {
                    name: None,
                    enabled: Some(false),
                },
            )
            .await
            .unwrap();
        db.subjects()
            .update(
                bob,
                UpdateSubject {
                    email: None,
                    enabled: Some(false),
                },
            )
            .await
            .unwrap();

        let facts = DbPolicyAdapter::new(&db).load().await.unwrap();
        assert!(facts.groups.is_empty());
    }

    #[tokio::test]
    async fn test_load_is_read_only() {
        let db = migrated_db().await;
        let adapter = DbPolicyAdapter::new(&db);

        let first = adapter.load().await.unwrap();
        let second = adapter.load().await.unwrap();
        assert_eq!(first.len(), second.len());
        assert!(db.tenants().list().await.unwrap().is_empty());
    }
}
