//! Test harness for database repository testing

use sqlx::SqlitePool;

use crate::{
    db::DbPool,
    models::{
        CreateGrant, CreatePermissionRule, CreateRole, CreateSubject, CreateTenant, Effect,
        Subject,
    },
};

/// Create an in-memory SQLite pool for testing
pub async fn create_sqlite_pool() -> SqlitePool {
    sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite pool")
}

/// Run SQLite migrations on the pool
///
/// Uses the actual migration files to ensure tests match production schema
pub async fn run_sqlite_migrations(pool: &SqlitePool) {
    sqlx::migrate!("./migrations_sqlx/sqlite")
        .run(pool)
        .await
        .expect("Failed to run SQLite migrations");
}

/// A migrated in-memory database wrapped in a `DbPool`.
pub async fn migrated_db() -> DbPool {
    let pool = create_sqlite_pool().await;
    run_sqlite_migrations(&pool).await;
    DbPool::from_sqlite(pool)
}

/// Ids created by [`seed_acme`].
pub struct AcmeFixture {
    pub alice: Subject,
    pub acme_id: i64,
    pub admin_role_id: i64,
    pub rule_id: i64,
}

/// Tenants `acme` and `globex`, subject `alice` holding role `admin` in
/// `acme`, and a rule letting `admin` GET any `domains` object in every
/// tenant.
pub async fn seed_acme(db: &DbPool) -> AcmeFixture {
    let acme = db
        .tenants()
        .create(CreateTenant {
            name: "acme".into(),
            enabled: true,
        })
        .await
        .expect("create tenant");
    db.tenants()
        .create(CreateTenant {
            name: "globex".into(),
            enabled: true,
        })
        .await
        .expect("create tenant");
    let alice = db
        .subjects()
        .create(CreateSubject {
            username: "alice".into(),
            email: "alice@acme.test".into(),
            password_hash: String::new(),
            enabled: true,
        })
        .await
        .expect("create subject");
    let admin = db
        .roles()
        .create(CreateRole {
            title: "admin".into(),
            enabled: true,
        })
        .await
        .expect("create role");
    db.grants()
        .create(CreateGrant {
            subject_id: alice.id,
            role_id: admin.id,
            tenant_id: Some(acme.id),
            enabled: true,
        })
        .await
        .expect("create grant");
    let rule = db
        .rules()
        .create(CreatePermissionRule {
            role_id: admin.id,
            tenant_id: None,
            resource: "domains".into(),
            action: "GET".into(),
            object: "*".into(),
            effect: Effect::Allow,
        })
        .await
        .expect("create rule");

    AcmeFixture {
        alice,
        acme_id: acme.id,
        admin_role_id: admin.id,
        rule_id: rule.id,
    }
}
