use async_trait::async_trait;
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use crate::{
    db::error::{DbError, DbResult},
    db::repos::RuleRepo,
    models::{CreatePermissionRule, Effect, PermissionRule, UpdatePermissionRule},
};

const COLUMNS: &str =
    "id, role_id, tenant_id, resource, action, object, effect, created_at, updated_at";

pub struct SqliteRuleRepo {
    pool: SqlitePool,
}

impl SqliteRuleRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn from_row(row: &SqliteRow) -> DbResult<PermissionRule> {
        let effect: String = row.get("effect");
        let effect = effect.parse::<Effect>().map_err(DbError::Internal)?;

        Ok(PermissionRule {
            id: row.get("id"),
            role_id: row.get("role_id"),
            tenant_id: row.get("tenant_id"),
            resource: row.get("resource"),
            action: row.get("action"),
            object: row.get("object"),
            effect,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl RuleRepo for SqliteRuleRepo {
    async fn create(&self, input: CreatePermissionRule) -> DbResult<PermissionRule> {
        let now = chrono::Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO permission_rules (role_id, tenant_id, resource, action, object, effect, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(input.role_id)
        .bind(input.tenant_id)
        .bind(&input.resource)
        .bind(&input.action)
        .bind(&input.object)
        .bind(input.effect.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(PermissionRule {
            id: result.last_insert_rowid(),
            role_id: input.role_id,
            tenant_id: input.tenant_id,
            resource: input.resource,
            action: input.action,
            object: input.object,
            effect: input.effect,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get(&self, id: i64) -> DbResult<Option<PermissionRule>> {
        let query = format!("SELECT {COLUMNS} FROM permission_rules WHERE id = ?");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn list_all(&self) -> DbResult<Vec<PermissionRule>> {
        let query = format!("SELECT {COLUMNS} FROM permission_rules ORDER BY id ASC");
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        rows.iter().map(Self::from_row).collect()
    }

    async fn update(&self, id: i64, input: UpdatePermissionRule) -> DbResult<PermissionRule> {
        let now = chrono::Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE permission_rules
            SET resource = COALESCE(?, resource),
                action = COALESCE(?, action),
                object = COALESCE(?, object),
                effect = COALESCE(?, effect),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&input.resource)
        .bind(&input.action)
        .bind(&input.object)
        .bind(input.effect.map(|e| e.as_str()))
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        self.get(id).await?.ok_or(DbError::NotFound)
    }

    async fn delete(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM permission_rules WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        Ok(())
    }
}
