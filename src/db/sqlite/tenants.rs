use async_trait::async_trait;
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use super::common::map_unique_violation;
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::TenantRepo,
    },
    models::{CreateTenant, Tenant, UpdateTenant},
};

pub struct SqliteTenantRepo {
    pool: SqlitePool,
}

impl SqliteTenantRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn from_row(row: &SqliteRow) -> Tenant {
        Tenant {
            id: row.get("id"),
            name: row.get("name"),
            enabled: row.get("enabled"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl TenantRepo for SqliteTenantRepo {
    async fn create(&self, input: CreateTenant) -> DbResult<Tenant> {
        let now = chrono::Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO tenants (name, enabled, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&input.name)
        .bind(input.enabled)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_unique_violation(e, || format!("Tenant '{}' already exists", input.name))
        })?;

        Ok(Tenant {
            id: result.last_insert_rowid(),
            name: input.name,
            enabled: input.enabled,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get(&self, id: i64) -> DbResult<Option<Tenant>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, enabled, created_at, updated_at
            FROM tenants
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(Self::from_row))
    }

    async fn get_by_name(&self, name: &str) -> DbResult<Option<Tenant>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, enabled, created_at, updated_at
            FROM tenants
            WHERE name = ?
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(Self::from_row))
    }

    async fn list(&self) -> DbResult<Vec<Tenant>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, enabled, created_at, updated_at
            FROM tenants
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::from_row).collect())
    }

    async fn update(&self, id: i64, input: UpdateTenant) -> DbResult<Tenant> {
        let now = chrono::Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE tenants
            SET name = COALESCE(?, name),
                enabled = COALESCE(?, enabled),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&input.name)
        .bind(input.enabled)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_unique_violation(e, || {
                format!(
                    "Tenant '{}' already exists",
                    input.name.as_deref().unwrap_or_default()
                )
            })
        })?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        self.get(id).await?.ok_or(DbError::NotFound)
    }
}
