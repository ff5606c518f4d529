use async_trait::async_trait;
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use super::common::map_unique_violation;
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::GrantRepo,
    },
    models::{CreateGrant, Grant, UpdateGrant},
};

const COLUMNS: &str = "id, subject_id, role_id, tenant_id, enabled, created_at, updated_at";

pub struct SqliteGrantRepo {
    pool: SqlitePool,
}

impl SqliteGrantRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn from_row(row: &SqliteRow) -> Grant {
        Grant {
            id: row.get("id"),
            subject_id: row.get("subject_id"),
            role_id: row.get("role_id"),
            tenant_id: row.get("tenant_id"),
            enabled: row.get("enabled"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl GrantRepo for SqliteGrantRepo {
    async fn create(&self, input: CreateGrant) -> DbResult<Grant> {
        let now = chrono::Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO grants (subject_id, role_id, tenant_id, enabled, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(input.subject_id)
        .bind(input.role_id)
        .bind(input.tenant_id)
        .bind(input.enabled)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_unique_violation(e, || {
                format!(
                    "Subject {} already holds role {} in this tenant",
                    input.subject_id, input.role_id
                )
            })
        })?;

        Ok(Grant {
            id: result.last_insert_rowid(),
            subject_id: input.subject_id,
            role_id: input.role_id,
            tenant_id: input.tenant_id,
            enabled: input.enabled,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get(&self, id: i64) -> DbResult<Option<Grant>> {
        let query = format!("SELECT {COLUMNS} FROM grants WHERE id = ?");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(Self::from_row))
    }

    async fn list(&self) -> DbResult<Vec<Grant>> {
        let query = format!("SELECT {COLUMNS} FROM grants ORDER BY id ASC");
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        Ok(rows.iter().map(Self::from_row).collect())
    }

    async fn list_enabled(&self) -> DbResult<Vec<Grant>> {
        let query = format!("SELECT {COLUMNS} FROM grants WHERE enabled = 1 ORDER BY id ASC");
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        Ok(rows.iter().map(Self::from_row).collect())
    }

    async fn update(&self, id: i64, input: UpdateGrant) -> DbResult<Grant> {
        let now = chrono::Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE grants
            SET enabled = COALESCE(?, enabled),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(input.enabled)
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
        let result = sqlx::query("DELETE FROM grants WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        Ok(())
    }
}
