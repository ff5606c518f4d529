use async_trait::async_trait;
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use super::common::map_unique_violation;
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::RoleRepo,
    },
    models::{CreateRole, Role, UpdateRole},
};

pub struct SqliteRoleRepo {
    pool: SqlitePool,
}

impl SqliteRoleRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn from_row(row: &SqliteRow) -> Role {
        Role {
            id: row.get("id"),
            title: row.get("title"),
            enabled: row.get("enabled"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl RoleRepo for SqliteRoleRepo {
    async fn create(&self, input: CreateRole) -> DbResult<Role> {
        let now = chrono::Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO roles (title, enabled, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&input.title)
        .bind(input.enabled)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_unique_violation(e, || format!("Role '{}' already exists", input.title))
        })?;

        Ok(Role {
            id: result.last_insert_rowid(),
            title: input.title,
            enabled: input.enabled,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get(&self, id: i64) -> DbResult<Option<Role>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, enabled, created_at, updated_at
            FROM roles
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(Self::from_row))
    }

    async fn get_by_title(&self, title: &str) -> DbResult<Option<Role>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, enabled, created_at, updated_at
            FROM roles
            WHERE title = ?
            "#,
        )
        .bind(title)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(Self::from_row))
    }

    async fn list(&self) -> DbResult<Vec<Role>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, enabled, created_at, updated_at
            FROM roles
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::from_row).collect())
    }

    async fn update(&self, id: i64, input: UpdateRole) -> DbResult<Role> {
        let now = chrono::Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE roles
            SET title = COALESCE(?, title),
                enabled = COALESCE(?, enabled),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&input.title)
        .bind(input.enabled)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_unique_violation(e, || {
                format!(
                    "Role '{}' already exists",
                    input.title.as_deref().unwrap_or_default()
                )
            })
        })?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        self.get(id).await?.ok_or(DbError::NotFound)
    }
}
