use async_trait::async_trait;
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use uuid::Uuid;

use super::common::{map_unique_violation, parse_uuid};
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::SubjectRepo,
    },
    models::{CreateSubject, Subject, UpdateSubject},
};

const COLUMNS: &str =
    "id, uuid, username, email, password_hash, enabled, created_at, updated_at";

pub struct SqliteSubjectRepo {
    pool: SqlitePool,
}

impl SqliteSubjectRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn from_row(row: &SqliteRow) -> DbResult<Subject> {
        Ok(Subject {
            id: row.get("id"),
            uuid: parse_uuid(&row.get::<String, _>("uuid"))?,
            username: row.get("username"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            enabled: row.get("enabled"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    async fn fetch_one_where(&self, clause: &str, value: String) -> DbResult<Option<Subject>> {
        let query = format!("SELECT {COLUMNS} FROM subjects WHERE {clause} = ?");
        let row = sqlx::query(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::from_row).transpose()
    }
}

#[async_trait]
impl SubjectRepo for SqliteSubjectRepo {
    async fn create(&self, input: CreateSubject) -> DbResult<Subject> {
        let uuid = Uuid::new_v4();
        let now = chrono::Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO subjects (uuid, username, email, password_hash, enabled, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(uuid.to_string())
        .bind(&input.username)
        .bind(&input.email)
        .bind(&input.password_hash)
        .bind(input.enabled)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_unique_violation(e, || {
                format!("Subject with username '{}' already exists", input.username)
            })
        })?;

        Ok(Subject {
            id: result.last_insert_rowid(),
            uuid,
            username: input.username,
            email: input.email,
            password_hash: input.password_hash,
            enabled: input.enabled,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get(&self, id: i64) -> DbResult<Option<Subject>> {
        let query = format!("SELECT {COLUMNS} FROM subjects WHERE id = ?");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn get_by_uuid(&self, uuid: Uuid) -> DbResult<Option<Subject>> {
        self.fetch_one_where("uuid", uuid.to_string()).await
    }

    async fn get_by_username(&self, username: &str) -> DbResult<Option<Subject>> {
        self.fetch_one_where("username", username.to_string()).await
    }

    async fn list(&self) -> DbResult<Vec<Subject>> {
        let query = format!("SELECT {COLUMNS} FROM subjects ORDER BY id ASC");
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        rows.iter().map(Self::from_row).collect()
    }

    async fn update(&self, id: i64, input: UpdateSubject) -> DbResult<Subject> {
        let now = chrono::Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE subjects
            SET email = COALESCE(?, email),
                enabled = COALESCE(?, enabled),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&input.email)
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
}
