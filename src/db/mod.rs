mod error;
pub mod repos;
pub mod sqlite;

#[cfg(test)]
pub mod tests;

use std::{str::FromStr, sync::Arc, time::Duration};

pub use error::{DbError, DbResult};
pub use repos::*;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use crate::config::{DatabaseConfig, SqliteConfig};

/// Cached repository trait objects, created once at startup.
struct CachedRepos {
    tenants: Arc<dyn TenantRepo>,
    roles: Arc<dyn RoleRepo>,
    subjects: Arc<dyn SubjectRepo>,
    grants: Arc<dyn GrantRepo>,
    rules: Arc<dyn RuleRepo>,
}

impl CachedRepos {
    fn sqlite(pool: &sqlx::SqlitePool) -> Self {
        Self {
            tenants: Arc::new(sqlite::SqliteTenantRepo::new(pool.clone())),
            roles: Arc::new(sqlite::SqliteRoleRepo::new(pool.clone())),
            subjects: Arc::new(sqlite::SqliteSubjectRepo::new(pool.clone())),
            grants: Arc::new(sqlite::SqliteGrantRepo::new(pool.clone())),
            rules: Arc::new(sqlite::SqliteRuleRepo::new(pool.clone())),
        }
    }
}

/// Database pool holding the policy store.
///
/// Repositories are cached at construction time to avoid allocation on each access.
pub struct DbPool {
    pool: sqlx::SqlitePool,
    repos: CachedRepos,
}

impl DbPool {
    /// Create a DbPool from an existing SQLite pool.
    /// Primarily useful for testing.
    pub fn from_sqlite(pool: sqlx::SqlitePool) -> Self {
        let repos = CachedRepos::sqlite(&pool);
        DbPool { pool, repos }
    }

    pub async fn from_config(config: &DatabaseConfig) -> DbResult<Self> {
        match config {
            DatabaseConfig::None => Err(DbError::NotConfigured),
            DatabaseConfig::Sqlite(cfg) => {
                let pool = Self::connect_sqlite(cfg).await?;
                Ok(Self::from_sqlite(pool))
            }
        }
    }

    async fn connect_sqlite(cfg: &SqliteConfig) -> DbResult<sqlx::SqlitePool> {
        let busy_timeout = Duration::from_millis(cfg.busy_timeout_ms);

        // Every connection to `:memory:` opens a fresh database, so the pool
        // is pinned to a single connection that never gets recycled.
        if cfg.path == ":memory:" {
            let options = SqliteConnectOptions::from_str("sqlite::memory:")?
                .busy_timeout(busy_timeout);
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?;
            return Ok(pool);
        }

        let options = SqliteConnectOptions::new()
            .filename(&cfg.path)
            .create_if_missing(cfg.create_if_missing)
            .journal_mode(if cfg.wal_mode {
                SqliteJournalMode::Wal
            } else {
                SqliteJournalMode::Delete
            })
            .busy_timeout(busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(cfg.max_connections)
            .connect_with(options)
            .await?;
        Ok(pool)
    }

    pub async fn run_migrations(&self) -> DbResult<()> {
        tracing::info!("Running SQLite migrations");
        sqlx::migrate!("./migrations_sqlx/sqlite")
            .run(&self.pool)
            .await?;
        tracing::info!("SQLite migrations completed successfully");
        Ok(())
    }

    pub fn tenants(&self) -> Arc<dyn TenantRepo> {
        Arc::clone(&self.repos.tenants)
    }

    pub fn roles(&self) -> Arc<dyn RoleRepo> {
        Arc::clone(&self.repos.roles)
    }

    pub fn subjects(&self) -> Arc<dyn SubjectRepo> {
        Arc::clone(&self.repos.subjects)
    }

    pub fn grants(&self) -> Arc<dyn GrantRepo> {
        Arc::clone(&self.repos.grants)
    }

    pub fn rules(&self) -> Arc<dyn RuleRepo> {
        Arc::clone(&self.repos.rules)
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
