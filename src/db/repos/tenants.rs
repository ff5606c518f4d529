use async_trait::async_trait;

use crate::{
    db::error::DbResult,
    models::{CreateTenant, Tenant, UpdateTenant},
};

#[async_trait]
pub trait TenantRepo: Send + Sync {
    async fn create(&self, input: CreateTenant) -> DbResult<Tenant>;
    async fn get(&self, id: i64) -> DbResult<Option<Tenant>>;
    async fn get_by_name(&self, name: &str) -> DbResult<Option<Tenant>>;
    async fn list(&self) -> DbResult<Vec<Tenant>>;
    async fn update(&self, id: i64, input: UpdateTenant) -> DbResult<Tenant>;
}
