use async_trait::async_trait;

use crate::{
    db::error::DbResult,
    models::{CreateRole, Role, UpdateRole},
};

#[async_trait]
pub trait RoleRepo: Send + Sync {
    async fn create(&self, input: CreateRole) -> DbResult<Role>;
    async fn get(&self, id: i64) -> DbResult<Option<Role>>;
    async fn get_by_title(&self, title: &str) -> DbResult<Option<Role>>;
    async fn list(&self) -> DbResult<Vec<Role>>;
    async fn update(&self, id: i64, input: UpdateRole) -> DbResult<Role>;
}
