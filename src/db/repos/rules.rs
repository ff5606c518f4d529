use async_trait::async_trait;

use crate::{
    db::error::DbResult,
    models::{CreatePermissionRule, PermissionRule, UpdatePermissionRule},
};

#[async_trait]
pub trait RuleRepo: Send + Sync {
    async fn create(&self, input: CreatePermissionRule) -> DbResult<PermissionRule>;
    async fn get(&self, id: i64) -> DbResult<Option<PermissionRule>>;
    /// Every rule, in ascending id order.
    async fn list_all(&self) -> DbResult<Vec<PermissionRule>>;
    async fn update(&self, id: i64, input: UpdatePermissionRule) -> DbResult<PermissionRule>;
    async fn delete(&self, id: i64) -> DbResult<()>;
}
