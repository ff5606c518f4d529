use async_trait::async_trait;

use crate::{
    db::error::DbResult,
    models::{CreateGrant, Grant, UpdateGrant},
};

#[async_trait]
pub trait GrantRepo: Send + Sync {
    async fn create(&self, input: CreateGrant) -> DbResult<Grant>;
    async fn get(&self, id: i64) -> DbResult<Option<Grant>>;
    async fn list(&self) -> DbResult<Vec<Grant>>;
    /// Enabled grants only, in ascending id order.
    async fn list_enabled(&self) -> DbResult<Vec<Grant>>;
    async fn update(&self, id: i64, input: UpdateGrant) -> DbResult<Grant>;
    async fn delete(&self, id: i64) -> DbResult<()>;
}
