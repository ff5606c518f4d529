use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    db::error::DbResult,
    models::{CreateSubject, Subject, UpdateSubject},
};

#[async_trait]
pub trait SubjectRepo: Send + Sync {
    async fn create(&self, input: CreateSubject) -> DbResult<Subject>;
    async fn get(&self, id: i64) -> DbResult<Option<Subject>>;
    async fn get_by_uuid(&self, uuid: Uuid) -> DbResult<Option<Subject>>;
    async fn get_by_username(&self, username: &str) -> DbResult<Option<Subject>>;
    async fn list(&self) -> DbResult<Vec<Subject>>;
    async fn update(&self, id: i64, input: UpdateSubject) -> DbResult<Subject>;
}
