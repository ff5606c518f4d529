use std::sync::Arc;

use super::ServiceResult;
use crate::{
    db::DbPool,
    events::{ChangeKind, EntityKind, EventBus},
    models::{Subject, UpdateSubject},
};

/// Service layer for subject administration. Subjects are created through
/// registration.
#[derive(Clone)]
pub struct UserService {
    db: Arc<DbPool>,
    events: EventBus,
}

impl UserService {
    pub fn new(db: Arc<DbPool>, events: EventBus) -> Self {
        Self { db, events }
    }

    pub async fn list(&self) -> ServiceResult<Vec<Subject>> {
        Ok(self.db.subjects().list().await?)
    }

    pub async fn update(&self, id: i64, input: UpdateSubject) -> ServiceResult<Subject> {
        let subject = self.db.subjects().update(id, input).await?;
        self.events
            .notify(EntityKind::Subject, ChangeKind::Updated, subject.id);
        Ok(subject)
    }
}
