use thiserror::Error;

use crate::{auth::AuthError, db::DbError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Database error: {0}")]
    Database(DbError),
}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => ServiceError::NotFound("Resource not found".to_string()),
            DbError::Conflict(msg) => ServiceError::Conflict(msg),
            DbError::Validation(msg) => ServiceError::Validation(msg),
            _ => ServiceError::Database(err),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
