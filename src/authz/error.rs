//! Authorization errors.

use thiserror::Error;

use crate::db::DbError;

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("Policy not loaded yet")]
    NotReady,

    #[error("Invalid authorization request: {0}")]
    InvalidRequest(String),

    #[error("Policy load failed: {0}")]
    Load(#[from] DbError),

    #[error("Internal error: {0}")]
    Internal(String),
}
