use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// An authenticable identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    pub id: i64,
    pub uuid: Uuid,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string. Never leaves the process.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a subject. The password is already hashed.
#[derive(Debug, Clone)]
pub struct CreateSubject {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateSubject {
    #[validate(email)]
    pub email: Option<String>,
    pub enabled: Option<bool>,
}
