use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::tenant::default_enabled;

/// Assignment of a role to a subject within a tenant. No tenant means every
/// tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grant {
    pub id: i64,
    pub subject_id: i64,
    pub role_id: i64,
    pub tenant_id: Option<i64>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateGrant {
    pub subject_id: i64,
    pub role_id: i64,
    #[serde(default)]
    pub tenant_id: Option<i64>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateGrant {
    pub enabled: Option<bool>,
}
