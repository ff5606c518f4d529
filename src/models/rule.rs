use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Outcome attached to a permission rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Effect {
    #[serde(alias = "allow", alias = "Allow")]
    Allow,
    #[serde(alias = "deny", alias = "Deny")]
    Deny,
}

impl Effect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "ALLOW",
            Self::Deny => "DENY",
        }
    }
}

impl FromStr for Effect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALLOW" => Ok(Self::Allow),
            "DENY" => Ok(Self::Deny),
            other => Err(format!("unknown effect '{other}'")),
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single allow/deny statement for a role. No tenant means every tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRule {
    pub id: i64,
    pub role_id: i64,
    pub tenant_id: Option<i64>,
    pub resource: String,
    pub action: String,
    pub object: String,
    pub effect: Effect,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePermissionRule {
    pub role_id: i64,
    #[serde(default)]
    pub tenant_id: Option<i64>,
    #[validate(length(min = 1, max = 255))]
    pub resource: String,
    #[validate(length(min = 1, max = 64))]
    pub action: String,
    #[serde(default = "default_object")]
    #[validate(length(min = 1, max = 255))]
    pub object: String,
    pub effect: Effect,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdatePermissionRule {
    #[validate(length(min = 1, max = 255))]
    pub resource: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub action: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub object: Option<String>,
    pub effect: Option<Effect>,
}

fn default_object() -> String {
    super::WILDCARD.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effect_is_case_normalized() {
        assert_eq!("allow".parse::<Effect>().unwrap(), Effect::Allow);
        assert_eq!(" Deny ".parse::<Effect>().unwrap(), Effect::Deny);
        assert!("maybe".parse::<Effect>().is_err());

        let effect: Effect = serde_json::from_str("\"deny\"").unwrap();
        assert_eq!(effect, Effect::Deny);
        assert_eq!(serde_json::to_string(&Effect::Allow).unwrap(), "\"ALLOW\"");
    }
}
