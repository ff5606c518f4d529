use std::fmt;

use crate::models::Effect;

/// `subject` holds `role` within `tenant`. Subjects may themselves be roles,
/// which is how role inheritance is expressed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupFact {
    pub subject: String,
    pub role: String,
    pub tenant: String,
}

/// `role` may (or may not, for [`Effect::Deny`]) perform `action` on
/// `object` of `resource` within `tenant`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PermissionFact {
    pub role: String,
    pub tenant: String,
    pub resource: String,
    pub action: String,
    pub object: String,
    pub effect: Effect,
}

/// The full fact set produced by one adapter load. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct PolicyFacts {
    pub groups: Vec<GroupFact>,
    pub permissions: Vec<PermissionFact>,
}

impl PolicyFacts {
    pub fn len(&self) -> usize {
        self.groups.len() + self.permissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.permissions.is_empty()
    }
}

impl fmt::Display for GroupFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g, {}, {}, {}", self.subject, self.role, self.tenant)
    }
}

impl fmt::Display for PermissionFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "p, {}, {}, {}, {}, {}, {}",
            self.role,
            self.tenant,
            self.resource,
            self.action,
            self.object,
            self.effect.as_str().to_ascii_lowercase()
        )
    }
}
