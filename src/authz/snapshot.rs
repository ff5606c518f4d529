use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};

use super::{PermissionFact, PolicyFacts, field_matches};
use crate::models::{Effect, WILDCARD};

/// Outcome of evaluating one request against a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// At least one allow fact matched and no deny fact did.
    Allow,
    /// A deny fact matched.
    Deny,
    /// Nothing matched. Treated as a deny.
    NoMatch,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Deny => "deny",
            Decision::NoMatch => "no_match",
        }
    }
}

/// An immutable, indexed fact set.
///
/// Built off to the side during a reload and published whole, so readers
/// never observe a partially applied load.
#[derive(Debug)]
pub struct PolicySnapshot {
    generation: u64,
    loaded_at: DateTime<Utc>,
    /// member -> [(role, tenant)]
    memberships: HashMap<String, Vec<(String, String)>>,
    /// role -> permission facts
    permissions: HashMap<String, Vec<PermissionFact>>,
    fact_count: usize,
}

impl PolicySnapshot {
    /// The placeholder served before the first successful load.
    pub fn empty() -> Self {
        Self {
            generation: 0,
            loaded_at: Utc::now(),
            memberships: HashMap::new(),
            permissions: HashMap::new(),
            fact_count: 0,
        }
    }

    pub fn build(facts: PolicyFacts, generation: u64) -> Self {
        let fact_count = facts.len();

        let mut memberships: HashMap<String, Vec<(String, String)>> = HashMap::new();
        for g in facts.groups {
            memberships
                .entry(g.subject)
                .or_default()
                .push((g.role, g.tenant));
        }

        let mut permissions: HashMap<String, Vec<PermissionFact>> = HashMap::new();
        for p in facts.permissions {
            permissions.entry(p.role.clone()).or_default().push(p);
        }

        Self {
            generation,
            loaded_at: Utc::now(),
            memberships,
            permissions,
            fact_count,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn fact_count(&self) -> usize {
        self.fact_count
    }

    /// Every role `subject` holds in `tenant`, following role-to-role
    /// membership transitively. The subject itself is included so facts can
    /// name a subject directly.
    pub fn roles_for(&self, subject: &str, tenant: &str) -> HashSet<String> {
        let mut roles = HashSet::from([subject.to_string()]);
        let mut queue = VecDeque::from([subject.to_string()]);

        while let Some(member) = queue.pop_front() {
            let Some(grants) = self.memberships.get(&member) else {
                continue;
            };
            for (role, role_tenant) in grants {
                if (role_tenant == WILDCARD || role_tenant == tenant) && roles.insert(role.clone())
                {
                    queue.push_back(role.clone());
                }
            }
        }

        roles
    }

    /// Evaluate a request. Deny facts override allow facts, and no match is
    /// reported separately from an explicit deny.
    pub fn decide(
        &self,
        subject: &str,
        tenant: &str,
        resource: &str,
        action: &str,
        object: &str,
    ) -> Decision {
        let mut allowed = false;

        for role in self.roles_for(subject, tenant) {
            let Some(facts) = self.permissions.get(&role) else {
                continue;
            };
            for fact in facts {
                let matched = field_matches(&fact.tenant, tenant)
                    && field_matches(&fact.resource, resource)
                    && field_matches(&fact.action, action)
                    && field_matches(&fact.object, object);
                if !matched {
                    continue;
                }
                match fact.effect {
                    Effect::Deny => return Decision::Deny,
                    Effect::Allow => allowed = true,
                }
            }
        }

        if allowed {
            Decision::Allow
        } else {
            Decision::NoMatch
        }
    }
}
