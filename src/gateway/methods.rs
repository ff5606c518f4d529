//! Static registry of RPC methods and what each one requires.

use std::collections::HashMap;

use crate::config::{MethodAccess, RpcMethodConfig};

/// What the interceptor checks for one method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodPolicy {
    Open,
    Authenticated,
    Enforced { resource: String, action: String },
}

pub const AUTH_SERVICE: &str = "auth.v1.AuthService";

/// Admin services with the resource their methods act on.
const ADMIN_SERVICES: &[(&str, &str, &[&str])] = &[
    (
        "auth.v1.TenantService",
        "tenants",
        &["CreateTenant", "ListTenants", "UpdateTenant"],
    ),
    (
        "auth.v1.RoleService",
        "roles",
        &["CreateRole", "ListRoles", "UpdateRole"],
    ),
    ("auth.v1.UserService", "users", &["ListUsers", "UpdateUser"]),
    (
        "auth.v1.GrantService",
        "grants",
        &["CreateGrant", "ListGrants", "UpdateGrant", "DeleteGrant"],
    ),
    (
        "auth.v1.RuleService",
        "rules",
        &["CreateRule", "ListRules", "UpdateRule", "DeleteRule"],
    ),
];

/// Map a method name to the HTTP-style action used in permission rules.
fn action_for(method: &str) -> Option<&'static str> {
    [
        ("List", "GET"),
        ("Create", "POST"),
        ("Update", "PUT"),
        ("Delete", "DELETE"),
    ]
    .into_iter()
    .find(|(prefix, _)| method.starts_with(prefix))
    .map(|(_, action)| action)
}

/// Method name (`package.Service/Method`) to policy. Unknown methods are
/// not in the registry and get rejected by the interceptor.
#[derive(Debug, Clone)]
pub struct MethodRegistry {
    methods: HashMap<String, MethodPolicy>,
}

impl MethodRegistry {
    /// Built-in entries, then configured overrides on top.
    pub fn new(overrides: &[RpcMethodConfig]) -> Self {
        let mut methods = HashMap::new();

        for method in ["Login", "Register", "VerifyToken", "RefreshToken"] {
            methods.insert(format!("{AUTH_SERVICE}/{method}"), MethodPolicy::Open);
        }
        methods.insert(
            format!("{AUTH_SERVICE}/Logout"),
            MethodPolicy::Authenticated,
        );

        for (service, resource, names) in ADMIN_SERVICES {
            for name in *names {
                if let Some(action) = action_for(name) {
                    methods.insert(
                        format!("{service}/{name}"),
                        MethodPolicy::Enforced {
                            resource: (*resource).to_string(),
                            action: action.to_string(),
                        },
                    );
                }
            }
        }

        for entry in overrides {
            let policy = match entry.access {
                MethodAccess::Open => MethodPolicy::Open,
                MethodAccess::Authenticated => MethodPolicy::Authenticated,
                // Config validation guarantees both are set
                MethodAccess::Enforced => MethodPolicy::Enforced {
                    resource: entry.resource.clone().unwrap_or_default(),
                    action: entry.action.clone().unwrap_or_default(),
                },
            };
            methods.insert(entry.method.clone(), policy);
        }

        Self { methods }
    }

    pub fn get(&self, method: &str) -> Option<&MethodPolicy> {
        self.methods.get(method)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new(&[])
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("auth.v1.AuthService/Login", MethodPolicy::Open)]
    #[case("auth.v1.AuthService/Logout", MethodPolicy::Authenticated)]
    #[case(
        "auth.v1.TenantService/ListTenants",
        MethodPolicy::Enforced { resource: "tenants".into(), action: "GET".into() }
    )]
    #[case(
        "auth.v1.GrantService/DeleteGrant",
        MethodPolicy::Enforced { resource: "grants".into(), action: "DELETE".into() }
    )]
    #[case(
        "auth.v1.UserService/UpdateUser",
        MethodPolicy::Enforced { resource: "users".into(), action: "PUT".into() }
    )]
    fn test_defaults(#[case] method: &str, #[case] expected: MethodPolicy) {
        assert_eq!(MethodRegistry::default().get(method), Some(&expected));
    }

    #[test]
    fn test_unknown_method() {
        assert!(MethodRegistry::default().get("auth.v1.AuthService/Nope").is_none());
    }

    #[test]
    fn test_override_replaces_default() {
        let registry = MethodRegistry::new(&[RpcMethodConfig {
            method: "auth.v1.RuleService/ListRules".into(),
            access: MethodAccess::Authenticated,
            resource: None,
            action: None,
        }]);
        assert_eq!(
            registry.get("auth.v1.RuleService/ListRules"),
            Some(&MethodPolicy::Authenticated)
        );
    }
}
