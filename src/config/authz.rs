use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Authorization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthzConfig {
    /// Policy model. Only role-based access with tenant domains is
    /// supported; the field exists so a config written for another model
    /// fails loudly.
    #[serde(default)]
    pub model: PolicyModel,

    /// Ordered path templates used by forward-auth to derive
    /// `(resource, object)`. The first template that matches wins.
    #[serde(default = "default_route_patterns")]
    pub route_patterns: Vec<String>,

    /// Policy reload behaviour.
    #[serde(default)]
    pub invalidation: InvalidationConfig,

    /// RPC interceptor settings.
    #[serde(default)]
    pub rpc: RpcAuthzConfig,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            model: PolicyModel::default(),
            route_patterns: default_route_patterns(),
            invalidation: InvalidationConfig::default(),
            rpc: RpcAuthzConfig::default(),
        }
    }
}

impl AuthzConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.route_patterns.is_empty() {
            return Err(ConfigError::Validation(
                "authz.route_patterns must contain at least one template".into(),
            ));
        }
        crate::authz::RouteMatcher::new(&self.route_patterns)
            .map_err(|e| ConfigError::Validation(format!("authz.route_patterns: {e}")))?;

        for method in &self.rpc.methods {
            if method.method.is_empty() {
                return Err(ConfigError::Validation(
                    "authz.rpc.methods entries need a method name".into(),
                ));
            }
            if method.access == MethodAccess::Enforced
                && (method.resource.is_none() || method.action.is_none())
            {
                return Err(ConfigError::Validation(format!(
                    "authz.rpc.methods '{}' is enforced but has no resource/action",
                    method.method
                )));
            }
        }
        Ok(())
    }
}

/// The supported policy model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyModel {
    /// Subjects inherit roles through grants scoped to a tenant; permission
    /// facts match with `*` wildcards and deny overrides allow.
    #[default]
    RbacWithDomains,
}

/// Route templates used when none are configured.
pub fn default_route_patterns() -> Vec<String> {
    vec![
        r"/v\d+/(?P<resource>\w+)".to_string(),
        r"/v\d+/(?P<resource>\w+)/(?P<object>[\w-]+)".to_string(),
        r"/v\d+/\w+/[\w-]+/-/(?P<resource>\w+)".to_string(),
        r"/v\d+/\w+/[\w-]+/-/(?P<resource>\w+)/(?P<object>[\w-]+)".to_string(),
    ]
}

/// Policy reload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InvalidationConfig {
    /// Quiet period after a mutation event before reloading. Events inside
    /// the window share one reload. Zero reloads on every event.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for InvalidationConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    50
}

/// RPC interceptor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RpcAuthzConfig {
    /// Trusted header carrying the tenant. Falls back to `Host`.
    #[serde(default = "default_tenant_header")]
    pub tenant_header: String,

    /// Extra or overriding entries for the method registry.
    #[serde(default)]
    pub methods: Vec<RpcMethodConfig>,
}

impl Default for RpcAuthzConfig {
    fn default() -> Self {
        Self {
            tenant_header: default_tenant_header(),
            methods: Vec::new(),
        }
    }
}

fn default_tenant_header() -> String {
    "x-forwarded-host".to_string()
}

/// One method registry entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RpcMethodConfig {
    /// Full method name, `package.Service/Method`.
    pub method: String,

    #[serde(default)]
    pub access: MethodAccess,

    #[serde(default)]
    pub resource: Option<String>,

    #[serde(default)]
    pub action: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodAccess {
    /// No credentials needed.
    Open,
    /// A valid session is enough.
    Authenticated,
    /// A valid session plus an allow decision.
    #[default]
    Enforced,
}
