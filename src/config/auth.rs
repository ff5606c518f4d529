use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Signing secret used when none is configured. Startup logs a warning when
/// it is in effect.
pub const DEFAULT_JWT_SECRET: &str = "this-is-for-test-dont-use-in-production";

/// Authentication configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Access/refresh token settings.
    #[serde(default)]
    pub tokens: TokenConfig,

    /// Password policy for login and registration.
    #[serde(default)]
    pub password: PasswordConfig,
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tokens.validate()?;
        self.password.validate()
    }
}

/// Token signing and lifetime configuration.
///
/// Tokens are HS256 JWTs. The access half lives for minutes, the refresh
/// half for hours.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenConfig {
    /// HMAC signing secret.
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    /// Access token lifetime in minutes.
    #[serde(default = "default_access_ttl")]
    pub access_token_ttl_minutes: u64,

    /// Refresh token lifetime in hours.
    #[serde(default = "default_refresh_ttl")]
    pub refresh_token_ttl_hours: u64,

    /// Clock skew tolerated when checking `exp`, in seconds.
    #[serde(default)]
    pub leeway_secs: u64,

    /// How long a refresh token stays locked while it is being rotated,
    /// in seconds.
    #[serde(default = "default_rotation_lock")]
    pub rotation_lock_secs: u64,

    /// Deadline for a single session store call, in milliseconds.
    #[serde(default = "default_store_timeout")]
    pub store_timeout_ms: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            access_token_ttl_minutes: default_access_ttl(),
            refresh_token_ttl_hours: default_refresh_ttl(),
            leeway_secs: 0,
            rotation_lock_secs: default_rotation_lock(),
            store_timeout_ms: default_store_timeout(),
        }
    }
}

impl TokenConfig {
    pub fn access_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.access_token_ttl_minutes * 60)
    }

    pub fn refresh_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.refresh_token_ttl_hours * 3600)
    }

    pub fn store_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.store_timeout_ms)
    }

    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::Validation(
                "auth.tokens.jwt_secret cannot be empty".into(),
            ));
        }
        if self.access_token_ttl_minutes == 0 || self.refresh_token_ttl_hours == 0 {
            return Err(ConfigError::Validation(
                "auth.tokens token lifetimes must be greater than 0".into(),
            ));
        }
        if self.refresh_ttl() <= self.access_ttl() {
            return Err(ConfigError::Validation(
                "auth.tokens.refresh_token_ttl_hours must outlive the access token".into(),
            ));
        }
        if self.store_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "auth.tokens.store_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.rotation_lock_secs == 0 {
            return Err(ConfigError::Validation(
                "auth.tokens.rotation_lock_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

fn default_jwt_secret() -> String {
    DEFAULT_JWT_SECRET.to_string()
}

fn default_access_ttl() -> u64 {
    15
}

fn default_refresh_ttl() -> u64 {
    170
}

fn default_rotation_lock() -> u64 {
    10
}

fn default_store_timeout() -> u64 {
    2000
}

/// Password length bounds enforced by Login and Register.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PasswordConfig {
    #[serde(default = "default_min_length")]
    pub min_length: usize,

    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            max_length: default_max_length(),
        }
    }
}

impl PasswordConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.min_length == 0 || self.min_length > self.max_length {
            return Err(ConfigError::Validation(
                "auth.password requires 0 < min_length <= max_length".into(),
            ));
        }
        Ok(())
    }
}

fn default_min_length() -> usize {
    6
}

fn default_max_length() -> usize {
    128
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AuthConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.tokens.uses_default_secret());
        assert_eq!(config.tokens.access_ttl().as_secs(), 15 * 60);
        assert_eq!(config.tokens.refresh_ttl().as_secs(), 170 * 3600);
    }

    #[test]
    fn test_refresh_must_outlive_access() {
        let tokens = TokenConfig {
            access_token_ttl_minutes: 120,
            refresh_token_ttl_hours: 1,
            ..Default::default()
        };
        assert!(tokens.validate().is_err());
    }

    #[test]
    fn test_empty_secret_rejected() {
        let tokens = TokenConfig {
            jwt_secret: String::new(),
            ..Default::default()
        };
        assert!(tokens.validate().is_err());
    }
}
