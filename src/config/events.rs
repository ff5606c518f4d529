use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Event bus configuration.
///
/// Policy mutations are always published on the in-process bus. With the
/// `redis` variant they are also relayed through a Redis stream so every
/// gateway node reloads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub enum EventsConfig {
    /// In-process broadcast only. Good for single-node deployments.
    #[default]
    Local,

    /// In-process broadcast plus a Redis stream relay.
    #[cfg(feature = "redis")]
    Redis(RedisEventsConfig),
}

impl EventsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            EventsConfig::Local => Ok(()),
            #[cfg(feature = "redis")]
            EventsConfig::Redis(c) => c.validate(),
        }
    }
}

/// Redis stream relay configuration.
#[cfg(feature = "redis")]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisEventsConfig {
    /// Redis connection URL.
    pub url: String,

    /// Stream key events are appended to.
    #[serde(default = "default_stream")]
    pub stream: String,

    /// Approximate stream length cap (`XADD MAXLEN ~`).
    #[serde(default = "default_max_len")]
    pub max_len: usize,

    /// How long one `XREADGROUP` call blocks, in milliseconds.
    #[serde(default = "default_block_ms")]
    pub block_ms: usize,

    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

#[cfg(feature = "redis")]
impl RedisEventsConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::Validation(
                "events.url cannot be empty".into(),
            ));
        }
        if self.stream.is_empty() {
            return Err(ConfigError::Validation(
                "events.stream cannot be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(feature = "redis")]
fn default_stream() -> String {
    "warden:policy-events".to_string()
}

#[cfg(feature = "redis")]
fn default_max_len() -> usize {
    10_000
}

#[cfg(feature = "redis")]
fn default_block_ms() -> usize {
    250
}

#[cfg(feature = "redis")]
fn default_connect_timeout() -> u64 {
    5
}
