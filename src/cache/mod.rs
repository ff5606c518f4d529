mod error;
mod memory;
#[cfg(feature = "redis")]
mod redis;
mod traits;

use std::sync::Arc;

pub use error::{CacheError, CacheResult};
pub use memory::MemoryCache;
#[cfg(feature = "redis")]
pub use redis::{RedisCache, StreamEntry};
pub use traits::{Cache, CacheExt};

use crate::config::CacheConfig;

/// Build the session store selected by configuration.
pub async fn from_config(config: &CacheConfig) -> CacheResult<Arc<dyn Cache>> {
    match config {
        CacheConfig::None => Err(CacheError::NotConfigured),
        CacheConfig::Memory(c) => Ok(Arc::new(MemoryCache::new(c))),
        #[cfg(feature = "redis")]
        CacheConfig::Redis(c) => Ok(Arc::new(RedisCache::from_config(c).await?)),
    }
}
