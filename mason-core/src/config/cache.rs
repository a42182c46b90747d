use std::num::NonZeroU64;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

#[cfg(feature = "memcache")]
use crate::cache::MemcacheClient;
use crate::cache::{BoxedTileCache, MemoryClient, NullTileCache, SharedTileCache};
use crate::config::{ConfigError, ConfigResult};

/// Cache backend selected by the `prototype` key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePrototype {
    /// One or more memcached servers.
    Memcache,
    /// A cache private to this process.
    Memory,
    /// Caching is disabled.
    #[default]
    Null,
}

/// Cache section of the configuration file.
///
/// ```yaml
/// prototype: memcache
/// servers: ["memcache://127.0.0.1:11211"]
/// timeout: 2s
/// ```
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Cache kind, `null` when unset.
    #[serde(default)]
    pub prototype: CachePrototype,
    /// Memcached server URLs.
    #[serde(default)]
    pub servers: Vec<String>,
    /// Read and write timeout of memcached requests.
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    /// Size limit of the `memory` cache in megabytes.
    pub max_capacity: Option<NonZeroU64>,
}

impl CacheConfig {
    /// Builds the configured tile cache.
    pub fn create_cache(&self) -> ConfigResult<BoxedTileCache> {
        match self.prototype {
            CachePrototype::Memcache => self.create_memcache(),
            CachePrototype::Memory => {
                let client = if let Some(size_mb) = self.max_capacity {
                    info!("Initializing in-memory tile cache with maximum size {size_mb} MB");
                    MemoryClient::new(size_mb.get().saturating_mul(1000 * 1000))
                } else {
                    info!("Initializing in-memory tile cache with default size");
                    MemoryClient::default()
                };
                Ok(Box::new(SharedTileCache::new(Box::new(client))))
            }
            CachePrototype::Null => {
                info!("Tile caching is disabled");
                Ok(Box::new(NullTileCache))
            }
        }
    }

    #[cfg(feature = "memcache")]
    fn create_memcache(&self) -> ConfigResult<BoxedTileCache> {
        if self.servers.is_empty() {
            return Err(ConfigError::MissingSetting("memcache", "servers"));
        }
        info!("Initializing memcache tile cache on {}", self.servers.join(", "));
        let client = MemcacheClient::connect(&self.servers, self.timeout)?;
        Ok(Box::new(SharedTileCache::new(Box::new(client))))
    }

    #[cfg(not(feature = "memcache"))]
    fn create_memcache(&self) -> ConfigResult<BoxedTileCache> {
        Err(ConfigError::FeatureDisabled("memcache", "memcache"))
    }
}
