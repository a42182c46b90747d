use std::collections::HashMap;
use std::fmt::Debug;

use crate::cache::CacheResult;

/// A memcache-like key-value client.
///
/// TTLs are in seconds, `0` means the entry never expires.
pub trait CacheClient: Send + Sync + Debug {
    /// Fetches all present keys in one round trip. Missing keys are absent from the map.
    fn get_multi(&self, keys: &[&str]) -> CacheResult<HashMap<String, Vec<u8>>>;

    /// Fetches a single key.
    fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        Ok(self.get_multi(&[key])?.remove(key))
    }

    /// Stores all items with the same TTL.
    fn set_multi(&self, items: &[(String, Vec<u8>)], ttl: u32) -> CacheResult<()>;

    /// Stores `value` only if `key` is absent. Returns whether it was stored.
    ///
    /// This must be atomic across every client sharing the cache.
    fn add(&self, key: &str, value: &[u8], ttl: u32) -> CacheResult<bool>;

    /// Removes a key, returning whether it was present.
    fn delete(&self, key: &str) -> CacheResult<bool>;

    /// Removes every key.
    fn flush(&self) -> CacheResult<()>;

    /// Releases connections. The default does nothing.
    fn close(&self) -> CacheResult<()> {
        Ok(())
    }
}

/// A boxed [`CacheClient`] trait object.
pub type BoxedCacheClient = Box<dyn CacheClient>;
