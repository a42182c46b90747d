use std::collections::HashMap;
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::sync::Cache;
use tracing::trace;

use crate::cache::{CacheClient, CacheResult};

/// Default upper bound of the in-process cache, in bytes of cached values.
pub const DEFAULT_MEMORY_CAPACITY: u64 = 256 * 1024 * 1024;

#[derive(Clone, Debug)]
struct CachedValue {
    data: Vec<u8>,
    ttl: u32,
}

/// Expires each entry after its own TTL, restarting it when the entry is overwritten.
struct PerEntryTtl;

impl PerEntryTtl {
    fn duration(value: &CachedValue) -> Option<Duration> {
        (value.ttl > 0).then(|| Duration::from_secs(u64::from(value.ttl)))
    }
}

impl Expiry<String, CachedValue> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Self::duration(value)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Self::duration(value)
    }
}

/// An in-process [`CacheClient`], shared only by clones of the same client.
///
/// Suitable for a single worker process and for tests.
#[derive(Clone, Debug)]
pub struct MemoryClient(Cache<String, CachedValue>);

impl MemoryClient {
    /// Creates a cache bounded to `max_size_bytes` of cached values.
    #[must_use]
    pub fn new(max_size_bytes: u64) -> Self {
        let cache = Cache::builder()
            .name("tile_cache")
            .weigher(|key: &String, value: &CachedValue| -> u32 {
                (key.len() + value.data.len())
                    .try_into()
                    .unwrap_or(u32::MAX)
            })
            .max_capacity(max_size_bytes)
            .expire_after(PerEntryTtl)
            .build();
        Self(cache)
    }

    /// Number of live entries. Approximate until pending maintenance has run.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.0.entry_count()
    }
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_CAPACITY)
    }
}

impl CacheClient for MemoryClient {
    fn get_multi(&self, keys: &[&str]) -> CacheResult<HashMap<String, Vec<u8>>> {
        let found: HashMap<_, _> = keys
            .iter()
            .filter_map(|key| self.0.get(*key).map(|v| ((*key).to_string(), v.data)))
            .collect();
        trace!("Memory cache returned {} of {} keys", found.len(), keys.len());
        Ok(found)
    }

    fn set_multi(&self, items: &[(String, Vec<u8>)], ttl: u32) -> CacheResult<()> {
        for (key, data) in items {
            self.0.insert(
                key.clone(),
                CachedValue {
                    data: data.clone(),
                    ttl,
                },
            );
        }
        Ok(())
    }

    fn add(&self, key: &str, value: &[u8], ttl: u32) -> CacheResult<bool> {
        let entry = self
            .0
            .entry(key.to_string())
            .or_insert_with(|| CachedValue {
                data: value.to_vec(),
                ttl,
            });
        Ok(entry.is_fresh())
    }

    fn delete(&self, key: &str) -> CacheResult<bool> {
        Ok(self.0.remove(key).is_some())
    }

    fn flush(&self) -> CacheResult<()> {
        self.0.invalidate_all();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn test_get_set_delete() {
        let client = MemoryClient::default();
        client
            .set_multi(&[("a".to_string(), b"1".to_vec()), ("b".to_string(), b"2".to_vec())], 0)
            .unwrap();

        let found = client.get_multi(&["a", "b", "c"]).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found["a"], b"1");
        assert_eq!(client.get("c").unwrap(), None);

        assert!(client.delete("a").unwrap());
        assert!(!client.delete("a").unwrap());
        client.flush().unwrap();
        assert_eq!(client.get("b").unwrap(), None);
    }

    #[test]
    fn test_add_only_when_absent() {
        let client = MemoryClient::default();
        assert!(client.add("lock", b"1", 0).unwrap());
        assert!(!client.add("lock", b"2", 0).unwrap());
        assert_eq!(client.get("lock").unwrap().as_deref(), Some(&b"1"[..]));
    }

    #[test]
    fn test_ttl_expires() {
        let client = MemoryClient::default();
        client.set_multi(&[("short".to_string(), b"x".to_vec())], 1).unwrap();
        client.set_multi(&[("long".to_string(), b"y".to_vec())], 60).unwrap();
        assert!(client.add("lock", b"1", 1).unwrap());

        thread::sleep(Duration::from_millis(1200));
        assert_eq!(client.get("short").unwrap(), None);
        assert!(client.get("long").unwrap().is_some());
        assert!(client.add("lock", b"2", 1).unwrap());
    }

    #[test]
    fn test_clones_share_entries() {
        let client = MemoryClient::default();
        let other = client.clone();
        let winners: usize = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let c = if i % 2 == 0 { &client } else { &other };
                    s.spawn(move || usize::from(c.add("race", b"x", 0).unwrap()))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });
        assert_eq!(winners, 1);
    }
}
