use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::time::Duration;

use memcache::{Client, CommandError, MemcacheError};
use tracing::{debug, trace};

use crate::cache::{CacheClient, CacheResult};

/// A [`CacheClient`] talking to one or more memcached servers.
///
/// Servers are given as URLs, e.g. `memcache://127.0.0.1:11211`. Keys are distributed
/// across servers by hash, so the lock of a metatile always lives on one server.
pub struct MemcacheClient {
    client: Client,
    servers: Vec<String>,
}

impl MemcacheClient {
    /// Connects to `servers`, with an optional read and write timeout per request.
    pub fn connect(servers: &[String], timeout: Option<Duration>) -> CacheResult<Self> {
        let client = Client::connect(servers.to_vec())?;
        client.set_read_timeout(timeout)?;
        client.set_write_timeout(timeout)?;
        debug!("Connected to memcache at {}", servers.join(", "));
        Ok(Self {
            client,
            servers: servers.to_vec(),
        })
    }
}

impl Debug for MemcacheClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemcacheClient")
            .field("servers", &self.servers)
            .finish_non_exhaustive()
    }
}

/// `false` when the key already exists, other command failures are errors.
fn check_added(result: Result<(), MemcacheError>) -> CacheResult<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(MemcacheError::CommandError(CommandError::KeyExists)) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

impl CacheClient for MemcacheClient {
    fn get_multi(&self, keys: &[&str]) -> CacheResult<HashMap<String, Vec<u8>>> {
        let found: HashMap<String, Vec<u8>> = self.client.gets(keys)?;
        trace!("Memcache returned {} of {} keys", found.len(), keys.len());
        Ok(found)
    }

    fn set_multi(&self, items: &[(String, Vec<u8>)], ttl: u32) -> CacheResult<()> {
        for (key, value) in items {
            self.client.set(key, value.as_slice(), ttl)?;
        }
        Ok(())
    }

    fn add(&self, key: &str, value: &[u8], ttl: u32) -> CacheResult<bool> {
        if !check_added(self.client.add(key, value, ttl))? {
            return Ok(false);
        }
        // the text protocol reports NOT_STORED as success
        let stored: Option<Vec<u8>> = self.client.get(key)?;
        Ok(stored.as_deref() == Some(value))
    }

    fn delete(&self, key: &str) -> CacheResult<bool> {
        Ok(self.client.delete(key)?)
    }

    fn flush(&self) -> CacheResult<()> {
        Ok(self.client.flush()?)
    }
}
