//! Shared tile caching with advisory render locks.
//!
//! A [`TileCache`] stores individual tiles under a tag (usually a theme name) and offers a
//! lock per tile, used to let only one worker render a metatile while the others wait for
//! the result to show up in the cache. Locks expire after their TTL, so a crashed holder
//! never blocks a tile forever.

use std::fmt::Debug;

use mason_tile_utils::TileIndex;

use crate::tiles::Tile;

mod error;
pub use error::{CacheError, CacheResult};

mod client;
pub use client::{BoxedCacheClient, CacheClient};

mod memory;
pub use memory::{DEFAULT_MEMORY_CAPACITY, MemoryClient};

#[cfg(feature = "memcache")]
mod memcached;
#[cfg(feature = "memcache")]
pub use memcached::MemcacheClient;

mod shared;
pub use shared::SharedTileCache;

mod null;
pub use null::NullTileCache;

/// Tile cache operations. TTLs are in seconds, `0` caches without expiry.
pub trait TileCache: Send + Sync + Debug {
    /// Reads a tile, `None` on a miss.
    fn get(&self, tag: &str, index: &TileIndex) -> CacheResult<Option<Tile>>;

    /// Writes a tile, replacing a cached one.
    fn put(&self, tag: &str, tile: &Tile, ttl: u32) -> CacheResult<()>;

    /// Writes many tiles in one request.
    fn put_multi(&self, tag: &str, tiles: &[Tile], ttl: u32) -> CacheResult<()>;

    /// Whether a tile is cached.
    fn has(&self, tag: &str, index: &TileIndex) -> CacheResult<bool>;

    /// Whether every tile is cached, checked in one request.
    fn has_all(&self, tag: &str, indices: &[TileIndex]) -> CacheResult<bool>;

    /// Removes a tile. The tile's lock is left alone.
    fn retire(&self, tag: &str, index: &TileIndex) -> CacheResult<()>;

    /// Removes everything, for every tag.
    fn flush(&self) -> CacheResult<()>;

    /// Tries to take the lock of `index` for at most `ttl` seconds (at least one).
    ///
    /// Returns a non-zero token on success, `0` if the lock is already held.
    fn lock(&self, tag: &str, index: &TileIndex, ttl: u32) -> CacheResult<u64>;

    /// Releases a lock taken with `token`.
    ///
    /// Returns `true` when the lock was released or is not held at all, `false` when it
    /// is held under another token, in which case it is left untouched.
    fn unlock(&self, tag: &str, index: &TileIndex, token: u64) -> CacheResult<bool>;

    /// Releases the cache connection. The default does nothing.
    fn close(&self) -> CacheResult<()> {
        Ok(())
    }
}

/// A boxed [`TileCache`] trait object.
pub type BoxedTileCache = Box<dyn TileCache>;
