use mason_tile_utils::TileIndex;

use crate::cache::{CacheResult, TileCache};
use crate::tiles::Tile;

/// A [`TileCache`] used when caching is disabled: every lookup misses and every lock is
/// granted.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullTileCache;

/// Token handed out by [`NullTileCache::lock`].
const NULL_TOKEN: u64 = 1;

impl TileCache for NullTileCache {
    fn get(&self, _tag: &str, _index: &TileIndex) -> CacheResult<Option<Tile>> {
        Ok(None)
    }

    fn put(&self, _tag: &str, _tile: &Tile, _ttl: u32) -> CacheResult<()> {
        Ok(())
    }

    fn put_multi(&self, _tag: &str, _tiles: &[Tile], _ttl: u32) -> CacheResult<()> {
        Ok(())
    }

    fn has(&self, _tag: &str, _index: &TileIndex) -> CacheResult<bool> {
        Ok(false)
    }

    fn has_all(&self, _tag: &str, indices: &[TileIndex]) -> CacheResult<bool> {
        Ok(indices.is_empty())
    }

    fn retire(&self, _tag: &str, _index: &TileIndex) -> CacheResult<()> {
        Ok(())
    }

    fn flush(&self) -> CacheResult<()> {
        Ok(())
    }

    fn lock(&self, _tag: &str, _index: &TileIndex, _ttl: u32) -> CacheResult<u64> {
        Ok(NULL_TOKEN)
    }

    fn unlock(&self, _tag: &str, _index: &TileIndex, _token: u64) -> CacheResult<bool> {
        Ok(true)
    }
}
