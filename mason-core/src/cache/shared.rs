use std::sync::LazyLock;
use std::{slice, str};

use mason_tile_utils::TileIndex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::cache::{BoxedCacheClient, CacheError, CacheResult, TileCache};
use crate::tiles::Tile;

const METADATA_SUFFIX: &str = "~metadata";
const LOCK_SUFFIX: &str = "~lock";

static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_%-]+$").expect("valid tag pattern"));

/// `(mimetype, mtime, etag)`, encoded as a JSON array next to the tile data.
#[derive(Debug, Serialize, Deserialize)]
struct TileMetadata(String, f64, String);

fn validate_tag(tag: &str) -> CacheResult<()> {
    if TAG_PATTERN.is_match(tag) {
        Ok(())
    } else {
        Err(CacheError::InvalidTag(tag.to_string()))
    }
}

fn tile_key(tag: &str, index: &TileIndex) -> String {
    format!("{tag}/{}/{}/{}", index.z(), index.x(), index.y())
}

/// A [`TileCache`] on top of a memcache-like [`CacheClient`](crate::cache::CacheClient).
///
/// Each tile occupies two keys, the data under `{tag}/{z}/{x}/{y}` and its metadata under
/// `{tag}/{z}/{x}/{y}~metadata`. Both are always fetched in one request, and a tile counts
/// as cached only when both are present. Render locks live under `{tag}/{z}/{x}/{y}~lock`.
#[derive(Debug)]
pub struct SharedTileCache {
    client: BoxedCacheClient,
}

impl SharedTileCache {
    /// Wraps a client shared by every worker.
    #[must_use]
    pub fn new(client: BoxedCacheClient) -> Self {
        Self { client }
    }
}

/// Data and metadata entries of a cached tile.
fn encode_tile(tag: &str, tile: &Tile) -> CacheResult<[(String, Vec<u8>); 2]> {
    let key = tile_key(tag, tile.index());
    let metadata = TileMetadata(
        tile.mimetype().to_string(),
        tile.mtime(),
        tile.etag().to_string(),
    );
    let metadata = serde_json::to_vec(&metadata)
        .map_err(|e| CacheError::MetadataError(key.clone(), e))?;
    Ok([
        (format!("{key}{METADATA_SUFFIX}"), metadata),
        (key, tile.data().to_vec()),
    ])
}

impl TileCache for SharedTileCache {
    fn get(&self, tag: &str, index: &TileIndex) -> CacheResult<Option<Tile>> {
        validate_tag(tag)?;
        let key = tile_key(tag, index);
        let metadata_key = format!("{key}{METADATA_SUFFIX}");

        let mut found = self.client.get_multi(&[key.as_str(), metadata_key.as_str()])?;
        let (Some(data), Some(metadata)) = (found.remove(&key), found.remove(&metadata_key))
        else {
            trace!("Tile cache MISS for {key}");
            return Ok(None);
        };
        let TileMetadata(mimetype, mtime, etag) = serde_json::from_slice(&metadata)
            .map_err(|e| CacheError::MetadataError(metadata_key, e))?;

        trace!("Tile cache HIT for {key}");
        Ok(Some(Tile::from_parts(*index, data, mimetype, mtime, etag)))
    }

    fn put(&self, tag: &str, tile: &Tile, ttl: u32) -> CacheResult<()> {
        self.put_multi(tag, slice::from_ref(tile), ttl)
    }

    fn put_multi(&self, tag: &str, tiles: &[Tile], ttl: u32) -> CacheResult<()> {
        validate_tag(tag)?;
        let mut items = Vec::with_capacity(tiles.len() * 2);
        for tile in tiles {
            items.extend(encode_tile(tag, tile)?);
        }
        trace!("Caching {} tiles under {tag} for {ttl}s", tiles.len());
        self.client.set_multi(&items, ttl)
    }

    fn has(&self, tag: &str, index: &TileIndex) -> CacheResult<bool> {
        self.has_all(tag, slice::from_ref(index))
    }

    fn has_all(&self, tag: &str, indices: &[TileIndex]) -> CacheResult<bool> {
        validate_tag(tag)?;
        let keys: Vec<String> = indices
            .iter()
            .flat_map(|index| {
                let key = tile_key(tag, index);
                [format!("{key}{METADATA_SUFFIX}"), key]
            })
            .collect();
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        let found = self.client.get_multi(&keys)?;
        Ok(keys.iter().all(|key| found.contains_key(*key)))
    }

    fn retire(&self, tag: &str, index: &TileIndex) -> CacheResult<()> {
        validate_tag(tag)?;
        let key = tile_key(tag, index);
        self.client.delete(&format!("{key}{METADATA_SUFFIX}"))?;
        self.client.delete(&key)?;
        debug!("Retired cached tile {key}");
        Ok(())
    }

    fn flush(&self) -> CacheResult<()> {
        debug!("Flushing tile cache");
        self.client.flush()
    }

    fn lock(&self, tag: &str, index: &TileIndex, ttl: u32) -> CacheResult<u64> {
        validate_tag(tag)?;
        let key = format!("{}{LOCK_SUFFIX}", tile_key(tag, index));
        let token = rand::random_range(1..=u64::MAX);
        if self.client.add(&key, token.to_string().as_bytes(), ttl.max(1))? {
            trace!("Acquired render lock {key}");
            Ok(token)
        } else {
            trace!("Render lock {key} is held elsewhere");
            Ok(0)
        }
    }

    fn unlock(&self, tag: &str, index: &TileIndex, token: u64) -> CacheResult<bool> {
        validate_tag(tag)?;
        let key = format!("{}{LOCK_SUFFIX}", tile_key(tag, index));
        let Some(stored) = self.client.get(&key)? else {
            return Ok(true);
        };
        let held_by_caller = str::from_utf8(&stored)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            == Some(token);
        if held_by_caller {
            self.client.delete(&key)?;
            trace!("Released render lock {key}");
            Ok(true)
        } else {
            warn!("Render lock {key} is held with another token, leaving it to expire");
            Ok(false)
        }
    }

    fn close(&self) -> CacheResult<()> {
        self.client.close()
    }
}
