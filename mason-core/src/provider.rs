use std::error::Error;
use std::fmt::Debug;
use std::thread;
use std::time::Duration;

use mason_tile_utils::{MetaTileIndex, TileIndex};
use tracing::{debug, info, warn};

use crate::cache::{BoxedTileCache, CacheError};
use crate::storage::BoxedClusterStorage;
use crate::tiles::{BoxedSplitter, ClusterError, MetaTile, Tile, TileCluster};
use crate::{MasonCoreError, MasonCoreResult};

/// Error type returned by [`MetaTileRenderer`] implementations.
pub type RenderError = Box<dyn Error + Send + Sync>;

/// Produces metatiles on demand, e.g. by running a map renderer.
pub trait MetaTileRenderer: Send + Sync + Debug {
    /// Renders the metatile at `index`, which carries the requested stride.
    fn render(&self, index: &MetaTileIndex) -> Result<MetaTile, RenderError>;
}

/// Settings of a [`TileProvider`].
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderOptions {
    /// Cache tag the tiles are stored under.
    pub tag: String,
    /// Stride of rendered metatiles.
    pub stride: u32,
    /// Seconds rendered tiles stay cached, `0` for no expiry.
    pub cache_ttl: u32,
    /// Seconds a render lock is held at most.
    pub lock_ttl: u32,
    /// How often to look for a tile rendered by another worker before giving up.
    pub lock_retries: u32,
    /// Pause between two looks for a tile rendered by another worker.
    pub retry_delay: Duration,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            tag: "default".to_string(),
            stride: 1,
            cache_ttl: 0,
            lock_ttl: 60,
            lock_retries: 100,
            retry_delay: Duration::from_millis(100),
        }
    }
}

/// Serves tiles from a cache, falling back to cluster storage and finally to rendering.
///
/// Rendering a metatile is guarded by the cache lock of its top-left tile, so concurrent
/// requests for tiles of one metatile render it only once. Workers that find the lock
/// taken poll the cache and the storage until the tile shows up.
#[derive(Debug)]
pub struct TileProvider {
    storage: BoxedClusterStorage,
    cache: BoxedTileCache,
    renderer: Box<dyn MetaTileRenderer>,
    splitter: BoxedSplitter,
    options: ProviderOptions,
}

impl TileProvider {
    /// Assembles a provider. `splitter` must match the mimetype the renderer produces.
    pub fn new(
        storage: BoxedClusterStorage,
        cache: BoxedTileCache,
        renderer: Box<dyn MetaTileRenderer>,
        splitter: BoxedSplitter,
        options: ProviderOptions,
    ) -> Self {
        info!(
            "Serving tiles tagged {} from {}×{} metatiles",
            options.tag, options.stride, options.stride
        );
        Self {
            storage,
            cache,
            renderer,
            splitter,
            options,
        }
    }

    /// Settings the provider was created with.
    #[must_use]
    pub fn options(&self) -> &ProviderOptions {
        &self.options
    }

    /// Returns the tile at `index`, rendering its metatile when neither cached nor stored.
    pub fn get_tile(&self, index: &TileIndex) -> MasonCoreResult<Tile> {
        let tag = &self.options.tag;
        if let Some(tile) = self.cache.get(tag, index)? {
            return Ok(tile);
        }
        let meta = MetaTileIndex::new(index.z(), index.x(), index.y(), self.options.stride)?;
        let lock_index = meta.anchor();

        for _ in 0..=self.options.lock_retries {
            if let Some(cluster) = self.storage.get(&meta)? {
                debug!("Refilling cache from stored metatile {meta}");
                return self.refill(cluster, index);
            }

            let token = self.cache.lock(tag, &lock_index, self.options.lock_ttl)?;
            if token != 0 {
                let rendered = self.render(&meta);
                self.cache.unlock(tag, &lock_index, token)?;
                return self.refill(rendered?, index);
            }

            thread::sleep(self.options.retry_delay);
            if let Some(tile) = self.cache.get(tag, index)? {
                return Ok(tile);
            }
        }

        warn!("Metatile {meta} was not rendered by the lock holder in time");
        Err(CacheError::LockTimeout(lock_index.to_string(), self.options.lock_retries + 1).into())
    }

    /// Renders and stores a metatile. Must be called holding its lock.
    fn render(&self, meta: &MetaTileIndex) -> MasonCoreResult<TileCluster> {
        // the previous holder may have finished between our storage read and lock
        if let Some(cluster) = self.storage.get(meta)? {
            return Ok(cluster);
        }
        debug!("Rendering metatile {meta}");
        let metatile = self
            .renderer
            .render(meta)
            .map_err(MasonCoreError::RenderError)?;
        let cluster = TileCluster::from_metatile(&metatile, self.splitter.as_ref())?;
        self.storage.put(&metatile)?;
        Ok(cluster)
    }

    /// Caches every tile of `cluster` and picks the one at `index`.
    fn refill(&self, cluster: TileCluster, index: &TileIndex) -> MasonCoreResult<Tile> {
        self.cache
            .put_multi(&self.options.tag, cluster.tiles(), self.options.cache_ttl)?;
        let meta = *cluster.index();
        cluster
            .into_tiles()
            .into_iter()
            .find(|tile| tile.index() == index)
            .ok_or_else(|| ClusterError::IncompleteCluster(meta).into())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tempfile::TempDir;

    use super::*;
    use crate::ErrorKind;
    use crate::cache::{MemoryClient, SharedTileCache, TileCache as _};
    use crate::storage::{
        Clusterifier, DiskBackend, MetaTileSerializer, StorageEngine, StorageOptions,
    };
    use crate::tiles::tests::{ChunkSplitter, metatile};

    /// Renders `stride²` byte payloads, one distinct byte per tile, and counts its calls.
    #[derive(Debug, Default)]
    struct CountingRenderer {
        calls: Arc<AtomicUsize>,
        delay: Duration,
        fail: bool,
    }

    impl MetaTileRenderer for CountingRenderer {
        fn render(&self, index: &MetaTileIndex) -> Result<MetaTile, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            if self.fail {
                return Err("renderer crashed".into());
            }
            let count = index.stride() * index.stride();
            let data: Vec<u8> = (0..count).map(|i| u8::try_from(i).unwrap()).collect();
            Ok(metatile(
                index.z(),
                index.x(),
                index.y(),
                index.stride(),
                &data,
            ))
        }
    }

    fn options() -> ProviderOptions {
        ProviderOptions {
            tag: "osm".to_string(),
            stride: 2,
            lock_retries: 200,
            retry_delay: Duration::from_millis(5),
            ..ProviderOptions::default()
        }
    }

    fn provider(
        dir: &TempDir,
        client: &MemoryClient,
        renderer: CountingRenderer,
        options: ProviderOptions,
    ) -> TileProvider {
        let engine = StorageEngine::<MetaTile>::new(
            Box::new(DiskBackend::new(dir.path())),
            Box::new(MetaTileSerializer::new("image/png", 0)),
            StorageOptions {
                stride: options.stride,
                ..StorageOptions::default()
            },
        );
        TileProvider::new(
            Box::new(Clusterifier::new(Box::new(engine), Arc::new(ChunkSplitter))),
            Box::new(SharedTileCache::new(Box::new(client.clone()))),
            Box::new(renderer),
            Arc::new(ChunkSplitter),
            options,
        )
    }

    fn tile_index(z: u8, x: u32, y: u32) -> TileIndex {
        TileIndex::new(z, x, y).unwrap()
    }

    #[test]
    fn test_render_once_then_cache() {
        let dir = tempfile::tempdir().unwrap();
        let client = MemoryClient::default();
        let renderer = CountingRenderer::default();
        let calls = renderer.calls.clone();
        let provider = provider(&dir, &client, renderer, options());

        let tile = provider.get_tile(&tile_index(4, 3, 2)).unwrap();
        // column 1, row 0 of the metatile anchored at 4/2/2
        assert_eq!(tile.data(), [1_u8]);
        assert_eq!(tile.mimetype(), "image/png");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let tile = provider.get_tile(&tile_index(4, 2, 3)).unwrap();
        assert_eq!(tile.data(), [2_u8]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let cache = SharedTileCache::new(Box::new(client));
        let block: Vec<_> = MetaTileIndex::new(4, 2, 2, 2).unwrap().fission().collect();
        assert!(cache.has_all("osm", &block).unwrap());
    }

    #[test]
    fn test_refill_from_storage() {
        let dir = tempfile::tempdir().unwrap();
        let client = MemoryClient::default();
        let renderer = CountingRenderer::default();
        let calls = renderer.calls.clone();
        let provider = provider(&dir, &client, renderer, options());

        provider.get_tile(&tile_index(4, 3, 3)).unwrap();
        SharedTileCache::new(Box::new(client)).flush().unwrap();

        let tile = provider.get_tile(&tile_index(4, 3, 3)).unwrap();
        assert_eq!(tile.data(), [3_u8]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_world_tile_below_stride() {
        let dir = tempfile::tempdir().unwrap();
        let client = MemoryClient::default();
        let renderer = CountingRenderer::default();
        let calls = renderer.calls.clone();
        let provider = provider(&dir, &client, renderer, options());

        let tile = provider.get_tile(&tile_index(0, 0, 0)).unwrap();
        assert_eq!(tile.data(), [0_u8]);
        assert!(dir.path().join("00/0-0-0@1.png").is_file());

        SharedTileCache::new(Box::new(client)).flush().unwrap();
        let tile = provider.get_tile(&tile_index(0, 0, 0)).unwrap();
        assert_eq!(tile.index(), &tile_index(0, 0, 0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_requests_render_once() {
        let dir = tempfile::tempdir().unwrap();
        let client = MemoryClient::default();
        let renderer = CountingRenderer {
            delay: Duration::from_millis(50),
            ..CountingRenderer::default()
        };
        let calls = renderer.calls.clone();
        let provider = provider(&dir, &client, renderer, options());

        thread::scope(|s| {
            for (x, y) in [(8, 8), (9, 8), (8, 9), (9, 9), (8, 8), (9, 9)] {
                let provider = &provider;
                s.spawn(move || {
                    let tile = provider.get_tile(&tile_index(5, x, y)).unwrap();
                    assert_eq!(tile.index(), &tile_index(5, x, y));
                });
            }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_render_failure_releases_lock() {
        let dir = tempfile::tempdir().unwrap();
        let client = MemoryClient::default();
        let renderer = CountingRenderer {
            fail: true,
            ..CountingRenderer::default()
        };
        let provider = provider(&dir, &client, renderer, options());

        let err = provider.get_tile(&tile_index(3, 0, 0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Renderer);

        let cache = SharedTileCache::new(Box::new(client));
        assert_ne!(cache.lock("osm", &tile_index(3, 0, 0), 10).unwrap(), 0);
    }

    #[test]
    fn test_lock_held_elsewhere() {
        let dir = tempfile::tempdir().unwrap();
        let client = MemoryClient::default();
        let cache = SharedTileCache::new(Box::new(client.clone()));
        assert_ne!(cache.lock("osm", &tile_index(3, 2, 2), 60).unwrap(), 0);

        let renderer = CountingRenderer::default();
        let calls = renderer.calls.clone();
        let options = ProviderOptions {
            lock_retries: 2,
            retry_delay: Duration::from_millis(1),
            ..options()
        };
        let provider = provider(&dir, &client, renderer, options);

        let err = provider.get_tile(&tile_index(3, 3, 3)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
