use mason_tile_utils::MetaTileIndex;

use crate::storage::{BoxedMetaTileStorage, ClusterStorage, StorageResult};
use crate::tiles::{BoxedSplitter, MetaTile, TileCluster};

/// Serves clusters from a storage holding whole metatiles, splitting them on read.
#[derive(Debug)]
pub struct Clusterifier {
    storage: BoxedMetaTileStorage,
    splitter: BoxedSplitter,
}

impl Clusterifier {
    /// Splits what `storage` returns with `splitter`.
    #[must_use]
    pub fn new(storage: BoxedMetaTileStorage, splitter: BoxedSplitter) -> Self {
        Self { storage, splitter }
    }
}

impl ClusterStorage for Clusterifier {
    fn get(&self, index: &MetaTileIndex) -> StorageResult<Option<TileCluster>> {
        let Some(metatile) = self.storage.get(index)? else {
            return Ok(None);
        };
        Ok(Some(TileCluster::from_metatile(
            &metatile,
            self.splitter.as_ref(),
        )?))
    }

    fn put(&self, metatile: &MetaTile) -> StorageResult<()> {
        self.storage.put(metatile)
    }

    fn has(&self, index: &MetaTileIndex) -> StorageResult<bool> {
        self.storage.has(index)
    }

    fn retire(&self, index: &MetaTileIndex) -> StorageResult<()> {
        self.storage.retire(index)
    }

    fn close(&self) -> StorageResult<()> {
        self.storage.close()
    }
}
