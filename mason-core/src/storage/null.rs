use mason_tile_utils::MetaTileIndex;

use crate::storage::{ClusterStorage, MetaTileStorage, StorageResult};
use crate::tiles::{MetaTile, TileCluster};

/// Storage that keeps nothing: every read misses and every write is dropped.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullStorage;

impl MetaTileStorage for NullStorage {
    fn get(&self, _index: &MetaTileIndex) -> StorageResult<Option<MetaTile>> {
        Ok(None)
    }

    fn put(&self, _metatile: &MetaTile) -> StorageResult<()> {
        Ok(())
    }

    fn has(&self, _index: &MetaTileIndex) -> StorageResult<bool> {
        Ok(false)
    }

    fn retire(&self, _index: &MetaTileIndex) -> StorageResult<()> {
        Ok(())
    }

    fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

impl ClusterStorage for NullStorage {
    fn get(&self, _index: &MetaTileIndex) -> StorageResult<Option<TileCluster>> {
        Ok(None)
    }

    fn put(&self, _metatile: &MetaTile) -> StorageResult<()> {
        Ok(())
    }

    fn has(&self, _index: &MetaTileIndex) -> StorageResult<bool> {
        Ok(false)
    }

    fn retire(&self, _index: &MetaTileIndex) -> StorageResult<()> {
        Ok(())
    }

    fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}
