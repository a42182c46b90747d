use std::collections::HashMap;

use mason_tile_utils::{MetaTileIndex, TileIndex};

use crate::tiles::{ClusterError, ClusterResult, MetaTile, Splitter, Tile};

/// The tiles of one metatile, in [`MetaTileIndex::fission`] order.
///
/// Every tile shares the cluster's mimetype and modification time.
#[derive(Debug, Clone, PartialEq)]
pub struct TileCluster {
    index: MetaTileIndex,
    tiles: Vec<Tile>,
}

impl TileCluster {
    /// Splits a metatile into its tiles.
    ///
    /// The buffer margin is removed, and every tile inherits the metatile's mimetype
    /// and modification time with an etag of its own data.
    pub fn from_metatile(metatile: &MetaTile, splitter: &dyn Splitter) -> ClusterResult<Self> {
        let index = *metatile.index();
        let stride = index.stride();
        let expected = (stride * stride) as usize;

        let mut parts: HashMap<_, _> = splitter
            .split(metatile.data(), stride, metatile.buffer())?
            .into_iter()
            .collect();
        if parts.len() != expected {
            return Err(ClusterError::SplitCount(index, parts.len(), expected));
        }

        let tiles = index
            .fission()
            .map(|tile| {
                let row = tile.y() - index.y();
                let col = tile.x() - index.x();
                let data = parts
                    .remove(&(row, col))
                    .ok_or(ClusterError::MissingSplit(index, row, col))?;
                Ok(Tile::new(tile, data, metatile.mimetype()).with_mtime(metatile.mtime()))
            })
            .collect::<ClusterResult<_>>()?;

        Ok(Self { index, tiles })
    }

    /// Assembles a cluster from loose tiles, which must cover `index` exactly once each.
    pub(crate) fn from_tiles(index: MetaTileIndex, tiles: Vec<Tile>) -> ClusterResult<Self> {
        let expected = (index.stride() * index.stride()) as usize;
        let mut by_index: HashMap<TileIndex, Tile> =
            tiles.into_iter().map(|t| (*t.index(), t)).collect();
        if by_index.len() != expected {
            return Err(ClusterError::IncompleteCluster(index));
        }
        let tiles = index
            .fission()
            .map(|t| by_index.remove(&t))
            .collect::<Option<Vec<_>>>()
            .ok_or(ClusterError::IncompleteCluster(index))?;
        Ok(Self { index, tiles })
    }

    /// The metatile the tiles were cut from.
    #[must_use]
    pub fn index(&self) -> &MetaTileIndex {
        &self.index
    }

    /// Tiles in fission order.
    #[must_use]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Takes the tiles, in fission order.
    #[must_use]
    pub fn into_tiles(self) -> Vec<Tile> {
        self.tiles
    }

    /// Looks up a single tile of the cluster.
    #[must_use]
    pub fn get(&self, index: &TileIndex) -> Option<&Tile> {
        self.tiles.iter().find(|t| t.index() == index)
    }

    /// Mimetype shared by all tiles.
    #[must_use]
    pub fn mimetype(&self) -> &str {
        self.tiles.first().map_or("", Tile::mimetype)
    }

    /// Modification time shared by all tiles.
    #[must_use]
    pub fn mtime(&self) -> f64 {
        self.tiles.first().map_or(0.0, Tile::mtime)
    }
}
