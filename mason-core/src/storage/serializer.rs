use std::fmt::Debug;

use mason_tile_utils::{MetaTileIndex, TileData, TileFormat};

use crate::storage::{ObjectMetadata, StorageResult};
use crate::tiles::{BoxedSplitter, ClusterMetadata, MetaTile, TileCluster, content_etag};

/// Converts metatiles into stored blobs, and stored blobs into `T`.
pub trait Serializer<T>: Send + Sync + Debug {
    /// Extension used when none is configured, including the leading dot.
    fn default_extension(&self) -> String;

    /// Encodes a metatile for storage.
    fn dump(&self, metatile: &MetaTile) -> StorageResult<(TileData, ObjectMetadata)>;

    /// Decodes a stored blob.
    fn load(&self, index: &MetaTileIndex, blob: TileData, metadata: ObjectMetadata)
    -> StorageResult<T>;
}

/// Stores metatiles as their raw payload.
#[derive(Clone, Debug)]
pub struct MetaTileSerializer {
    mimetype: String,
    buffer: u32,
}

impl MetaTileSerializer {
    /// `mimetype` and `buffer` are used for stored objects that carry no metadata of
    /// their own.
    #[must_use]
    pub fn new(mimetype: impl Into<String>, buffer: u32) -> Self {
        Self {
            mimetype: mimetype.into(),
            buffer,
        }
    }
}

impl Serializer<MetaTile> for MetaTileSerializer {
    fn default_extension(&self) -> String {
        TileFormat::from_content_type(&self.mimetype)
            .map_or(".dat", |f| f.extension())
            .to_string()
    }

    fn dump(&self, metatile: &MetaTile) -> StorageResult<(TileData, ObjectMetadata)> {
        let metadata = ObjectMetadata {
            mimetype: Some(metatile.mimetype().to_string()),
            etag: Some(metatile.etag().to_string()),
            mtime: Some(metatile.mtime()),
        };
        Ok((metatile.data().to_vec(), metadata))
    }

    fn load(
        &self,
        index: &MetaTileIndex,
        blob: TileData,
        metadata: ObjectMetadata,
    ) -> StorageResult<MetaTile> {
        let mimetype = metadata.mimetype.unwrap_or_else(|| self.mimetype.clone());
        let mut metatile = MetaTile::new(*index, blob, mimetype).with_buffer(self.buffer);
        if let Some(mtime) = metadata.mtime {
            metatile = metatile.with_mtime(mtime);
        }
        if let Some(etag) = metadata.etag {
            metatile = metatile.with_etag(etag);
        }
        Ok(metatile)
    }
}

/// Stores metatiles split into a [`TileCluster`] zip archive.
#[derive(Clone, Debug)]
pub struct ClusterSerializer {
    splitter: BoxedSplitter,
    compressed: bool,
}

impl ClusterSerializer {
    /// `compressed` deflates the tile entries of the archive.
    #[must_use]
    pub fn new(splitter: BoxedSplitter, compressed: bool) -> Self {
        Self {
            splitter,
            compressed,
        }
    }
}

impl Serializer<TileCluster> for ClusterSerializer {
    fn default_extension(&self) -> String {
        TileFormat::Zip.extension().to_string()
    }

    fn dump(&self, metatile: &MetaTile) -> StorageResult<(TileData, ObjectMetadata)> {
        let cluster = TileCluster::from_metatile(metatile, self.splitter.as_ref())?;
        let blob = cluster.to_archive(self.compressed)?;
        let metadata = ObjectMetadata {
            mimetype: Some(TileFormat::Zip.content_type().to_string()),
            etag: Some(content_etag(&blob)),
            mtime: Some(metatile.mtime()),
        };
        Ok((blob, metadata))
    }

    fn load(
        &self,
        _index: &MetaTileIndex,
        blob: TileData,
        metadata: ObjectMetadata,
    ) -> StorageResult<TileCluster> {
        // the object mimetype describes the archive, tiles keep the manifest's
        let overrides = ClusterMetadata {
            mimetype: None,
            mtime: metadata.mtime,
        };
        Ok(TileCluster::from_archive(&blob, &overrides)?)
    }
}
