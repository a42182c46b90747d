use std::fmt::Debug;

use mason_tile_utils::TileData;

use crate::storage::StorageResult;

/// Attributes stored next to a blob.
///
/// Backends keep what they can. The local disk keeps only the modification time, object
/// stores keep all three.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectMetadata {
    /// Content type of the blob.
    pub mimetype: Option<String>,
    /// Content hash of the payload.
    pub etag: Option<String>,
    /// Modification time in seconds since the Unix epoch.
    pub mtime: Option<f64>,
}

/// A flat key-value blob store addressed by `/`-separated keys.
pub trait StorageBackend: Send + Sync + Debug {
    /// Whether a blob is stored under `key`.
    fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Reads a blob, or `None` when absent.
    fn retrieve(&self, key: &str) -> StorageResult<Option<(TileData, ObjectMetadata)>>;

    /// Writes a blob so that readers see either the previous or the complete new value.
    fn store(&self, key: &str, blob: &[u8], metadata: &ObjectMetadata) -> StorageResult<()>;

    /// Deletes a blob. Deleting an absent key succeeds.
    fn delete(&self, key: &str) -> StorageResult<()>;

    /// Releases held resources.
    fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// A boxed [`StorageBackend`] trait object.
pub type BoxedBackend = Box<dyn StorageBackend>;
