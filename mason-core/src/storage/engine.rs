use mason_tile_utils::{MetaTileIndex, decode_gzip, encode_gzip};
use tracing::{debug, info, trace};

use crate::storage::{
    BoxedBackend, ClusterStorage, MetaTileStorage, Serializer, StorageError, StorageOptions,
    StorageResult,
};
use crate::tiles::{MetaTile, TileCluster};

/// Persists metatiles through a [`Serializer`] into a [`StorageBackend`](crate::storage::StorageBackend).
///
/// `StorageEngine<MetaTile>` is a [`MetaTileStorage`], `StorageEngine<TileCluster>` a
/// [`ClusterStorage`].
#[derive(Debug)]
pub struct StorageEngine<T> {
    backend: BoxedBackend,
    serializer: Box<dyn Serializer<T>>,
    options: StorageOptions,
    extension: String,
}

impl<T> StorageEngine<T> {
    /// Creates an engine. The extension defaults to the serializer's.
    #[must_use]
    pub fn new(
        backend: BoxedBackend,
        serializer: Box<dyn Serializer<T>>,
        options: StorageOptions,
    ) -> Self {
        let mut extension = options
            .extension
            .clone()
            .unwrap_or_else(|| serializer.default_extension());
        if options.gzip && !extension.ends_with(".gz") {
            extension.push_str(".gz");
        }
        info!(
            "Storing {} metatiles of stride {} as {}/*{extension}{}",
            options.mimetype,
            options.stride,
            options.prefix,
            if options.readonly { " (read only)" } else { "" },
        );
        Self {
            backend,
            serializer,
            options,
            extension,
        }
    }

    /// Settings the engine validates against.
    #[must_use]
    pub fn options(&self) -> &StorageOptions {
        &self.options
    }

    /// Extension of stored objects, including `.gz` when gzipped.
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Storage key of a metatile.
    #[must_use]
    pub fn key(&self, index: &MetaTileIndex) -> String {
        self.options
            .mode
            .derive_key(&self.options.prefix, index, &self.extension)
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.options.readonly {
            Err(StorageError::ReadOnly)
        } else {
            Ok(())
        }
    }

    /// Validation order: read-only, level, stride, then mimetype.
    fn check_metatile(&self, metatile: &MetaTile) -> StorageResult<()> {
        self.check_writable()?;
        let index = metatile.index();
        if !self.options.levels.contains(&index.z()) {
            return Err(StorageError::LevelNotConfigured(index.z()));
        }
        // shallow levels hold fewer tiles than a full metatile
        let stride = self.options.stride.min(1 << index.z());
        if index.stride() != stride {
            return Err(StorageError::StrideMismatch(stride, index.stride()));
        }
        if metatile.mimetype() != self.options.mimetype {
            return Err(StorageError::MimetypeMismatch(
                self.options.mimetype.clone(),
                metatile.mimetype().to_string(),
            ));
        }
        Ok(())
    }

    /// Validates and writes a metatile, replacing any stored one.
    pub fn put(&self, metatile: &MetaTile) -> StorageResult<()> {
        self.check_metatile(metatile)?;
        let key = self.key(metatile.index());
        let (mut blob, metadata) = self.serializer.dump(metatile)?;
        if self.options.gzip {
            blob = encode_gzip(&blob).map_err(|e| StorageError::GzipError(e, key.clone()))?;
        }
        debug!("Storing {} as {key}", metatile.index());
        self.backend.store(&key, &blob, &metadata)
    }

    /// Reads and decodes a stored object, `None` when absent.
    pub fn get(&self, index: &MetaTileIndex) -> StorageResult<Option<T>> {
        let key = self.key(index);
        let Some((mut blob, metadata)) = self.backend.retrieve(&key)? else {
            trace!("Storage miss for {index} at {key}");
            return Ok(None);
        };
        if self.options.gzip {
            blob = decode_gzip(&blob).map_err(|e| StorageError::GzipError(e, key.clone()))?;
        }
        self.serializer.load(index, blob, metadata).map(Some)
    }

    /// Whether an object is stored for `index`.
    pub fn has(&self, index: &MetaTileIndex) -> StorageResult<bool> {
        self.backend.exists(&self.key(index))
    }

    /// Deletes the object of `index`. Deleting an absent object succeeds.
    pub fn retire(&self, index: &MetaTileIndex) -> StorageResult<()> {
        self.check_writable()?;
        let key = self.key(index);
        debug!("Retiring {index} at {key}");
        self.backend.delete(&key)
    }

    /// Releases the backend.
    pub fn close(&self) -> StorageResult<()> {
        self.backend.close()
    }
}

impl MetaTileStorage for StorageEngine<MetaTile> {
    fn get(&self, index: &MetaTileIndex) -> StorageResult<Option<MetaTile>> {
        Self::get(self, index)
    }

    fn put(&self, metatile: &MetaTile) -> StorageResult<()> {
        Self::put(self, metatile)
    }

    fn has(&self, index: &MetaTileIndex) -> StorageResult<bool> {
        Self::has(self, index)
    }

    fn retire(&self, index: &MetaTileIndex) -> StorageResult<()> {
        Self::retire(self, index)
    }

    fn close(&self) -> StorageResult<()> {
        Self::close(self)
    }
}

impl ClusterStorage for StorageEngine<TileCluster> {
    fn get(&self, index: &MetaTileIndex) -> StorageResult<Option<TileCluster>> {
        Self::get(self, index)
    }

    fn put(&self, metatile: &MetaTile) -> StorageResult<()> {
        Self::put(self, metatile)
    }

    fn has(&self, index: &MetaTileIndex) -> StorageResult<bool> {
        Self::has(self, index)
    }

    fn retire(&self, index: &MetaTileIndex) -> StorageResult<()> {
        Self::retire(self, index)
    }

    fn close(&self) -> StorageResult<()> {
        Self::close(self)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::path::Path;

    use approx::assert_relative_eq;
    use rstest::rstest;

    use super::*;
    use crate::ErrorKind;
    use crate::storage::{DiskBackend, MetaTileSerializer};
    use crate::tiles::tests::metatile;

    fn engine(dir: &Path, options: StorageOptions) -> StorageEngine<MetaTile> {
        StorageEngine::new(
            Box::new(DiskBackend::new(dir)),
            Box::new(MetaTileSerializer::new("image/png", 0)),
            options,
        )
    }

    fn options() -> StorageOptions {
        StorageOptions {
            levels: BTreeSet::from([4, 5]),
            stride: 2,
            prefix: "theme".to_string(),
            ..StorageOptions::default()
        }
    }

    #[test]
    fn test_put_get_retire() {
        let dir = tempfile::tempdir().unwrap();
        let storage = engine(dir.path(), options());
        let meta = metatile(4, 2, 6, 2, b"four");

        assert!(!storage.has(meta.index()).unwrap());
        storage.put(&meta).unwrap();
        assert!(storage.has(meta.index()).unwrap());
        assert!(dir.path().join("theme/04/4-2-6@2.png").is_file());

        let loaded = storage.get(meta.index()).unwrap().unwrap();
        assert_eq!(loaded.data(), meta.data());
        assert_eq!(loaded.etag(), meta.etag());
        assert_relative_eq!(loaded.mtime(), meta.mtime(), epsilon = 1e-3);

        storage.retire(meta.index()).unwrap();
        assert!(storage.get(meta.index()).unwrap().is_none());
    }

    #[test]
    fn test_gzip_extension_appended_once() {
        let dir = tempfile::tempdir().unwrap();
        let storage = engine(
            dir.path(),
            StorageOptions {
                gzip: true,
                ..options()
            },
        );
        assert_eq!(storage.extension(), ".png.gz");

        let meta = metatile(4, 2, 6, 2, b"compress me");
        storage.put(&meta).unwrap();
        let raw = std::fs::read(dir.path().join("theme/04/4-2-6@2.png.gz")).unwrap();
        assert_eq!(decode_gzip(&raw).unwrap(), b"compress me");
        assert_eq!(storage.get(meta.index()).unwrap().unwrap().data(), b"compress me");

        let storage = engine(
            dir.path(),
            StorageOptions {
                gzip: true,
                extension: Some(".bin.gz".to_string()),
                ..options()
            },
        );
        assert_eq!(storage.extension(), ".bin.gz");
    }

    #[rstest]
    #[case::readonly(StorageOptions { readonly: true, levels: BTreeSet::new(), ..options() }, ErrorKind::ReadOnly)]
    #[case::level(StorageOptions { levels: BTreeSet::from([5]), stride: 4, ..options() }, ErrorKind::InvalidIndex)]
    #[case::stride(StorageOptions { stride: 4, mimetype: "image/jpeg".to_string(), ..options() }, ErrorKind::InvalidIndex)]
    #[case::mimetype(StorageOptions { mimetype: "image/jpeg".to_string(), ..options() }, ErrorKind::MimetypeMismatch)]
    fn test_put_validation_order(#[case] options: StorageOptions, #[case] kind: ErrorKind) {
        let dir = tempfile::tempdir().unwrap();
        let storage = engine(dir.path(), options);
        let err = storage.put(&metatile(4, 2, 6, 2, b"four")).unwrap_err();
        assert_eq!(err.kind(), kind, "{err}");
        assert!(!storage.has(&MetaTileIndex::new(4, 2, 6, 2).unwrap()).unwrap());
    }

    #[rstest]
    #[case::world(0, 1)]
    #[case::quadrants(1, 2)]
    fn test_shallow_levels_use_clamped_stride(#[case] z: u8, #[case] stride: u32) {
        let dir = tempfile::tempdir().unwrap();
        let storage = engine(
            dir.path(),
            StorageOptions {
                levels: BTreeSet::from([0, 1, 2]),
                stride: 4,
                ..options()
            },
        );
        let meta = metatile(z, 0, 0, 4, b"world");
        assert_eq!(meta.index().stride(), stride);
        storage.put(&meta).unwrap();
        assert_eq!(storage.get(meta.index()).unwrap().unwrap().data(), b"world");

        let full = MetaTileIndex::new(2, 0, 0, 2).unwrap();
        let err = storage
            .put(&MetaTile::new(full, b"half".to_vec(), "image/png"))
            .unwrap_err();
        assert!(matches!(err, StorageError::StrideMismatch(4, 2)), "{err}");
    }

    #[test]
    fn test_readonly_rejects_retire() {
        let dir = tempfile::tempdir().unwrap();
        let storage = engine(
            dir.path(),
            StorageOptions {
                readonly: true,
                ..options()
            },
        );
        let err = storage
            .retire(&MetaTileIndex::new(4, 0, 0, 2).unwrap())
            .unwrap_err();
        assert!(matches!(err, StorageError::ReadOnly));
    }
}
