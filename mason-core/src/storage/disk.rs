use std::fs::{self, File};
use std::io::{ErrorKind as IoErrorKind, Read as _, Write as _};
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use mason_tile_utils::TileData;
use tempfile::NamedTempFile;
use tracing::{debug, trace};

use crate::storage::{ObjectMetadata, StorageBackend, StorageError, StorageResult};

/// Stores blobs as files below a root directory.
///
/// Writes go to a temporary file in the target directory which is renamed over the key,
/// so a reader never observes a partially written file.
#[derive(Clone, Debug)]
pub struct DiskBackend {
    root: PathBuf,
}

impl DiskBackend {
    /// Stores below `root`, which is created on the first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        debug!("Using disk storage at {}", root.display());
        Self { root }
    }

    /// Directory keys are resolved against.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a `/`-separated key onto a path below the root.
    fn path(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|part| !part.is_empty() && *part != "." && *part != "..")
            .fold(self.root.clone(), |path, part| path.join(part))
    }
}

impl StorageBackend for DiskBackend {
    fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.path(key);
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::IoError(e, path)),
        }
    }

    fn retrieve(&self, key: &str) -> StorageResult<Option<(TileData, ObjectMetadata)>> {
        let path = self.path(key);
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                trace!("No stored object at {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(StorageError::IoError(e, path)),
        };

        let mtime = file
            .metadata()
            .and_then(|m| m.modified())
            .map_err(|e| StorageError::IoError(e, path.clone()))?
            .duration_since(UNIX_EPOCH)
            .map_or(0.0, |d| d.as_secs_f64());
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| StorageError::IoError(e, path))?;

        Ok(Some((
            data,
            ObjectMetadata {
                mtime: Some(mtime),
                ..ObjectMetadata::default()
            },
        )))
    }

    fn store(&self, key: &str, blob: &[u8], metadata: &ObjectMetadata) -> StorageResult<()> {
        let path = self.path(key);
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir).map_err(|e| StorageError::IoError(e, dir.to_path_buf()))?;

        let mut tmp =
            NamedTempFile::new_in(dir).map_err(|e| StorageError::IoError(e, dir.to_path_buf()))?;
        tmp.write_all(blob)
            .and_then(|()| tmp.as_file().sync_data())
            .map_err(|e| StorageError::IoError(e, tmp.path().to_path_buf()))?;
        if let Some(mtime) = metadata
            .mtime
            .and_then(|m| Duration::try_from_secs_f64(m).ok())
        {
            tmp.as_file()
                .set_modified(UNIX_EPOCH + mtime)
                .map_err(|e| StorageError::IoError(e, tmp.path().to_path_buf()))?;
        }

        tmp.persist(&path)
            .map_err(|e| StorageError::IoError(e.error, path.clone()))?;
        trace!("Stored {} bytes at {}", blob.len(), path.display());
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::IoError(e, path)),
        }
    }
}
