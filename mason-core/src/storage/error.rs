use std::io;
use std::path::PathBuf;
use std::time::Duration;

use mason_tile_utils::TileIndexError;

use crate::ErrorKind;
use crate::tiles::ClusterError;

/// Errors raised by metatile and cluster storage.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    /// Writes and deletes are rejected on read-only storage.
    #[error("Storage is read only")]
    ReadOnly,

    /// The metatile's level is not in the configured level set.
    #[error("Level {0} is not configured for this storage")]
    LevelNotConfigured(u8),

    /// The metatile's stride differs from the configured stride.
    #[error("Metatile stride {1} does not match the configured stride {0}")]
    StrideMismatch(u32, u32),

    /// The metatile's mimetype differs from the configured mimetype.
    #[error("Metatile mimetype {1} does not match the configured mimetype {0}")]
    MimetypeMismatch(String, String),

    /// Invalid tile or metatile address.
    #[error(transparent)]
    IndexError(#[from] TileIndexError),

    /// Splitting a metatile or decoding a cluster archive failed.
    #[error(transparent)]
    ClusterError(#[from] ClusterError),

    /// A stored blob could not be gunzipped.
    #[error("Unable to decompress stored object {1}: {0}")]
    GzipError(#[source] io::Error, String),

    /// Filesystem access failed.
    #[error("IO error {0}: {1}")]
    IoError(#[source] io::Error, PathBuf),

    /// The object store rejected a request.
    #[cfg(feature = "s3")]
    #[error("Object storage request for {1} failed: {0}")]
    ObjectStoreError(#[source] object_store::Error, String),

    /// The runtime driving object storage requests could not be created.
    #[error("Unable to start the object storage runtime: {0}")]
    RuntimeError(#[source] io::Error),

    /// A backend call exceeded its timeout.
    #[error("Request for {1} timed out after {0:?}")]
    Timeout(Duration, String),
}

impl StorageError {
    /// Classifies the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ReadOnly => ErrorKind::ReadOnly,
            Self::LevelNotConfigured(_) | Self::StrideMismatch(..) | Self::IndexError(_) => {
                ErrorKind::InvalidIndex
            }
            Self::MimetypeMismatch(..) => ErrorKind::MimetypeMismatch,
            Self::ClusterError(e) => e.kind(),
            Self::GzipError(..) => ErrorKind::ArchiveCorrupt,
            Self::IoError(e, _) if e.kind() == io::ErrorKind::TimedOut => ErrorKind::Timeout,
            Self::IoError(..) | Self::RuntimeError(_) => ErrorKind::BackendUnavailable,
            #[cfg(feature = "s3")]
            Self::ObjectStoreError(..) => ErrorKind::BackendUnavailable,
            Self::Timeout(..) => ErrorKind::Timeout,
        }
    }
}

/// A convenience [`Result`] for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
