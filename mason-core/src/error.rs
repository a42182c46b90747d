use mason_tile_utils::TileIndexError;

use crate::cache::CacheError;
use crate::config::ConfigError;
use crate::storage::StorageError;
use crate::tiles::ClusterError;

/// Coarse classification of every error raised by this crate.
///
/// Callers that only need to decide between retrying, reporting a bad request or
/// reconfiguring can match on this instead of the individual error enums.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A tile or metatile address is out of range, or not configured for a storage.
    InvalidIndex,
    /// A metatile's mimetype differs from the one its storage was configured with.
    MimetypeMismatch,
    /// A write or delete was attempted on read-only storage.
    ReadOnly,
    /// A stored cluster archive or manifest is unreadable or inconsistent.
    ArchiveCorrupt,
    /// Tile data could not be decoded or split.
    InvalidData,
    /// A storage or cache backend failed or could not be reached.
    BackendUnavailable,
    /// A backend call did not complete in time.
    Timeout,
    /// A cache tag does not match the allowed pattern.
    InvalidTag,
    /// The configuration is malformed or refers to a disabled feature.
    InvalidConfig,
    /// The metatile renderer failed.
    Renderer,
}

/// Any error produced by this crate.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum MasonCoreError {
    /// Invalid tile or metatile address.
    #[error(transparent)]
    IndexError(#[from] TileIndexError),

    /// Errors from splitting metatiles or reading cluster archives.
    #[error(transparent)]
    ClusterError(#[from] ClusterError),

    /// Errors from durable storage.
    #[error(transparent)]
    StorageError(#[from] StorageError),

    /// Errors from the tile cache.
    #[error(transparent)]
    CacheError(#[from] CacheError),

    /// Errors from configuration loading.
    #[error(transparent)]
    ConfigError(#[from] ConfigError),

    /// Errors raised by a [`MetaTileRenderer`](crate::MetaTileRenderer).
    #[error("Unable to render metatile: {0}")]
    RenderError(#[source] crate::RenderError),
}

impl MasonCoreError {
    /// Classifies the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::IndexError(_) => ErrorKind::InvalidIndex,
            Self::ClusterError(e) => e.kind(),
            Self::StorageError(e) => e.kind(),
            Self::CacheError(e) => e.kind(),
            Self::ConfigError(e) => e.kind(),
            Self::RenderError(_) => ErrorKind::Renderer,
        }
    }
}

/// A convenience [`Result`] for this crate.
pub type MasonCoreResult<T> = Result<T, MasonCoreError>;
