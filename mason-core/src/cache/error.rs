#[cfg(feature = "memcache")]
use std::io::ErrorKind as IoErrorKind;

use crate::ErrorKind;

/// Errors raised by tile caches.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    /// The tag does not match `^[A-Za-z][A-Za-z0-9_%-]+$`.
    #[error("Invalid cache tag {0:?}: tags start with a letter, followed by letters, digits, '_', '%' or '-'")]
    InvalidTag(String),

    /// Cached tile metadata could not be decoded.
    #[error("Unable to decode cached metadata {0}: {1}")]
    MetadataError(String, #[source] serde_json::Error),

    /// Waiting for another worker's render lock took too long.
    #[error("Gave up waiting for render lock {0} after {1} attempts")]
    LockTimeout(String, u32),

    /// The memcache client failed.
    #[cfg(feature = "memcache")]
    #[error("Memcache request failed: {0}")]
    MemcacheError(#[from] memcache::MemcacheError),
}

impl CacheError {
    /// Classifies the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidTag(_) => ErrorKind::InvalidTag,
            Self::MetadataError(..) => ErrorKind::BackendUnavailable,
            Self::LockTimeout(..) => ErrorKind::Timeout,
            #[cfg(feature = "memcache")]
            Self::MemcacheError(memcache::MemcacheError::IOError(e))
                if matches!(
                    e.kind(),
                    IoErrorKind::TimedOut | IoErrorKind::WouldBlock
                ) =>
            {
                ErrorKind::Timeout
            }
            #[cfg(feature = "memcache")]
            Self::MemcacheError(_) => ErrorKind::BackendUnavailable,
        }
    }
}

/// A convenience [`Result`] for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
