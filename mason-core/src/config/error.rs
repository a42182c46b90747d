use std::path::PathBuf;

use crate::ErrorKind;
use crate::cache::CacheError;
use crate::storage::StorageError;

/// Errors raised while loading configuration or building components from it.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Unable to load config file {1}: {0}")]
    ConfigLoadError(#[source] std::io::Error, PathBuf),

    /// The configuration is not valid YAML of the expected shape.
    #[error("Unable to parse config file {1}: {0}")]
    ConfigParseError(#[source] serde_yaml::Error, PathBuf),

    /// A key required by the chosen prototype is missing.
    #[error("The {0} prototype requires the '{1}' setting")]
    MissingSetting(&'static str, &'static str),

    /// The chosen prototype needs a crate feature that is not compiled in.
    #[error("The {0} prototype requires the '{1}' feature of mason-core")]
    FeatureDisabled(&'static str, &'static str),

    /// Cluster storage needs a splitter for the configured mimetype.
    #[error("Tiles of mimetype {0} cannot be split into clusters")]
    NoSplitter(String),

    /// Cluster-format storage holds archives, not whole metatiles.
    #[error("Storage in cluster format cannot serve whole metatiles")]
    NotMetaTileStorage,

    /// The configured stride is not a power of two.
    #[error("Configured stride {0} is not a power of two")]
    InvalidStride(u32),

    /// Building the storage backend failed.
    #[error(transparent)]
    StorageError(#[from] StorageError),

    /// Connecting to the cache failed.
    #[error(transparent)]
    CacheError(#[from] CacheError),
}

impl ConfigError {
    /// Classifies the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::StorageError(e) => e.kind(),
            Self::CacheError(e) => e.kind(),
            _ => ErrorKind::InvalidConfig,
        }
    }
}

/// A convenience [`Result`] for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
