use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{ConfigError, ConfigResult};
use crate::storage::{
    BoxedBackend, BoxedClusterStorage, BoxedMetaTileStorage, ClusterSerializer, Clusterifier,
    DiskBackend, KeyMode, MetaTileSerializer, NullStorage, ObjectPolicy, StorageClass,
    StorageEngine, StorageOptions,
};
#[cfg(feature = "s3")]
use crate::storage::{S3Backend, S3Options};
use crate::tiles::{BoxedSplitter, MetaTile, TileCluster, splitter_for};

/// Storage backend selected by the `prototype` key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoragePrototype {
    /// Files below `root`.
    Disk,
    /// Objects in an S3 compatible `bucket`.
    S3,
    /// Nothing is stored.
    Null,
}

/// What a stored object holds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageFormat {
    /// The whole metatile payload, split on every read.
    #[default]
    MetaTile,
    /// A zip archive of the already split tiles.
    Cluster,
}

/// Storage section of the configuration file.
///
/// ```yaml
/// prototype: disk
/// root: /var/lib/tiles
/// prefix: osm
/// stride: 4
/// levels: [0, 1, 2, 3, 4, 5, 6, 7, 8]
/// format: cluster
/// compressed: true
/// ```
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Backend, one of `disk`, `s3` or `null`.
    pub prototype: StoragePrototype,

    /// Zoom levels accepted for writing, `0..=22` by default.
    #[serde(default = "default_levels")]
    pub levels: BTreeSet<u8>,
    /// Metatile stride, a power of two.
    #[serde(default = "default_stride")]
    pub stride: u32,
    /// The only mimetype accepted for writing.
    #[serde(default = "default_mimetype")]
    pub mimetype: String,
    /// Object extension including the dot, derived from `mimetype` or `format` when unset.
    pub extension: Option<String>,
    /// Key prefix, e.g. a theme name.
    #[serde(default)]
    pub prefix: String,
    /// Reject writes and deletes.
    #[serde(default)]
    pub readonly: bool,
    /// Gzip stored objects.
    #[serde(default)]
    pub gzip: bool,
    /// Directory layout of storage keys, `hilbert` when unset.
    #[serde(default)]
    pub mode: KeyMode,
    /// Whether metatiles are stored as is or as cluster archives.
    #[serde(default)]
    pub format: StorageFormat,
    /// Deflate tiles inside cluster archives.
    #[serde(default)]
    pub compressed: bool,
    /// Pixel margin around rendered metatiles.
    #[serde(default)]
    pub buffer: u32,

    /// Root directory of `disk` storage.
    pub root: Option<PathBuf>,

    /// Bucket of `s3` storage.
    pub bucket: Option<String>,
    /// Region of `s3` storage.
    pub region: Option<String>,
    /// Custom endpoint for S3 compatible services.
    pub endpoint: Option<String>,
    /// Canned ACL of written objects.
    #[serde(default)]
    pub policy: ObjectPolicy,
    /// Storage class of written objects.
    #[serde(default)]
    pub storage_class: StorageClass,
    /// Time limit for each object storage request, e.g. `10s`.
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

fn default_levels() -> BTreeSet<u8> {
    StorageOptions::default().levels
}

fn default_stride() -> u32 {
    1
}

fn default_mimetype() -> String {
    StorageOptions::default().mimetype
}

impl StorageConfig {
    /// Backend independent settings of the storage engine.
    #[must_use]
    pub fn options(&self) -> StorageOptions {
        StorageOptions {
            levels: self.levels.clone(),
            stride: self.stride,
            mimetype: self.mimetype.clone(),
            extension: self.extension.clone(),
            prefix: self.prefix.clone(),
            readonly: self.readonly,
            gzip: self.gzip,
            mode: self.mode,
        }
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.stride.is_power_of_two() {
            Ok(())
        } else {
            Err(ConfigError::InvalidStride(self.stride))
        }
    }

    fn splitter(&self) -> ConfigResult<BoxedSplitter> {
        splitter_for(&self.mimetype).ok_or_else(|| ConfigError::NoSplitter(self.mimetype.clone()))
    }

    /// The configured backend, `None` for the `null` prototype.
    fn create_backend(&self) -> ConfigResult<Option<BoxedBackend>> {
        match self.prototype {
            StoragePrototype::Disk => {
                let root = self
                    .root
                    .clone()
                    .ok_or(ConfigError::MissingSetting("disk", "root"))?;
                Ok(Some(Box::new(DiskBackend::new(root))))
            }
            #[cfg(feature = "s3")]
            StoragePrototype::S3 => {
                let bucket = self
                    .bucket
                    .clone()
                    .ok_or(ConfigError::MissingSetting("s3", "bucket"))?;
                let options = S3Options {
                    bucket,
                    region: self.region.clone(),
                    endpoint: self.endpoint.clone(),
                    policy: self.policy,
                    storage_class: self.storage_class,
                    timeout: self.timeout,
                };
                Ok(Some(Box::new(S3Backend::connect(&options)?)))
            }
            #[cfg(not(feature = "s3"))]
            StoragePrototype::S3 => Err(ConfigError::FeatureDisabled("s3", "s3")),
            StoragePrototype::Null => Ok(None),
        }
    }

    /// Builds storage serving whole metatiles.
    pub fn create_metatile_storage(&self) -> ConfigResult<BoxedMetaTileStorage> {
        self.validate()?;
        if self.format == StorageFormat::Cluster {
            return Err(ConfigError::NotMetaTileStorage);
        }
        let Some(backend) = self.create_backend()? else {
            info!("Metatile storage is disabled");
            return Ok(Box::new(NullStorage));
        };
        Ok(Box::new(StorageEngine::<MetaTile>::new(
            backend,
            Box::new(MetaTileSerializer::new(self.mimetype.clone(), self.buffer)),
            self.options(),
        )))
    }

    /// Builds storage serving tile clusters, in either storage format.
    pub fn create_cluster_storage(&self) -> ConfigResult<BoxedClusterStorage> {
        self.validate()?;
        if self.prototype == StoragePrototype::Null {
            info!("Cluster storage is disabled");
            return Ok(Box::new(NullStorage));
        }
        let splitter = self.splitter()?;
        match self.format {
            StorageFormat::MetaTile => Ok(Box::new(Clusterifier::new(
                self.create_metatile_storage()?,
                splitter,
            ))),
            StorageFormat::Cluster => Ok(Box::new(StorageEngine::<TileCluster>::new(
                self.create_backend()?.ok_or(ConfigError::NotMetaTileStorage)?,
                Box::new(ClusterSerializer::new(splitter, self.compressed)),
                self.options(),
            ))),
        }
    }
}
