//! Durable storage of rendered metatiles.
//!
//! A [`StorageEngine`] combines
//! - a [`StorageBackend`] holding blobs under `/`-separated keys ([`DiskBackend`], `S3Backend`),
//! - a [`Serializer`] deciding what a blob is (a raw metatile or a zip [`TileCluster`](crate::tiles::TileCluster)),
//! - a [`KeyMode`] deriving keys from metatile indices.
//!
//! Callers use it through the [`MetaTileStorage`] and [`ClusterStorage`] traits.

use std::fmt::Debug;

use mason_tile_utils::MetaTileIndex;

use crate::tiles::{MetaTile, TileCluster};

mod error;
pub use error::{StorageError, StorageResult};

mod keys;
pub use keys::KeyMode;

mod options;
pub use options::{ObjectPolicy, StorageClass, StorageOptions};

mod backend;
pub use backend::{BoxedBackend, ObjectMetadata, StorageBackend};

mod disk;
pub use disk::DiskBackend;

#[cfg(feature = "s3")]
mod s3;
#[cfg(feature = "s3")]
pub use s3::{DEFAULT_S3_TIMEOUT, S3Backend, S3Options};

mod serializer;
pub use serializer::{ClusterSerializer, MetaTileSerializer, Serializer};

mod engine;
pub use engine::StorageEngine;

mod clusterifier;
pub use clusterifier::Clusterifier;

mod null;
pub use null::NullStorage;

/// Storage of whole metatiles.
pub trait MetaTileStorage: Send + Sync + Debug {
    /// Reads a metatile, `None` when not stored.
    fn get(&self, index: &MetaTileIndex) -> StorageResult<Option<MetaTile>>;

    /// Writes a metatile, replacing any stored one.
    fn put(&self, metatile: &MetaTile) -> StorageResult<()>;

    /// Whether a metatile is stored.
    fn has(&self, index: &MetaTileIndex) -> StorageResult<bool>;

    /// Deletes a metatile. Retiring an absent metatile succeeds.
    fn retire(&self, index: &MetaTileIndex) -> StorageResult<()>;

    /// Releases backend resources.
    fn close(&self) -> StorageResult<()>;
}

/// Storage that accepts metatiles and serves them split into clusters.
pub trait ClusterStorage: Send + Sync + Debug {
    /// Reads the cluster of a metatile, `None` when not stored.
    fn get(&self, index: &MetaTileIndex) -> StorageResult<Option<TileCluster>>;

    /// Splits and writes a metatile, replacing any stored one.
    fn put(&self, metatile: &MetaTile) -> StorageResult<()>;

    /// Whether a cluster is stored.
    fn has(&self, index: &MetaTileIndex) -> StorageResult<bool>;

    /// Deletes a cluster. Retiring an absent cluster succeeds.
    fn retire(&self, index: &MetaTileIndex) -> StorageResult<()>;

    /// Releases backend resources.
    fn close(&self) -> StorageResult<()>;
}

/// A boxed [`MetaTileStorage`] trait object.
pub type BoxedMetaTileStorage = Box<dyn MetaTileStorage>;

/// A boxed [`ClusterStorage`] trait object.
pub type BoxedClusterStorage = Box<dyn ClusterStorage>;
