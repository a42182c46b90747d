//! Tile values flowing between renderers, storage and caches.
//!
//! - [`Tile`]: one rendered tile with its mimetype, modification time and etag
//! - [`MetaTile`]: a rendered `stride × stride` block, possibly with a buffer margin
//! - [`TileCluster`]: a metatile split into its tiles, persistable as a zip archive

mod error;
pub use error::{ClusterError, ClusterResult};

mod tile;
pub use tile::{MetaTile, Tile, content_etag, now_mtime};

mod splitter;
#[cfg(feature = "image")]
pub use splitter::ImageSplitter;
pub use splitter::{BoxedSplitter, SplitTiles, Splitter, splitter_for};

mod cluster;
pub use cluster::TileCluster;
#[cfg(test)]
pub(crate) use cluster::tests;

mod archive;
pub use archive::{ClusterMetadata, LEGACY_MANIFEST_NAME, MANIFEST_NAME, MANIFEST_VERSION};
