use mason_tile_utils::{MetaTileIndex, TileIndexError};

use crate::ErrorKind;

/// Errors raised while splitting metatiles or reading and writing cluster archives.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum ClusterError {
    /// The splitter returned a different number of tiles than the metatile covers.
    #[error("Splitting metatile {0} produced {1} tiles instead of {2}")]
    SplitCount(MetaTileIndex, usize, usize),

    /// The splitter produced no tile for a cell of the grid.
    #[error("Splitting metatile {0} produced no tile for row {1}, column {2}")]
    MissingSplit(MetaTileIndex, u32, u32),

    /// The metatile image does not divide into `stride × stride` tiles.
    #[error("Image of {0}×{1} pixels with a buffer of {2} cannot be split into {3}×{3} tiles")]
    InvalidGeometry(u32, u32, u32, u32),

    /// No splitter is available for the mimetype.
    #[error("No splitter is available for mimetype {0}")]
    UnsupportedMimetype(String),

    /// Image decoding or encoding failed.
    #[cfg(feature = "image")]
    #[error("Unable to process metatile image: {0}")]
    ImageError(#[from] image::ImageError),

    /// The blob is not a readable zip archive.
    #[error("Unable to read or write cluster archive: {0}")]
    ZipError(#[from] zip::result::ZipError),

    /// Reading or writing an archive entry failed.
    #[error("Unable to access cluster archive entry {1}: {0}")]
    EntryError(#[source] std::io::Error, String),

    /// The archive contains neither `index.json` nor `tiles.json`.
    #[error("Cluster archive has no manifest")]
    MissingManifest,

    /// The manifest is not valid JSON of the expected shape.
    #[error("Unable to parse cluster manifest: {0}")]
    InvalidManifest(#[from] serde_json::Error),

    /// The manifest was written by a newer version of the format.
    #[error("Cluster manifest version {0} is not supported")]
    UnsupportedVersion(u32),

    /// The manifest lists no tiles.
    #[error("Cluster manifest lists no tiles")]
    EmptyCluster,

    /// A manifest key is not of the form `z-x-y`.
    #[error("Cluster manifest key {0:?} is not a z-x-y tile key")]
    InvalidTileKey(String),

    /// A manifest entry points at a data file missing from the archive.
    #[error("Cluster manifest refers to missing data entry {0:?}")]
    MissingData(String),

    /// The archive's tiles do not form a complete metatile.
    #[error("Cluster archive tiles do not form a complete metatile {0}")]
    IncompleteCluster(MetaTileIndex),

    /// A manifest key addresses a tile outside the pyramid.
    #[error(transparent)]
    IndexError(#[from] TileIndexError),
}

impl ClusterError {
    /// Classifies the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SplitCount(..)
            | Self::MissingSplit(..)
            | Self::InvalidGeometry(..)
            | Self::UnsupportedMimetype(_) => ErrorKind::InvalidData,
            #[cfg(feature = "image")]
            Self::ImageError(_) => ErrorKind::InvalidData,
            Self::ZipError(_)
            | Self::EntryError(..)
            | Self::MissingManifest
            | Self::InvalidManifest(_)
            | Self::UnsupportedVersion(_)
            | Self::EmptyCluster
            | Self::InvalidTileKey(_)
            | Self::MissingData(_)
            | Self::IncompleteCluster(_)
            | Self::IndexError(_) => ErrorKind::ArchiveCorrupt,
        }
    }
}

/// A convenience [`Result`] for cluster operations.
pub type ClusterResult<T> = Result<T, ClusterError>;
