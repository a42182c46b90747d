use std::time::{SystemTime, UNIX_EPOCH};

use mason_tile_utils::{MetaTileIndex, TileData, TileIndex};

/// Content hash used as an etag: lowercase hex MD5 of the data.
#[must_use]
pub fn content_etag(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

/// Current time as fractional seconds since the Unix epoch.
#[must_use]
pub fn now_mtime() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64())
}

/// A single rendered map tile.
///
/// Tiles are immutable once built. Unless given explicitly, the etag is derived from the
/// data and the modification time is the moment of construction.
///
/// ```rust
/// use mason_core::tiles::{Tile, content_etag};
/// use mason_tile_utils::TileIndex;
///
/// let index = TileIndex::new(1, 0, 1).unwrap();
/// let tile = Tile::new(index, b"tile".to_vec(), "image/png");
/// assert_eq!(tile.etag(), content_etag(b"tile"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    index: TileIndex,
    data: TileData,
    mimetype: String,
    mtime: f64,
    etag: String,
}

impl Tile {
    /// Creates a tile stamped with the current time and a content etag.
    #[must_use]
    pub fn new(index: TileIndex, data: TileData, mimetype: impl Into<String>) -> Self {
        let etag = content_etag(&data);
        Self::from_parts(index, data, mimetype, now_mtime(), etag)
    }

    /// Creates a tile with every attribute given explicitly.
    #[must_use]
    pub fn from_parts(
        index: TileIndex,
        data: TileData,
        mimetype: impl Into<String>,
        mtime: f64,
        etag: impl Into<String>,
    ) -> Self {
        Self {
            index,
            data,
            mimetype: mimetype.into(),
            mtime,
            etag: etag.into(),
        }
    }

    /// Replaces the modification time.
    #[must_use]
    pub fn with_mtime(mut self, mtime: f64) -> Self {
        self.mtime = mtime;
        self
    }

    /// Position of the tile.
    #[must_use]
    pub fn index(&self) -> &TileIndex {
        &self.index
    }

    /// Encoded tile payload.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Takes the payload.
    #[must_use]
    pub fn into_data(self) -> TileData {
        self.data
    }

    /// Mimetype of the payload.
    #[must_use]
    pub fn mimetype(&self) -> &str {
        &self.mimetype
    }

    /// Seconds since the Unix epoch.
    #[must_use]
    pub fn mtime(&self) -> f64 {
        self.mtime
    }

    /// Hex md5 of the payload unless given explicitly.
    #[must_use]
    pub fn etag(&self) -> &str {
        &self.etag
    }
}

/// A rendered `stride × stride` block of tiles as one image.
///
/// `buffer` is the width in pixels of the margin rendered around the block to avoid
/// clipped labels at tile edges. It is cut away when the metatile is split.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaTile {
    index: MetaTileIndex,
    data: TileData,
    mimetype: String,
    mtime: f64,
    etag: String,
    buffer: u32,
}

impl MetaTile {
    /// Creates a metatile without buffer, stamped with the current time and a content etag.
    #[must_use]
    pub fn new(index: MetaTileIndex, data: TileData, mimetype: impl Into<String>) -> Self {
        let etag = content_etag(&data);
        Self {
            index,
            data,
            mimetype: mimetype.into(),
            mtime: now_mtime(),
            etag,
            buffer: 0,
        }
    }

    /// Replaces the modification time.
    #[must_use]
    pub fn with_mtime(mut self, mtime: f64) -> Self {
        self.mtime = mtime;
        self
    }

    /// Replaces the etag, e.g. with one recorded by a storage backend.
    #[must_use]
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = etag.into();
        self
    }

    /// Sets the buffer margin in pixels.
    #[must_use]
    pub fn with_buffer(mut self, buffer: u32) -> Self {
        self.buffer = buffer;
        self
    }

    /// Position and stride of the block.
    #[must_use]
    pub fn index(&self) -> &MetaTileIndex {
        &self.index
    }

    /// Encoded image of the whole block, buffer included.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mimetype of the image.
    #[must_use]
    pub fn mimetype(&self) -> &str {
        &self.mimetype
    }

    /// Seconds since the Unix epoch.
    #[must_use]
    pub fn mtime(&self) -> f64 {
        self.mtime
    }

    /// Hex md5 of the image unless given explicitly.
    #[must_use]
    pub fn etag(&self) -> &str {
        &self.etag
    }

    /// Margin in pixels around the block.
    #[must_use]
    pub fn buffer(&self) -> u32 {
        self.buffer
    }
}
