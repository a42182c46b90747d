use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::iter::FusedIterator;

use crate::hilbert;

/// Deepest supported zoom level.
///
/// Hilbert serials keep the level in the top bits and need `2 * z` bits for the distance.
pub const MAX_ZOOM: u8 = 28;

/// Errors raised when constructing tile or metatile indices.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TileIndexError {
    #[error("Zoom level {0} is deeper than the supported maximum {MAX_ZOOM}")]
    ZoomOutOfRange(u8),

    #[error("Tile coordinate {1},{2} is outside of zoom level {0}")]
    CoordOutOfRange(u8, u32, u32),

    #[error("Metatile stride {0} is not a power of two")]
    InvalidStride(u32),
}

/// Address of a single tile in the pyramid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileIndex {
    z: u8,
    x: u32,
    y: u32,
}

impl TileIndex {
    /// Creates a tile index, rejecting coordinates outside `[0, 2^z)`.
    pub fn new(z: u8, x: u32, y: u32) -> Result<Self, TileIndexError> {
        if z > MAX_ZOOM {
            return Err(TileIndexError::ZoomOutOfRange(z));
        }
        let dim = 1_u32 << z;
        if x >= dim || y >= dim {
            return Err(TileIndexError::CoordOutOfRange(z, x, y));
        }
        Ok(Self { z, x, y })
    }

    /// Zoom level.
    #[must_use]
    pub fn z(&self) -> u8 {
        self.z
    }

    /// Column, growing eastwards.
    #[must_use]
    pub fn x(&self) -> u32 {
        self.x
    }

    /// Row, growing southwards.
    #[must_use]
    pub fn y(&self) -> u32 {
        self.y
    }

    /// Hilbert serial, unique per tile and ordered by zoom level first.
    #[must_use]
    pub fn serial(&self) -> u64 {
        hilbert::serial(self.z, self.x, self.y)
    }
}

impl Ord for TileIndex {
    fn cmp(&self, other: &Self) -> Ordering {
        self.serial().cmp(&other.serial())
    }
}

impl PartialOrd for TileIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for TileIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Address of a `stride × stride` block of tiles, anchored at its top-left tile.
///
/// Equality, hashing and ordering only consider the anchor, so two indices with the
/// same anchor but different strides compare equal.
#[derive(Clone, Copy, Debug)]
pub struct MetaTileIndex {
    z: u8,
    x: u32,
    y: u32,
    stride: u32,
}

impl MetaTileIndex {
    /// Creates a metatile index.
    ///
    /// `x` and `y` are snapped down to a multiple of `stride`, and a stride larger than
    /// the whole level is clamped to `2^z`.
    pub fn new(z: u8, x: u32, y: u32, stride: u32) -> Result<Self, TileIndexError> {
        let anchor = TileIndex::new(z, x, y)?;
        if !stride.is_power_of_two() {
            return Err(TileIndexError::InvalidStride(stride));
        }
        let stride = stride.min(1 << z);
        Ok(Self {
            z: anchor.z,
            x: anchor.x - anchor.x % stride,
            y: anchor.y - anchor.y % stride,
            stride,
        })
    }

    /// Zoom level.
    #[must_use]
    pub fn z(&self) -> u8 {
        self.z
    }

    /// Column of the anchor tile.
    #[must_use]
    pub fn x(&self) -> u32 {
        self.x
    }

    /// Row of the anchor tile.
    #[must_use]
    pub fn y(&self) -> u32 {
        self.y
    }

    /// Tiles per side, clamped to the level's width.
    #[must_use]
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Position of the anchor tile along the Hilbert curve of its level.
    #[must_use]
    pub fn serial(&self) -> u64 {
        hilbert::serial(self.z, self.x, self.y)
    }

    /// The top-left tile of the block.
    #[must_use]
    pub fn anchor(&self) -> TileIndex {
        TileIndex {
            z: self.z,
            x: self.x,
            y: self.y,
        }
    }

    /// Whether `index` lies inside this block.
    #[must_use]
    pub fn contains(&self, index: &TileIndex) -> bool {
        index.z == self.z
            && (self.x..self.x + self.stride).contains(&index.x)
            && (self.y..self.y + self.stride).contains(&index.y)
    }

    /// All `stride²` tiles covered by the block, column by column.
    #[must_use]
    pub fn fission(&self) -> Fission {
        Fission {
            index: *self,
            position: 0,
        }
    }

    /// The single tile of a coarser level covering the same ground as this block.
    #[must_use]
    pub fn to_tile_index(&self) -> TileIndex {
        let levels = self.stride.trailing_zeros() as u8;
        TileIndex {
            z: self.z - levels,
            x: self.x >> levels,
            y: self.y >> levels,
        }
    }
}

impl PartialEq for MetaTileIndex {
    fn eq(&self, other: &Self) -> bool {
        self.serial() == other.serial()
    }
}

impl Eq for MetaTileIndex {}

impl Hash for MetaTileIndex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.serial().hash(state);
    }
}

impl Ord for MetaTileIndex {
    fn cmp(&self, other: &Self) -> Ordering {
        self.serial().cmp(&other.serial())
    }
}

impl PartialOrd for MetaTileIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for MetaTileIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}@{}", self.z, self.x, self.y, self.stride)
    }
}

/// Iterator over the tiles of a [`MetaTileIndex`], see [`MetaTileIndex::fission`].
#[derive(Clone, Debug)]
pub struct Fission {
    index: MetaTileIndex,
    position: u64,
}

impl Fission {
    fn total(&self) -> u64 {
        u64::from(self.index.stride) * u64::from(self.index.stride)
    }
}

impl Iterator for Fission {
    type Item = TileIndex;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.total() {
            return None;
        }
        let stride = u64::from(self.index.stride);
        let dx = (self.position / stride) as u32;
        let dy = (self.position % stride) as u32;
        self.position += 1;
        Some(TileIndex {
            z: self.index.z,
            x: self.index.x + dx,
            y: self.index.y + dy,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.total() - self.position).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Fission {}

impl FusedIterator for Fission {}
