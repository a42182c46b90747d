//! Tile indexing primitives shared by the tile mason crates.
//!
//! - [`TileIndex`] and [`MetaTileIndex`] address tiles and metatile blocks in the pyramid
//! - [`hilbert`] and [`legacy`] derive serials and sharded directory fragments
//! - [`TileFormat`] maps mimetypes to file extensions
//! - [`decode_gzip`] / [`encode_gzip`] wrap stored blobs

mod decoders;
pub use decoders::{decode_gzip, encode_gzip};

mod index;
pub use index::{Fission, MAX_ZOOM, MetaTileIndex, TileIndex, TileIndexError};

pub mod hilbert;
pub mod legacy;

/// Raw tile or metatile bytes.
pub type TileData = Vec<u8>;

/// Tiles at or above this level are kept in a single directory.
pub(crate) const BLOCK_ZOOM: u8 = 6;

/// Deeper levels are sharded into square blocks of `2^BLOCK_BITS` tiles per side.
pub(crate) const BLOCK_BITS: u8 = 6;

/// Renders a block number of a `4^order` block grid as zero-padded hex, split into
/// 2-character path fragments.
pub(crate) fn block_fragments(block: u64, order: u8) -> impl Iterator<Item = String> {
    // 2 bits per order, 4 bits per hex digit, rounded up to whole fragments
    let digits = usize::from(order).div_ceil(2);
    let width = digits.div_ceil(2) * 2;
    let hex = format!("{block:0width$x}");
    (0..width)
        .step_by(2)
        .map(move |i| hex[i..i + 2].to_string())
}

/// Known tile payload formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TileFormat {
    /// Portable Network Graphics.
    Png,
    /// JPEG raster.
    Jpeg,
    /// WebP raster.
    Webp,
    /// GIF raster.
    Gif,
    /// TIFF raster.
    Tiff,
    /// Plain JSON.
    Json,
    /// GeoJSON features.
    GeoJson,
    /// Mapbox vector tile.
    Mvt,
    /// Zip archive, used for tile clusters.
    Zip,
}

impl TileFormat {
    const ALL: [Self; 9] = [
        Self::Png,
        Self::Jpeg,
        Self::Webp,
        Self::Gif,
        Self::Tiff,
        Self::Json,
        Self::GeoJson,
        Self::Mvt,
        Self::Zip,
    ];

    /// Looks up a format by mimetype, ignoring case.
    #[must_use]
    pub fn from_content_type(mimetype: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.content_type().eq_ignore_ascii_case(mimetype))
    }

    /// Mimetype of the format.
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        match *self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
            Self::Tiff => "image/tiff",
            Self::Json => "application/json",
            Self::GeoJson => "application/geo+json",
            Self::Mvt => "application/x-protobuf",
            Self::Zip => "application/zip",
        }
    }

    /// File extension including the leading dot.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match *self {
            Self::Png => ".png",
            Self::Jpeg => ".jpg",
            Self::Gif => ".gif",
            Self::Webp => ".webp",
            Self::Tiff => ".tif",
            Self::Json => ".json",
            Self::GeoJson => ".geojson",
            Self::Mvt => ".pbf",
            Self::Zip => ".zip",
        }
    }

    /// Whether payloads are raster images that can be cut into tiles.
    #[must_use]
    pub fn is_image(&self) -> bool {
        match *self {
            Self::Png | Self::Jpeg | Self::Webp | Self::Gif | Self::Tiff => true,
            Self::Json | Self::GeoJson | Self::Mvt | Self::Zip => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("image/png", Some(TileFormat::Png))]
    #[case("IMAGE/JPEG", Some(TileFormat::Jpeg))]
    #[case("application/x-protobuf", Some(TileFormat::Mvt))]
    #[case("text/html", None)]
    fn test_from_content_type(#[case] mimetype: &str, #[case] expected: Option<TileFormat>) {
        assert_eq!(TileFormat::from_content_type(mimetype), expected);
    }

    #[test]
    fn test_content_type_round_trip() {
        for format in TileFormat::ALL {
            assert_eq!(TileFormat::from_content_type(format.content_type()), Some(format));
        }
    }

    #[rstest]
    #[case(TileFormat::Png, true)]
    #[case(TileFormat::Tiff, true)]
    #[case(TileFormat::Mvt, false)]
    #[case(TileFormat::Zip, false)]
    fn test_is_image(#[case] format: TileFormat, #[case] expected: bool) {
        assert_eq!(format.is_image(), expected);
    }

    #[test]
    fn test_block_fragments() {
        let parts: Vec<_> = block_fragments(3, 1).collect();
        assert_eq!(parts, ["03"]);
        let parts: Vec<_> = block_fragments(0xabc, 6).collect();
        assert_eq!(parts, ["0a", "bc"]);
        let parts: Vec<_> = block_fragments(0, 8).collect();
        assert_eq!(parts, ["00", "00"]);
    }
}
