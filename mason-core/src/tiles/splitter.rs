use std::fmt::Debug;
#[cfg(feature = "image")]
use std::io::Cursor;
use std::sync::Arc;

#[cfg(feature = "image")]
use image::{DynamicImage, ImageFormat};
use mason_tile_utils::{TileData, TileFormat};
use tracing::debug;

use crate::tiles::ClusterResult;

/// Split tiles keyed by `(row, column)` within the metatile grid.
pub type SplitTiles = Vec<((u32, u32), TileData)>;

/// Cuts a metatile payload into `stride × stride` tile payloads.
///
/// Row `0`, column `0` is the anchor tile. Rows grow with `y`, columns with `x`.
pub trait Splitter: Send + Sync + Debug {
    /// Splits `data`, after removing a margin of `buffer` pixels on every side.
    fn split(&self, data: &[u8], stride: u32, buffer: u32) -> ClusterResult<SplitTiles>;
}

/// A shareable [`Splitter`] trait object.
pub type BoxedSplitter = Arc<dyn Splitter>;

/// Returns the splitter able to handle `mimetype`, if any.
#[must_use]
pub fn splitter_for(mimetype: &str) -> Option<BoxedSplitter> {
    if !TileFormat::from_content_type(mimetype).is_some_and(|format| format.is_image()) {
        debug!("{mimetype} is not an image format, its metatiles cannot be split");
        return None;
    }
    #[cfg(feature = "image")]
    if let Some(splitter) = ImageSplitter::for_mimetype(mimetype) {
        return Some(Arc::new(splitter));
    }
    debug!("No splitter available for {mimetype}");
    None
}

/// Splits raster metatiles, re-encoding each tile in the source image format.
#[cfg(feature = "image")]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageSplitter {
    format: ImageFormat,
}

#[cfg(feature = "image")]
impl ImageSplitter {
    /// Creates a splitter for PNG, JPEG or WebP images.
    #[must_use]
    pub fn for_mimetype(mimetype: &str) -> Option<Self> {
        let format = match TileFormat::from_content_type(mimetype)? {
            TileFormat::Png => ImageFormat::Png,
            TileFormat::Jpeg => ImageFormat::Jpeg,
            TileFormat::Webp => ImageFormat::WebP,
            _ => return None,
        };
        Some(Self { format })
    }

    fn encode(&self, cell: &DynamicImage) -> ClusterResult<TileData> {
        let mut buffer = Cursor::new(Vec::new());
        match self.format {
            // no alpha channel in jpeg
            ImageFormat::Jpeg => {
                DynamicImage::ImageRgb8(cell.to_rgb8()).write_to(&mut buffer, self.format)?;
            }
            _ => cell.write_to(&mut buffer, self.format)?,
        }
        Ok(buffer.into_inner())
    }
}

#[cfg(feature = "image")]
impl Splitter for ImageSplitter {
    fn split(&self, data: &[u8], stride: u32, buffer: u32) -> ClusterResult<SplitTiles> {
        use crate::tiles::ClusterError;

        let image = image::load_from_memory_with_format(data, self.format)?;
        let (width, height) = (image.width(), image.height());
        let invalid = || ClusterError::InvalidGeometry(width, height, buffer, stride);

        let inner_width = width.checked_sub(2 * buffer).ok_or_else(invalid)?;
        let inner_height = height.checked_sub(2 * buffer).ok_or_else(invalid)?;
        if stride == 0
            || inner_width < stride
            || inner_height < stride
            || inner_width % stride != 0
            || inner_height % stride != 0
        {
            return Err(invalid());
        }

        let tile_width = inner_width / stride;
        let tile_height = inner_height / stride;
        let mut tiles = Vec::with_capacity((stride * stride) as usize);
        for row in 0..stride {
            for col in 0..stride {
                let cell = image.crop_imm(
                    buffer + col * tile_width,
                    buffer + row * tile_height,
                    tile_width,
                    tile_height,
                );
                tiles.push(((row, col), self.encode(&cell)?));
            }
        }
        Ok(tiles)
    }
}
