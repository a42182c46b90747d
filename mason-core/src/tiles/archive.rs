//! Zip archive codec for [`TileCluster`].
//!
//! An archive holds one entry per distinct tile payload plus a JSON manifest:
//!
//! ```json
//! {
//!   "version": 1,
//!   "tiles": {"4-8-8": "4-8-8", "4-8-9": "4-8-8"},
//!   "datas": ["4-8-8"],
//!   "extension": ".png",
//!   "mimetype": "image/png",
//!   "stride": 2,
//!   "mtime": 1700000000.0
//! }
//! ```
//!
//! Tiles with identical content are stored once, under the key of the first such tile.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read, Seek, Write as _};

use mason_tile_utils::{MetaTileIndex, TileFormat, TileIndex};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::tiles::{ClusterError, ClusterResult, Tile, TileCluster, content_etag, now_mtime};

/// Name of the manifest entry written into every archive.
pub const MANIFEST_NAME: &str = "index.json";

/// Manifest name used by older archives, still accepted when reading.
pub const LEGACY_MANIFEST_NAME: &str = "tiles.json";

/// Manifest format version written by this crate.
pub const MANIFEST_VERSION: u32 = 1;

/// Entry extension for mimetypes without a known file extension.
const FALLBACK_EXTENSION: &str = ".dat";

/// Attributes that replace the manifest's values when an archive is loaded.
///
/// Storage backends know the mtime of the stored blob, which wins over the one
/// recorded in the manifest.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClusterMetadata {
    /// Replaces the manifest mimetype.
    pub mimetype: Option<String>,
    /// Replaces the manifest modification time.
    pub mtime: Option<f64>,
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    #[serde(default)]
    version: u32,
    tiles: BTreeMap<String, String>,
    #[serde(default)]
    datas: Vec<String>,
    extension: String,
    mimetype: String,
    stride: Option<u32>,
    mtime: Option<f64>,
}

fn tile_key(index: &TileIndex) -> String {
    format!("{}-{}-{}", index.z(), index.x(), index.y())
}

fn parse_tile_key(key: &str) -> ClusterResult<TileIndex> {
    let invalid = || ClusterError::InvalidTileKey(key.to_string());
    let mut parts = key.splitn(3, '-');
    let mut next = || parts.next().ok_or_else(invalid);
    let z = next()?.parse().map_err(|_| invalid())?;
    let x = next()?.parse().map_err(|_| invalid())?;
    let y = next()?.parse().map_err(|_| invalid())?;
    Ok(TileIndex::new(z, x, y)?)
}

fn file_options(method: CompressionMethod) -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(method)
}

fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> ClusterResult<Option<Vec<u8>>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut data = Vec::new();
    file.read_to_end(&mut data)
        .map_err(|e| ClusterError::EntryError(e, name.to_string()))?;
    Ok(Some(data))
}

impl TileCluster {
    /// Serializes the cluster into a zip archive.
    ///
    /// Tile entries are deflated when `compressed` is set, the manifest is always stored
    /// uncompressed.
    pub fn to_archive(&self, compressed: bool) -> ClusterResult<Vec<u8>> {
        let mimetype = self.mimetype().to_string();
        let extension = TileFormat::from_content_type(&mimetype)
            .map_or(FALLBACK_EXTENSION, |f| f.extension())
            .to_string();
        let method = if compressed {
            CompressionMethod::Deflated
        } else {
            CompressionMethod::Stored
        };

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let mut tiles = BTreeMap::new();
        let mut datas = Vec::new();
        let mut by_etag: HashMap<&str, String> = HashMap::new();

        for tile in self.tiles() {
            let key = tile_key(tile.index());
            let data_key = match by_etag.entry(tile.etag()) {
                Entry::Occupied(e) => e.get().clone(),
                Entry::Vacant(e) => {
                    let name = format!("{key}{extension}");
                    writer.start_file(name.as_str(), file_options(method))?;
                    writer
                        .write_all(tile.data())
                        .map_err(|e| ClusterError::EntryError(e, name))?;
                    datas.push(key.clone());
                    e.insert(key.clone()).clone()
                }
            };
            tiles.insert(key, data_key);
        }
        trace!(
            "Archiving {} with {} distinct payloads for {} tiles",
            self.index(),
            datas.len(),
            tiles.len()
        );

        let manifest = Manifest {
            version: MANIFEST_VERSION,
            tiles,
            datas,
            extension,
            mimetype,
            stride: Some(self.index().stride()),
            mtime: Some(self.mtime()),
        };
        writer.start_file(MANIFEST_NAME, file_options(CompressionMethod::Stored))?;
        serde_json::to_writer(&mut writer, &manifest)?;

        Ok(writer.finish()?.into_inner())
    }

    /// Reads a cluster back from a zip archive.
    ///
    /// `index.json` is preferred, `tiles.json` is accepted as a fallback. Archives
    /// without a `stride` in the manifest get the square root of their tile count.
    pub fn from_archive(data: &[u8], overrides: &ClusterMetadata) -> ClusterResult<Self> {
        let mut archive = ZipArchive::new(Cursor::new(data))?;

        let manifest = if let Some(manifest) = read_entry(&mut archive, MANIFEST_NAME)? {
            manifest
        } else if let Some(manifest) = read_entry(&mut archive, LEGACY_MANIFEST_NAME)? {
            warn!("Cluster archive uses the legacy {LEGACY_MANIFEST_NAME} manifest");
            manifest
        } else {
            return Err(ClusterError::MissingManifest);
        };
        let manifest: Manifest = serde_json::from_slice(&manifest)?;
        if manifest.version > MANIFEST_VERSION {
            return Err(ClusterError::UnsupportedVersion(manifest.version));
        }

        let anchor = manifest
            .tiles
            .keys()
            .map(|key| parse_tile_key(key))
            .collect::<ClusterResult<Vec<_>>>()?
            .into_iter()
            .min_by_key(|t| (t.x(), t.y()))
            .ok_or(ClusterError::EmptyCluster)?;
        let stride = manifest
            .stride
            .unwrap_or_else(|| (manifest.tiles.len() as u32).isqrt());
        let index = MetaTileIndex::new(anchor.z(), anchor.x(), anchor.y(), stride)?;

        let mimetype = overrides.mimetype.clone().unwrap_or(manifest.mimetype);
        let mtime = overrides.mtime.or(manifest.mtime).unwrap_or_else(now_mtime);

        let mut payloads: HashMap<&str, Vec<u8>> = HashMap::new();
        let mut tiles = Vec::with_capacity(manifest.tiles.len());
        for (key, data_key) in &manifest.tiles {
            let data = match payloads.entry(data_key.as_str()) {
                Entry::Occupied(e) => e.get().clone(),
                Entry::Vacant(e) => {
                    let name = format!("{data_key}{}", manifest.extension);
                    let data = read_entry(&mut archive, &name)?
                        .ok_or_else(|| ClusterError::MissingData(data_key.clone()))?;
                    e.insert(data).clone()
                }
            };
            let etag = content_etag(&data);
            tiles.push(Tile::from_parts(
                parse_tile_key(key)?,
                data,
                mimetype.as_str(),
                mtime,
                etag,
            ));
        }

        Self::from_tiles(index, tiles)
    }
}
