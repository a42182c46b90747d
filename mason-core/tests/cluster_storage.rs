#![cfg(feature = "image")]

use std::fs;
use std::io::{Cursor, Read as _};
use std::path::Path;

use image::{DynamicImage, GenericImageView as _, ImageFormat, Rgba, RgbaImage};
use mason_core::ErrorKind;
use mason_core::config::{MasonConfig, parse_config};
use mason_core::storage::BoxedClusterStorage;
use mason_core::tiles::{ClusterMetadata, ImageSplitter, MANIFEST_NAME, MetaTile, TileCluster};
use mason_tile_utils::{MetaTileIndex, TileIndex};
use rstest::rstest;
use serde_json::Value;
use tempfile::TempDir;

const CELL: u32 = 8;

/// A `stride × stride` grid of `CELL` pixel squares inside a `buffer` pixel margin.
///
/// With `uniform` every square has the same colour, otherwise each has its own.
fn grid_png(stride: u32, buffer: u32, uniform: bool) -> Vec<u8> {
    let size = stride * CELL + 2 * buffer;
    let image = RgbaImage::from_fn(size, size, |x, y| {
        if x < buffer || y < buffer || x >= size - buffer || y >= size - buffer {
            return Rgba([255, 0, 255, 255]);
        }
        if uniform {
            return Rgba([10, 20, 30, 255]);
        }
        colour((y - buffer) / CELL, (x - buffer) / CELL)
    });
    let mut data = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image)
        .write_to(&mut data, ImageFormat::Png)
        .unwrap();
    data.into_inner()
}

fn colour(row: u32, col: u32) -> Rgba<u8> {
    Rgba([
        u8::try_from(row * 50).unwrap(),
        u8::try_from(col * 50).unwrap(),
        100,
        255,
    ])
}

fn config(dir: &TempDir, format: &str) -> MasonConfig {
    let yaml = format!(
        "storage:\n  prototype: disk\n  root: {}\n  mode: simple\n  stride: 4\n  buffer: 2\n  format: {format}\n  compressed: true\n",
        dir.path().display()
    );
    parse_config(&yaml, Path::new("test.yaml")).unwrap()
}

fn cluster_storage(dir: &TempDir, format: &str) -> BoxedClusterStorage {
    config(dir, format).storage.create_cluster_storage().unwrap()
}

#[rstest]
#[case::archives("cluster", "3/0/4/3-0-4@4.zip")]
#[case::metatiles("metatile", "3/0/4/3-0-4@4.png")]
fn split_on_put_or_get(#[case] format: &str, #[case] stored_as: &str) {
    let dir = tempfile::tempdir().unwrap();
    let storage = cluster_storage(&dir, format);
    let index = MetaTileIndex::new(3, 1, 5, 4).unwrap();
    let meta = MetaTile::new(index, grid_png(4, 2, false), "image/png")
        .with_mtime(1_650_000_000.0)
        .with_buffer(2);

    storage.put(&meta).unwrap();
    assert!(dir.path().join(stored_as).is_file());

    let cluster = storage.get(&index).unwrap().unwrap();
    assert_eq!(cluster.index(), &index);
    assert_eq!(cluster.tiles().len(), 16);
    assert_eq!(cluster.mimetype(), "image/png");
    for tile in cluster.tiles() {
        let (row, col) = (tile.index().y() - 4, tile.index().x());
        let image = image::load_from_memory(tile.data()).unwrap();
        assert_eq!(image.dimensions(), (CELL, CELL));
        assert_eq!(image.get_pixel(0, 0), colour(row, col));
        assert_eq!(image.get_pixel(CELL - 1, CELL - 1), colour(row, col));
    }
}

#[test]
fn archive_deduplicates_identical_tiles() {
    let index = MetaTileIndex::new(4, 8, 8, 4).unwrap();
    let meta = MetaTile::new(index, grid_png(4, 0, true), "image/png");
    let splitter = ImageSplitter::for_mimetype("image/png").unwrap();
    let cluster = TileCluster::from_metatile(&meta, &splitter).unwrap();
    let etag = cluster.tiles()[0].etag();
    assert!(cluster.tiles().iter().all(|t| t.etag() == etag));

    let archive = cluster.to_archive(false).unwrap();
    let mut zip = zip::ZipArchive::new(Cursor::new(archive.as_slice())).unwrap();
    // the manifest and a single data entry
    assert_eq!(zip.len(), 2);

    let mut manifest = String::new();
    zip.by_name(MANIFEST_NAME)
        .unwrap()
        .read_to_string(&mut manifest)
        .unwrap();
    let manifest: Value = serde_json::from_str(&manifest).unwrap();
    assert_eq!(manifest["version"], 1);
    assert_eq!(manifest["stride"], 4);
    assert_eq!(manifest["datas"].as_array().unwrap().len(), 1);
    assert_eq!(manifest["tiles"].as_object().unwrap().len(), 16);

    let loaded = TileCluster::from_archive(&archive, &ClusterMetadata::default()).unwrap();
    assert_eq!(loaded, cluster);
    let tile = loaded.get(&TileIndex::new(4, 11, 11).unwrap()).unwrap();
    assert_eq!(tile.data(), cluster.tiles()[0].data());
}

#[test]
fn corrupt_archive_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let storage = cluster_storage(&dir, "cluster");
    let index = MetaTileIndex::new(3, 0, 0, 4).unwrap();
    let path = dir.path().join("3/0/0/3-0-0@4.zip");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, b"PK\x03\x04 not really a zip").unwrap();

    assert!(storage.has(&index).unwrap());
    let err = storage.get(&index).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArchiveCorrupt);
}

#[test]
fn mimetype_is_enforced() {
    let dir = tempfile::tempdir().unwrap();
    let storage = cluster_storage(&dir, "cluster");
    let index = MetaTileIndex::new(3, 0, 0, 4).unwrap();
    let meta = MetaTile::new(index, grid_png(4, 2, false), "image/jpeg").with_buffer(2);
    let err = storage.put(&meta).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MimetypeMismatch);
    assert!(!storage.has(&index).unwrap());
}
