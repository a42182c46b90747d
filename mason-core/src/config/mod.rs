use std::fs::File;
use std::io::Read as _;
use std::path::Path;

use serde::{Deserialize, Serialize};

mod error;
pub use error::{ConfigError, ConfigResult};

mod storage;
pub use storage::{StorageConfig, StorageFormat, StoragePrototype};

mod cache;
pub use cache::{CacheConfig, CachePrototype};

/// Top level of the configuration file.
///
/// ```yaml
/// storage:
///   prototype: disk
///   root: /var/lib/tiles
///   stride: 4
/// cache:
///   prototype: memory
///   max_capacity: 512
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MasonConfig {
    /// Where metatiles are stored.
    pub storage: StorageConfig,
    /// Defaults to no caching.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Reads and parses a YAML configuration file.
pub fn read_config(file_name: impl AsRef<Path>) -> ConfigResult<MasonConfig> {
    let file_name = file_name.as_ref();
    let mut file =
        File::open(file_name).map_err(|e| ConfigError::ConfigLoadError(e, file_name.into()))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|e| ConfigError::ConfigLoadError(e, file_name.into()))?;
    parse_config(&contents, file_name)
}

/// Parses YAML configuration, `file_name` is only used in error messages.
pub fn parse_config(contents: &str, file_name: &Path) -> ConfigResult<MasonConfig> {
    serde_yaml::from_str(contents).map_err(|e| ConfigError::ConfigParseError(e, file_name.into()))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::time::Duration;

    use indoc::indoc;
    use mason_tile_utils::MetaTileIndex;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ErrorKind;
    use crate::storage::{KeyMode, ObjectPolicy, StorageClass};
    use crate::tiles::MetaTile;

    fn parse(yaml: &str) -> ConfigResult<MasonConfig> {
        parse_config(yaml, Path::new("test.yaml"))
    }

    #[test]
    fn test_parse_disk() {
        let config = parse(indoc! {"
            storage:
              prototype: disk
              root: /var/lib/tiles
              prefix: osm
              stride: 4
              levels: [0, 1, 2]
              mode: legacy
              gzip: true
            cache:
              prototype: memory
              max_capacity: 64
        "})
        .unwrap();

        let storage = &config.storage;
        assert_eq!(storage.prototype, StoragePrototype::Disk);
        assert_eq!(storage.root.as_deref(), Some(Path::new("/var/lib/tiles")));
        assert_eq!(storage.levels, BTreeSet::from([0, 1, 2]));
        assert_eq!(storage.mode, KeyMode::Legacy);
        assert_eq!(storage.format, StorageFormat::MetaTile);
        assert_eq!(storage.mimetype, "image/png");
        assert!(storage.gzip);
        assert!(!storage.readonly);
        assert_eq!(config.cache.prototype, CachePrototype::Memory);
        assert_eq!(config.cache.max_capacity.map(|v| v.get()), Some(64));
    }

    #[test]
    fn test_parse_s3() {
        let config = parse(indoc! {"
            storage:
              prototype: s3
              bucket: tiles
              region: eu-west-1
              policy: public-read
              storage_class: reduced-redundancy
              timeout: 10s
              format: cluster
              compressed: true
        "})
        .unwrap();

        let storage = &config.storage;
        assert_eq!(storage.bucket.as_deref(), Some("tiles"));
        assert_eq!(storage.policy, ObjectPolicy::PublicRead);
        assert_eq!(storage.storage_class, StorageClass::ReducedRedundancy);
        assert_eq!(storage.timeout, Some(Duration::from_secs(10)));
        assert_eq!(storage.format, StorageFormat::Cluster);
        assert_eq!(storage.levels.len(), 23);
        assert_eq!(config.cache, CacheConfig::default());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = parse(indoc! {"
            storage:
              prototype: disk
              root: /tmp
              strid: 2
        "})
        .unwrap_err();
        assert!(matches!(err, ConfigError::ConfigParseError(..)));
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);

        assert!(parse("storage:\n  prototype: ftp\n").is_err());
        assert!(parse("cache:\n  prototype: null\n").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = read_config("/nonexistent/mason.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::ConfigLoadError(..)));
    }

    #[test]
    fn test_read_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mason.yaml");
        std::fs::write(&path, "storage:\n  prototype: null\n").unwrap();
        let config = read_config(&path).unwrap();
        assert_eq!(config.storage.prototype, StoragePrototype::Null);
        assert_eq!(config.storage.stride, 1);
    }

    #[test]
    fn test_factory_checks() {
        let config = parse("storage:\n  prototype: disk\n").unwrap();
        let err = config.storage.create_metatile_storage().unwrap_err();
        assert!(matches!(err, ConfigError::MissingSetting("disk", "root")));

        let config = parse("storage:\n  prototype: null\n  stride: 3\n").unwrap();
        let err = config.storage.create_cluster_storage().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidStride(3)));

        let config = parse("storage:\n  prototype: null\n  format: cluster\n").unwrap();
        let err = config.storage.create_metatile_storage().unwrap_err();
        assert!(matches!(err, ConfigError::NotMetaTileStorage));

        let config = parse(indoc! {"
            storage:
              prototype: disk
              root: /tmp
              mimetype: application/json
        "})
        .unwrap();
        let err = config.storage.create_cluster_storage().unwrap_err();
        assert!(matches!(err, ConfigError::NoSplitter(m) if m == "application/json"));
    }

    #[test]
    fn test_null_storage() {
        let config = parse("storage:\n  prototype: null\n  stride: 2\n").unwrap();
        let storage = config.storage.create_metatile_storage().unwrap();
        let index = MetaTileIndex::new(3, 2, 2, 2).unwrap();
        storage
            .put(&MetaTile::new(index, vec![1, 2, 3, 4], "image/png"))
            .unwrap();
        assert_eq!(storage.get(&index).unwrap(), None);
        assert!(!storage.has(&index).unwrap());
    }

    #[test]
    fn test_disk_metatile_storage() {
        let dir = tempfile::tempdir().unwrap();
        let config = parse(&format!(
            "storage:\n  prototype: disk\n  root: {}\n  stride: 2\n  mode: simple\n",
            dir.path().display()
        ))
        .unwrap();
        let storage = config.storage.create_metatile_storage().unwrap();
        let index = MetaTileIndex::new(3, 2, 2, 2).unwrap();
        let source = MetaTile::new(index, b"abcd".to_vec(), "image/png");
        storage.put(&source).unwrap();
        let stored = storage.get(&index).unwrap().unwrap();
        assert_eq!(stored.data(), source.data());
        assert_eq!(stored.etag(), source.etag());
        assert!(dir.path().join("3/2/2/3-2-2@2.png").is_file());
    }
}
