use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::storage::KeyMode;

/// Settings shared by every storage engine, independent of the backend.
#[derive(Clone, Debug, PartialEq)]
pub struct StorageOptions {
    /// Zoom levels accepted by `put`.
    pub levels: BTreeSet<u8>,
    /// Metatile stride accepted by `put`.
    pub stride: u32,
    /// Mimetype accepted by `put`.
    pub mimetype: String,
    /// File extension of stored objects, derived from the serializer when unset.
    pub extension: Option<String>,
    /// Key prefix, e.g. a theme name.
    pub prefix: String,
    /// Reject writes and deletes.
    pub readonly: bool,
    /// Gzip objects and append `.gz` to the extension.
    pub gzip: bool,
    /// Directory layout of storage keys.
    pub mode: KeyMode,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            levels: (0..=22).collect(),
            stride: 1,
            mimetype: "image/png".to_string(),
            extension: None,
            prefix: String::new(),
            readonly: false,
            gzip: false,
            mode: KeyMode::default(),
        }
    }
}

/// Canned ACL applied to objects written to S3.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectPolicy {
    /// Readable by the bucket owner only.
    #[default]
    Private,
    /// Readable by anyone.
    PublicRead,
}

impl ObjectPolicy {
    /// The `x-amz-acl` header value.
    #[must_use]
    pub fn canned_acl(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::PublicRead => "public-read",
        }
    }
}

/// S3 storage class of written objects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageClass {
    /// The default class.
    #[default]
    Standard,
    /// Cheaper, less durable storage.
    ReducedRedundancy,
}

impl StorageClass {
    /// The `x-amz-storage-class` value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::ReducedRedundancy => "REDUCED_REDUNDANCY",
        }
    }
}
