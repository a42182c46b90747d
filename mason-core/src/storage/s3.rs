use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use http::{HeaderMap, HeaderValue};
use mason_tile_utils::TileData;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::{
    Attribute, AttributeValue, Attributes, ClientOptions, Error as ObjectError, ObjectStore,
    ObjectStoreExt as _, PutOptions, PutPayload, Result as ObjectResult,
};
use tokio::runtime::{Builder, Runtime};
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::storage::{
    ObjectMetadata, ObjectPolicy, StorageBackend, StorageClass, StorageError, StorageResult,
};

const ETAG_ATTRIBUTE: &str = "etag";
const MTIME_ATTRIBUTE: &str = "mtime";
const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Default time limit for a single object storage request.
pub const DEFAULT_S3_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for an S3 compatible bucket.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct S3Options {
    /// Bucket name.
    pub bucket: String,
    /// Bucket region, taken from `AWS_REGION` when unset.
    pub region: Option<String>,
    /// Custom endpoint for S3 compatible services.
    pub endpoint: Option<String>,
    /// Canned ACL of written objects.
    pub policy: ObjectPolicy,
    /// Storage class of written objects.
    pub storage_class: StorageClass,
    /// Time limit for each request, [`DEFAULT_S3_TIMEOUT`] when unset.
    pub timeout: Option<Duration>,
}

/// Stores blobs in an object store.
///
/// Requests are driven by a private single-threaded runtime, so the backend must not be
/// used from within an async context.
#[derive(Debug)]
pub struct S3Backend {
    store: Arc<dyn ObjectStore>,
    runtime: Runtime,
    storage_class: StorageClass,
    timeout: Duration,
}

impl S3Backend {
    /// Connects to an S3 bucket. Credentials are read from the standard `AWS_*`
    /// environment variables.
    pub fn connect(options: &S3Options) -> StorageResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-amz-acl",
            HeaderValue::from_static(options.policy.canned_acl()),
        );
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&options.bucket)
            .with_client_options(ClientOptions::new().with_default_headers(headers));
        if let Some(region) = &options.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &options.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }
        let store = builder
            .build()
            .map_err(|e| StorageError::ObjectStoreError(e, options.bucket.clone()))?;
        debug!(
            "Using S3 storage in bucket {} with {} objects",
            options.bucket,
            options.policy.canned_acl()
        );
        Self::new(Arc::new(store), options)
    }

    /// Wraps an existing object store.
    pub fn new(store: Arc<dyn ObjectStore>, options: &S3Options) -> StorageResult<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(StorageError::RuntimeError)?;
        Ok(Self {
            store,
            runtime,
            storage_class: options.storage_class,
            timeout: options.timeout.unwrap_or(DEFAULT_S3_TIMEOUT),
        })
    }

    /// Runs a request to completion, bounded by the configured timeout.
    fn run<T>(
        &self,
        key: &str,
        request: impl Future<Output = ObjectResult<T>>,
    ) -> StorageResult<ObjectResult<T>> {
        self.runtime
            .block_on(async { timeout(self.timeout, request).await })
            .map_err(|_| StorageError::Timeout(self.timeout, key.to_string()))
    }
}

fn http_date(mtime: f64) -> Option<String> {
    let secs = mtime.floor();
    let nanos = ((mtime - secs) * 1e9) as u32;
    DateTime::<Utc>::from_timestamp(secs as i64, nanos).map(|t| t.format(HTTP_DATE).to_string())
}

fn parse_http_date(value: &str) -> Option<f64> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|t| t.timestamp() as f64)
}

fn object_error(key: &str) -> impl FnOnce(ObjectError) -> StorageError + '_ {
    move |e| StorageError::ObjectStoreError(e, key.to_string())
}

impl StorageBackend for S3Backend {
    fn exists(&self, key: &str) -> StorageResult<bool> {
        match self.run(key, self.store.head(&Path::from(key)))? {
            Ok(_) => Ok(true),
            Err(ObjectError::NotFound { .. }) => Ok(false),
            Err(e) => Err(object_error(key)(e)),
        }
    }

    fn retrieve(&self, key: &str) -> StorageResult<Option<(TileData, ObjectMetadata)>> {
        let path = Path::from(key);
        let request = async {
            let result = self.store.get(&path).await?;
            let attributes = result.attributes.clone();
            let last_modified = result.meta.last_modified;
            let data = result.bytes().await?;
            Ok::<_, ObjectError>((data, attributes, last_modified))
        };
        let (data, attributes, last_modified) = match self.run(key, request)? {
            Ok(found) => found,
            Err(ObjectError::NotFound { .. }) => {
                trace!("No stored object at {key}");
                return Ok(None);
            }
            Err(e) => return Err(object_error(key)(e)),
        };

        let attribute = |name: &'static str| -> Option<String> {
            attributes
                .get(&Attribute::Metadata(name.into()))
                .map(|v| v.to_string())
        };
        let mtime = attribute(MTIME_ATTRIBUTE)
            .as_deref()
            .and_then(parse_http_date)
            .unwrap_or_else(|| last_modified.timestamp() as f64);
        let metadata = ObjectMetadata {
            mimetype: attributes
                .get(&Attribute::ContentType)
                .map(|v| v.to_string()),
            etag: attribute(ETAG_ATTRIBUTE),
            mtime: Some(mtime),
        };
        Ok(Some((data.to_vec(), metadata)))
    }

    fn store(&self, key: &str, blob: &[u8], metadata: &ObjectMetadata) -> StorageResult<()> {
        let mut attributes = Attributes::new();
        if let Some(mimetype) = &metadata.mimetype {
            attributes.insert(Attribute::ContentType, AttributeValue::from(mimetype.clone()));
        }
        if let Some(etag) = &metadata.etag {
            attributes.insert(
                Attribute::Metadata(ETAG_ATTRIBUTE.into()),
                AttributeValue::from(etag.clone()),
            );
        }
        if let Some(mtime) = metadata.mtime.and_then(http_date) {
            attributes.insert(
                Attribute::Metadata(MTIME_ATTRIBUTE.into()),
                AttributeValue::from(mtime),
            );
        }
        attributes.insert(
            Attribute::StorageClass,
            AttributeValue::from(self.storage_class.as_str()),
        );
        let options = PutOptions {
            attributes,
            ..PutOptions::default()
        };

        let payload = PutPayload::from(blob.to_vec());
        self.run(key, self.store.put_opts(&Path::from(key), payload, options))?
            .map_err(object_error(key))?;
        trace!("Stored {} bytes at {key}", blob.len());
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        match self.run(key, self.store.delete(&Path::from(key)))? {
            Ok(()) | Err(ObjectError::NotFound { .. }) => Ok(()),
            Err(e) => Err(object_error(key)(e)),
        }
    }
}
