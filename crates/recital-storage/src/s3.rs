use crate::keys::validate_key;
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};

/// S3 storage implementation
///
/// Works against AWS S3 and S3-compatible providers (MinIO, Supabase storage,
/// DigitalOcean Spaces) through `endpoint_url`. Credentials are read from the
/// standard AWS environment variables.
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
    region: String,
    endpoint_url: Option<String>,
    public_base_url: Option<String>,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    /// * `public_base_url` - Optional base URL objects are publicly served from
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
        public_base_url: Option<String>,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region.clone())
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage {
            store,
            bucket,
            region,
            endpoint_url,
            public_base_url,
        })
    }

    fn generate_url(&self, key: &str) -> String {
        public_url(
            &self.bucket,
            &self.region,
            self.endpoint_url.as_deref(),
            self.public_base_url.as_deref(),
            key,
        )
    }
}

/// Public URL of an object.
///
/// An explicit public base wins; S3-compatible endpoints use path-style
/// `{endpoint}/{bucket}/{key}`; plain AWS uses the virtual-hosted form.
fn public_url(
    bucket: &str,
    region: &str,
    endpoint: Option<&str>,
    public_base: Option<&str>,
    key: &str,
) -> String {
    if let Some(base) = public_base {
        return format!("{}/{}", base.trim_end_matches('/'), key);
    }
    match endpoint {
        Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key),
        None => format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key),
    }
}

#[async_trait]
impl Storage for S3Storage {
    #[tracing::instrument(skip(self, data), fields(bucket = %self.bucket, size_bytes = data.len()))]
    async fn store(
        &self,
        storage_key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<String> {
        validate_key(storage_key)?;
        let size = data.len() as u64;
        let location = Path::from(storage_key.to_string());

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let opts = PutOptions {
            attributes,
            ..Default::default()
        };

        let start = std::time::Instant::now();

        self.store
            .put_opts(&location, PutPayload::from(data), opts)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    key = %storage_key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                match e {
                    object_store::Error::AlreadyExists { .. } => {
                        StorageError::AlreadyExists(storage_key.to_string())
                    }
                    other => StorageError::UploadFailed(other.to_string()),
                }
            })?;

        tracing::info!(
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(self.generate_url(storage_key))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
