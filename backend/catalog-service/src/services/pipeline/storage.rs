//! Object storage for compressed images
//!
//! Uploads compressed bytes under a sanitized key derived from the original
//! image locator and returns a durable public URL.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use std::sync::Arc;
use tracing::info;

use crate::config::S3Config;
use crate::error::{AppError, Result};

/// Suffix appended to the sanitized base name of the original locator
const COMPRESSED_SUFFIX: &str = "_compressed.jpg";

/// Seam between the pipeline and object storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload one object, creating or overwriting it, and return its public URL
    async fn put_object(&self, key: &str, data: Bytes) -> Result<String>;
}

/// S3-backed object store
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Arc<Client>,
    bucket: String,
    region: String,
    endpoint: Option<String>,
}

impl S3ObjectStore {
    /// Build the store from configuration, resolving AWS credentials from the
    /// environment the way the SDK default chain does.
    pub async fn from_config(cfg: &S3Config) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(cfg.region.clone()));
        if let Some(ref endpoint) = cfg.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        info!(bucket = %cfg.bucket, region = %cfg.region, "S3 object store initialized");

        Self {
            client: Arc::new(Client::new(&sdk_config)),
            bucket: cfg.bucket.clone(),
            region: cfg.region.clone(),
            endpoint: cfg.endpoint.clone(),
        }
    }

    /// Publicly addressable URL for a stored key
    pub fn public_url(&self, key: &str) -> String {
        match self.endpoint {
            Some(ref endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), self.bucket, key),
            None => format!("https://{}.s3.{}.amazonaws.com/{}", self.bucket, self.region, key),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(&self, key: &str, data: Bytes) -> Result<String> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("image/jpeg")
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to upload {key}: {e}")))?;

        Ok(self.public_url(key))
    }
}

/// Replace characters that are unsafe in object keys (`?`, `&`, `=`, `%`,
/// space) with `_`.
pub fn sanitize_key(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '?' | '&' | '=' | '%' | ' ' => '_',
            other => other,
        })
        .collect()
}

/// Object key for the compressed rendition of an original image locator:
/// the sanitized base name plus a fixed suffix.
pub fn compressed_key(image_url: &str) -> String {
    let base = image_url.rsplit('/').next().unwrap_or(image_url);
    format!("{}{}", sanitize_key(base), COMPRESSED_SUFFIX)
}
