//! Per-item pipeline orchestration
//!
//! Executes download -> compress -> upload -> persist for one work item.
//! Download, upload and persist carry a bounded retry with exponential
//! backoff; compression is deterministic, so it fails an item immediately.
//! A persist failure after a successful upload leaves an orphaned object,
//! which is logged with its key.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::cache::ProductCache;
use crate::db::{AppendOutcome, ProductStore};
use crate::error::{AppError, Result};
use crate::models::WorkItem;

use super::compressor::ImageCompressor;
use super::downloader::ImageFetcher;
use super::storage::{compressed_key, ObjectStore};

const RETRY_BASE_DELAY_MS: u64 = 100;

/// Image-compression pipeline over injected collaborators
pub struct ImagePipeline {
    fetcher: Arc<dyn ImageFetcher>,
    compressor: Arc<ImageCompressor>,
    object_store: Arc<dyn ObjectStore>,
    products: Arc<dyn ProductStore>,
    cache: Arc<dyn ProductCache>,
    max_attempts: u32,
}

impl ImagePipeline {
    pub fn new(
        fetcher: Arc<dyn ImageFetcher>,
        compressor: Arc<ImageCompressor>,
        object_store: Arc<dyn ObjectStore>,
        products: Arc<dyn ProductStore>,
        cache: Arc<dyn ProductCache>,
        max_attempts: u32,
    ) -> Self {
        Self {
            fetcher,
            compressor,
            object_store,
            products,
            cache,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Run the four stages for one work item.
    ///
    /// An error return means the item is exhausted: the caller routes it to
    /// the dead-letter topic. Other queued items are unaffected either way.
    pub async fn process_item(&self, item: &WorkItem) -> Result<()> {
        info!(
            product_id = item.product_id,
            image_url = %item.image_url,
            "Processing work item"
        );

        let original = self
            .with_retry("download", || self.fetcher.fetch(&item.image_url))
            .await?;

        let compressed = self.compressor.clone().compress_async(original).await?;

        let key = compressed_key(&item.image_url);
        let url = self
            .with_retry("upload", || {
                self.object_store.put_object(&key, compressed.clone())
            })
            .await?;

        let outcome = self
            .with_retry("persist", || {
                self.products
                    .append_compressed_image(item.product_id, &url)
            })
            .await
            .map_err(|e| {
                // Uploaded but never linked: permanent orphan if the item is
                // dead-lettered after this.
                error!(
                    product_id = item.product_id,
                    uploaded_key = %key,
                    error = %e,
                    "Persist failed after upload, object is orphaned"
                );
                e
            })?;

        match outcome {
            AppendOutcome::Appended => {
                info!(
                    product_id = item.product_id,
                    url = %url,
                    "Compressed image linked to product"
                );
                // Keep readers from serving the pre-append snapshot for a
                // full TTL. Invalidation failure is not an item failure.
                if let Err(e) = self.cache.invalidate(item.product_id).await {
                    warn!(
                        product_id = item.product_id,
                        error = %e,
                        "Failed to invalidate product cache entry"
                    );
                }
                Ok(())
            }
            AppendOutcome::Duplicate => {
                info!(
                    product_id = item.product_id,
                    url = %url,
                    "URL already linked, skipping redelivered item"
                );
                Ok(())
            }
            AppendOutcome::MissingProduct => Err(AppError::NotFound(format!(
                "Product {} not found for work item",
                item.product_id
            ))),
        }
    }

    async fn with_retry<T, F, Fut>(&self, stage: &'static str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let backoff =
                        Duration::from_millis(RETRY_BASE_DELAY_MS * 2u64.pow(attempt - 1));
                    warn!(
                        stage,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Stage failed, retrying after backoff"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
