//! Product catalog service
//!
//! Owns the write path (insert + fan-out of one work item per image, fire
//! and forget), the cache-aside read path with sliding TTL, and filtered
//! listing. All collaborators are injected; the binaries own their
//! lifecycles.

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::cache::ProductCache;
use crate::db::ProductStore;
use crate::error::{AppError, Result};
use crate::kafka::WorkItemSink;
use crate::models::{CreateProductRequest, Product, ProductFilters, WorkItem};

pub struct ProductCatalog {
    store: Arc<dyn ProductStore>,
    cache: Arc<dyn ProductCache>,
    jobs: Arc<dyn WorkItemSink>,
}

impl ProductCatalog {
    pub fn new(
        store: Arc<dyn ProductStore>,
        cache: Arc<dyn ProductCache>,
        jobs: Arc<dyn WorkItemSink>,
    ) -> Self {
        Self { store, cache, jobs }
    }

    /// Persist a new product, then enqueue one work item per original image.
    ///
    /// Publish failures are logged and never surfaced to the caller; the
    /// response does not wait on the image pipeline.
    pub async fn create_product(&self, req: CreateProductRequest) -> Result<Product> {
        if req.product_name.trim().is_empty() {
            return Err(AppError::BadRequest("product_name is required".to_string()));
        }
        if req.product_price < 0.0 {
            return Err(AppError::BadRequest(
                "product_price must not be negative".to_string(),
            ));
        }

        let product = self.store.create_product(&req).await?;

        for image_url in &product.product_images {
            let item = WorkItem {
                product_id: product.product_id,
                image_url: image_url.clone(),
            };
            match self.jobs.publish(&item).await {
                Ok(()) => info!(
                    product_id = product.product_id,
                    image_url = %image_url,
                    "Image published for processing"
                ),
                Err(e) => error!(
                    product_id = product.product_id,
                    image_url = %image_url,
                    error = %e,
                    "Failed to publish image for processing"
                ),
            }
        }

        info!(product_id = product.product_id, "Product added successfully");
        Ok(product)
    }

    /// Cache-aside read. A hit refreshes the entry's TTL and is returned
    /// as-is, never re-validated against the store; staleness is bounded by
    /// the TTL. A miss reads through and repopulates. Cache infrastructure
    /// failures degrade to a store read.
    pub async fn get_product(&self, product_id: i32) -> Result<Product> {
        match self.cache.get(product_id).await {
            Ok(Some(product)) => {
                info!(product_id, cache_hit = true, "Cache hit for product");
                return Ok(product);
            }
            Ok(None) => {
                info!(product_id, cache_hit = false, "Cache miss for product");
            }
            Err(e) => {
                warn!(product_id, error = %e, "Cache read failed, falling back to store");
            }
        }

        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Product {product_id} not found")))?;

        if let Err(e) = self.cache.put(&product).await {
            warn!(product_id, error = %e, "Failed to populate product cache");
        }

        Ok(product)
    }

    /// Filtered listing; absent filters impose no constraint. Results are
    /// ordered by product id.
    pub async fn list_products(&self, filters: &ProductFilters) -> Result<Vec<Product>> {
        self.store.list_products(filters).await
    }
}
