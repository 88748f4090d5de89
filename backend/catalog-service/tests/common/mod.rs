//! In-memory test doubles for the store, cache, queue and object storage
//! seams, plus an image fixture generator.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use catalog_service::cache::ProductCache;
use catalog_service::db::{AppendOutcome, ProductStore};
use catalog_service::error::{AppError, Result};
use catalog_service::kafka::{DeadLetterSink, WorkItemSink};
use catalog_service::models::{CreateProductRequest, Product, ProductFilters, WorkItem};
use catalog_service::services::pipeline::{ImageFetcher, ObjectStore, OffsetStore};

/// Small valid PNG for pipeline tests
pub fn png_fixture() -> Bytes {
    let img = image::RgbImage::from_fn(8, 8, |x, y| image::Rgb([x as u8 * 30, y as u8 * 30, 64]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .expect("encode fixture");
    Bytes::from(buf)
}

pub fn product(product_id: i32, images: &[&str]) -> Product {
    Product {
        product_id,
        user_id: 1,
        product_name: format!("product-{product_id}"),
        product_description: String::new(),
        product_images: images.iter().map(|s| s.to_string()).collect(),
        compressed_product_images: vec![],
        product_price: 10.0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

// ========================================
// Product store
// ========================================

#[derive(Default)]
pub struct InMemoryProductStore {
    rows: Mutex<HashMap<i32, Product>>,
    next_id: AtomicI32,
    get_calls: AtomicUsize,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            next_id: AtomicI32::new(1),
            get_calls: AtomicUsize::new(0),
        }
    }

    pub fn seed(&self, product: Product) {
        let mut rows = self.rows.lock().unwrap();
        self.next_id
            .fetch_max(product.product_id + 1, Ordering::SeqCst);
        rows.insert(product.product_id, product);
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self, product_id: i32) -> Option<Product> {
        self.rows.lock().unwrap().get(&product_id).cloned()
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn create_product(&self, req: &CreateProductRequest) -> Result<Product> {
        let product_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let product = Product {
            product_id,
            user_id: req.user_id,
            product_name: req.product_name.clone(),
            product_description: req.product_description.clone(),
            product_images: req.product_images.clone(),
            compressed_product_images: vec![],
            product_price: req.product_price,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.rows
            .lock()
            .unwrap()
            .insert(product_id, product.clone());
        Ok(product)
    }

    async fn get_product(&self, product_id: i32) -> Result<Option<Product>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.lock().unwrap().get(&product_id).cloned())
    }

    async fn list_products(&self, filters: &ProductFilters) -> Result<Vec<Product>> {
        let rows = self.rows.lock().unwrap();
        let mut products: Vec<Product> = rows
            .values()
            .filter(|p| filters.user_id.map_or(true, |id| p.user_id == id))
            .filter(|p| filters.min_price.map_or(true, |min| p.product_price >= min))
            .filter(|p| filters.max_price.map_or(true, |max| p.product_price <= max))
            .filter(|p| {
                filters.product_name.as_ref().map_or(true, |name| {
                    p.product_name
                        .to_lowercase()
                        .contains(&name.to_lowercase())
                })
            })
            .cloned()
            .collect();
        products.sort_by_key(|p| p.product_id);
        Ok(products)
    }

    async fn append_compressed_image(
        &self,
        product_id: i32,
        url: &str,
    ) -> Result<AppendOutcome> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&product_id) {
            None => Ok(AppendOutcome::MissingProduct),
            Some(product) if product.compressed_product_images.iter().any(|u| u == url) => {
                Ok(AppendOutcome::Duplicate)
            }
            Some(product) => {
                product.compressed_product_images.push(url.to_string());
                product.updated_at = Utc::now();
                Ok(AppendOutcome::Appended)
            }
        }
    }
}

// ========================================
// Product cache
// ========================================

/// In-memory stand-in for the Redis cache with sliding expiration
pub struct InMemoryProductCache {
    entries: Mutex<HashMap<i32, (Product, Instant)>>,
    ttl: Duration,
}

impl InMemoryProductCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn contains(&self, product_id: i32) -> bool {
        let entries = self.entries.lock().unwrap();
        entries
            .get(&product_id)
            .map_or(false, |(_, deadline)| Instant::now() < *deadline)
    }
}

#[async_trait]
impl ProductCache for InMemoryProductCache {
    async fn get(&self, product_id: i32) -> Result<Option<Product>> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(&product_id) {
            Some((product, deadline)) if Instant::now() < *deadline => {
                // Sliding expiration
                *deadline = Instant::now() + self.ttl;
                Ok(Some(product.clone()))
            }
            Some(_) => {
                entries.remove(&product_id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, product: &Product) -> Result<()> {
        self.entries.lock().unwrap().insert(
            product.product_id,
            (product.clone(), Instant::now() + self.ttl),
        );
        Ok(())
    }

    async fn invalidate(&self, product_id: i32) -> Result<()> {
        self.entries.lock().unwrap().remove(&product_id);
        Ok(())
    }
}

// ========================================
// Queue sinks
// ========================================

/// Records published work items
#[derive(Default)]
pub struct RecordingSink {
    items: Mutex<Vec<WorkItem>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> Vec<WorkItem> {
        self.items.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkItemSink for RecordingSink {
    async fn publish(&self, item: &WorkItem) -> anyhow::Result<()> {
        self.items.lock().unwrap().push(item.clone());
        Ok(())
    }
}

/// Sink whose publishes always fail (broker outage)
pub struct FailingSink;

#[async_trait]
impl WorkItemSink for FailingSink {
    async fn publish(&self, _item: &WorkItem) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("broker unavailable"))
    }
}

/// Records dead-lettered payloads with their failure reasons
#[derive(Default)]
pub struct RecordingDeadLetters {
    entries: Mutex<Vec<(Vec<u8>, String)>>,
}

impl RecordingDeadLetters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(Vec<u8>, String)> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeadLetterSink for RecordingDeadLetters {
    async fn publish_dead_letter(&self, payload: &[u8], reason: &str) -> anyhow::Result<()> {
        self.entries
            .lock()
            .unwrap()
            .push((payload.to_vec(), reason.to_string()));
        Ok(())
    }
}

/// Dead-letter sink whose publishes always fail
pub struct FailingDeadLetters;

#[async_trait]
impl DeadLetterSink for FailingDeadLetters {
    async fn publish_dead_letter(&self, _payload: &[u8], _reason: &str) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("dead-letter broker unavailable"))
    }
}

/// Records stored offsets in the order they were stored
#[derive(Default)]
pub struct RecordingOffsetStore {
    stored: Mutex<Vec<(i32, i64)>>,
}

impl RecordingOffsetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(&self) -> Vec<(i32, i64)> {
        self.stored.lock().unwrap().clone()
    }
}

impl OffsetStore for RecordingOffsetStore {
    fn store(&self, partition: i32, offset: i64) -> Result<()> {
        self.stored.lock().unwrap().push((partition, offset));
        Ok(())
    }
}

// ========================================
// Pipeline fakes
// ========================================

/// Fetcher that serves the PNG fixture, with per-URL injected failures and
/// optional fail-once behavior for retry tests
pub struct FlakyFetcher {
    failing_urls: Mutex<HashSet<String>>,
    fail_once_urls: Mutex<HashSet<String>>,
    calls: AtomicUsize,
}

impl FlakyFetcher {
    pub fn new() -> Self {
        Self {
            failing_urls: Mutex::new(HashSet::new()),
            fail_once_urls: Mutex::new(HashSet::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_always(self, url: &str) -> Self {
        self.failing_urls.lock().unwrap().insert(url.to_string());
        self
    }

    pub fn fail_once(self, url: &str) -> Self {
        self.fail_once_urls.lock().unwrap().insert(url.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageFetcher for FlakyFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.failing_urls.lock().unwrap().contains(url) {
            return Err(AppError::Download(format!("injected failure for {url}")));
        }
        if self.fail_once_urls.lock().unwrap().remove(url) {
            return Err(AppError::Download(format!("transient failure for {url}")));
        }
        Ok(png_fixture())
    }
}

/// Fetcher that holds responses for selected URLs until the gate opens,
/// for tests that need one item to outlive another
pub struct GatedFetcher {
    gated: HashSet<String>,
    open: tokio::sync::watch::Receiver<bool>,
}

impl GatedFetcher {
    pub fn new(gated_urls: &[&str]) -> (tokio::sync::watch::Sender<bool>, Self) {
        let (tx, rx) = tokio::sync::watch::channel(false);
        let fetcher = Self {
            gated: gated_urls.iter().map(|s| s.to_string()).collect(),
            open: rx,
        };
        (tx, fetcher)
    }
}

#[async_trait]
impl ImageFetcher for GatedFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        if self.gated.contains(url) {
            let mut open = self.open.clone();
            let _ = open.wait_for(|open| *open).await;
        }
        Ok(png_fixture())
    }
}

/// Object store keeping uploads in a map
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<String, Bytes>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put_object(&self, key: &str, data: Bytes) -> Result<String> {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), data);
        Ok(format!(
            "https://test-bucket.s3.us-east-1.amazonaws.com/{key}"
        ))
    }
}
