//! Source image download
//!
//! Fetches original image bytes over plain HTTP with an explicit timeout.
//! Transport failures, timeouts and non-2xx responses are all recoverable
//! per-item errors.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;

use crate::error::{AppError, Result};

/// Seam between the pipeline and the network fetch
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}

/// HTTP downloader backed by a shared reqwest client
pub struct ImageDownloader {
    client: Client,
}

impl ImageDownloader {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for ImageDownloader {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Download(format!("timed out fetching {url}: {e}"))
            } else {
                AppError::Download(format!("failed to fetch {url}: {e}"))
            }
        })?;

        if !response.status().is_success() {
            return Err(AppError::Download(format!(
                "received status {} fetching {url}",
                response.status()
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| AppError::Download(format!("failed to read body of {url}: {e}")))
    }
}
