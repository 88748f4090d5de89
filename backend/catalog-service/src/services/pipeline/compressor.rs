//! Image compression - re-encodes source images as JPEG at a fixed quality
//!
//! Pure function over its inputs: the same bytes and quality always produce
//! byte-identical output. Decode and encode failures are distinct internally
//! so logs can tell them apart, but callers see a single transform failure.
//!
//! Uses `spawn_blocking` for the CPU-intensive work to avoid blocking the
//! async runtime.

use bytes::Bytes;
use image::ImageOutputFormat;
use std::io::Cursor;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::error::{AppError, Result};

/// Internal, stage-distinct transform failure
#[derive(Debug, Error)]
pub enum CompressError {
    #[error("failed to decode image: {0}")]
    Decode(image::ImageError),
    #[error("failed to encode image: {0}")]
    Encode(image::ImageError),
}

impl CompressError {
    fn stage(&self) -> &'static str {
        match self {
            CompressError::Decode(_) => "decode",
            CompressError::Encode(_) => "encode",
        }
    }
}

/// JPEG re-encoder with a fixed target quality
pub struct ImageCompressor {
    quality: u8,
}

impl ImageCompressor {
    /// Create a compressor with the given JPEG quality (0-100)
    pub fn new(quality: u8) -> Self {
        Self { quality }
    }

    /// Re-encode the given image bytes as JPEG (blocking version)
    ///
    /// **Note:** CPU-intensive; call `compress_async` from async code.
    pub fn compress(&self, data: &[u8]) -> std::result::Result<Bytes, CompressError> {
        let img = image::load_from_memory(data).map_err(CompressError::Decode)?;

        let mut buf = Vec::new();
        img.write_to(
            &mut Cursor::new(&mut buf),
            ImageOutputFormat::Jpeg(self.quality),
        )
        .map_err(CompressError::Encode)?;

        Ok(Bytes::from(buf))
    }

    /// Re-encode on a blocking thread pool
    pub async fn compress_async(self: Arc<Self>, data: Bytes) -> Result<Bytes> {
        let compressor = self.clone();

        let outcome = tokio::task::spawn_blocking(move || compressor.compress(&data))
            .await
            .map_err(|e| AppError::Internal(format!("Compression task panicked: {e}")))?;

        outcome.map_err(|e| {
            warn!(stage = e.stage(), error = %e, "Image transform failed");
            AppError::ImageProcessing(e.to_string())
        })
    }
}
