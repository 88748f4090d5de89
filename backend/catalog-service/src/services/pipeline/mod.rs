//! Asynchronous image-compression pipeline
//!
//! One work item flows through four strictly ordered stages:
//! download -> compress -> upload -> persist. Items are independent; a
//! failure in one never affects another.

pub mod compressor;
pub mod consumer;
pub mod downloader;
pub mod service;
pub mod storage;

pub use compressor::{CompressError, ImageCompressor};
pub use consumer::{
    OffsetLedger, OffsetStore, WorkDispatcher, WorkItemConsumer, WorkItemConsumerConfig,
};
pub use downloader::{ImageDownloader, ImageFetcher};
pub use service::ImagePipeline;
pub use storage::{compressed_key, sanitize_key, ObjectStore, S3ObjectStore};
