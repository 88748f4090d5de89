//! Image Worker - queue consumer for asynchronous image compression
//!
//! Consumes work items published by the catalog API and, per item:
//! downloads the original image, re-encodes it as JPEG at a fixed quality,
//! uploads the result to object storage, appends the returned URL to the
//! product row and invalidates the product's cache entry.
//!
//! Environment variables (all optional, see `Config::from_env`):
//! - DATABASE_URL, REDIS_URL, KAFKA_BROKERS
//! - KAFKA_IMAGE_JOBS_TOPIC / KAFKA_IMAGE_JOBS_DLQ_TOPIC / KAFKA_GROUP_ID
//! - S3_BUCKET, AWS_REGION, S3_ENDPOINT
//! - IMAGE_JPEG_QUALITY, DOWNLOAD_TIMEOUT_SECS
//! - WORKER_MAX_ATTEMPTS, WORKER_MAX_IN_FLIGHT

use catalog_service::cache::RedisProductCache;
use catalog_service::db::PgProductStore;
use catalog_service::kafka::WorkItemProducer;
use catalog_service::services::pipeline::{
    ImageCompressor, ImageDownloader, ImagePipeline, S3ObjectStore, WorkItemConsumer,
    WorkItemConsumerConfig,
};
use catalog_service::Config;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("image_worker=info".parse().expect("valid directive"))
                .add_directive("catalog_service=info".parse().expect("valid directive")),
        )
        .init();

    info!("Starting Image Worker");

    dotenvy::dotenv().ok();
    let config = Config::from_env().map_err(|e| format!("{e}"))?;
    info!(
        brokers = %config.kafka.brokers,
        topic = %config.kafka.image_jobs_topic,
        bucket = %config.s3.bucket,
        "Configuration loaded"
    );

    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
        .connect(&config.database.url)
        .await
        .map_err(|e| format!("Failed to connect to database: {e}"))?;

    let redis_client = redis::Client::open(config.cache.redis_url.as_str())
        .map_err(|e| format!("Invalid REDIS_URL: {e}"))?;
    let cache = RedisProductCache::new(redis_client, Some(config.cache.product_ttl_secs))
        .await
        .map_err(|e| format!("Failed to initialize cache: {e}"))?;

    let object_store = S3ObjectStore::from_config(&config.s3).await;
    let downloader = ImageDownloader::new(Duration::from_secs(
        config.pipeline.download_timeout_secs,
    ))
    .map_err(|e| format!("{e}"))?;

    let pipeline = Arc::new(ImagePipeline::new(
        Arc::new(downloader),
        Arc::new(ImageCompressor::new(config.pipeline.jpeg_quality)),
        Arc::new(object_store),
        Arc::new(PgProductStore::new(db_pool)),
        Arc::new(cache),
        config.pipeline.max_attempts,
    ));
    info!("Image pipeline initialized");

    // Dead-letter publishing reuses the work-item producer
    let producer = WorkItemProducer::new(
        &config.kafka.brokers,
        &config.kafka.image_jobs_topic,
        &config.kafka.dead_letter_topic,
    )
    .map_err(|e| format!("{e}"))?;

    // Graceful shutdown on SIGINT
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for ctrl+c");
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let consumer_config = WorkItemConsumerConfig {
        brokers: config.kafka.brokers.clone(),
        topic: config.kafka.image_jobs_topic.clone(),
        group_id: config.kafka.group_id.clone(),
        max_in_flight: config.pipeline.max_in_flight,
    };
    let mut consumer =
        WorkItemConsumer::new(&consumer_config, pipeline, producer, shutdown_rx)
            .map_err(|e| format!("{e}"))?;
    info!("Kafka consumer initialized");

    if let Err(e) = consumer.run().await {
        error!(error = %e, "Consumer error");
    }

    info!("Image Worker stopped");
    Ok(())
}
