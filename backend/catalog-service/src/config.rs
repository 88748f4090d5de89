/// Configuration management for catalog-service
///
/// Loads configuration from environment variables with sensible defaults.
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub kafka: KafkaConfig,
    pub s3: S3Config,
    pub pipeline: PipelineConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub env: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CacheConfig {
    pub redis_url: String,
    /// Sliding TTL for cached products, in seconds
    pub product_ttl_secs: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct KafkaConfig {
    pub brokers: String,
    /// Durable topic carrying image-compression work items
    pub image_jobs_topic: String,
    /// Destination for items that exhausted their retry budget
    pub dead_letter_topic: String,
    pub group_id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PipelineConfig {
    /// JPEG re-encode quality (0-100)
    pub jpeg_quality: u8,
    /// Timeout for downloading a source image
    pub download_timeout_secs: u64,
    /// Retry budget per pipeline stage
    pub max_attempts: u32,
    /// Upper bound on concurrently processed work items
    pub max_in_flight: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Config {
            app: AppConfig {
                host: std::env::var("CATALOG_SERVICE_HOST")
                    .unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("CATALOG_SERVICE_PORT")
                    .unwrap_or_else(|_| "8082".to_string())
                    .parse()
                    .unwrap_or(8082),
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/catalog".to_string()),
                max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10),
                acquire_timeout_secs: env_parse("DATABASE_ACQUIRE_TIMEOUT_SECS", 5),
            },
            cache: CacheConfig {
                redis_url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost".to_string()),
                product_ttl_secs: env_parse("PRODUCT_CACHE_TTL_SECS", 600),
            },
            kafka: KafkaConfig {
                brokers: std::env::var("KAFKA_BROKERS")
                    .unwrap_or_else(|_| "localhost:9092".to_string()),
                image_jobs_topic: std::env::var("KAFKA_IMAGE_JOBS_TOPIC")
                    .unwrap_or_else(|_| "catalog.image.jobs".to_string()),
                dead_letter_topic: std::env::var("KAFKA_IMAGE_JOBS_DLQ_TOPIC")
                    .unwrap_or_else(|_| "catalog.image.jobs.dlq".to_string()),
                group_id: std::env::var("KAFKA_GROUP_ID")
                    .unwrap_or_else(|_| "image-worker".to_string()),
            },
            s3: S3Config {
                bucket: std::env::var("S3_BUCKET")
                    .unwrap_or_else(|_| "catalog-images".to_string()),
                region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                endpoint: std::env::var("S3_ENDPOINT").ok(),
            },
            pipeline: PipelineConfig {
                jpeg_quality: env_parse("IMAGE_JPEG_QUALITY", 50),
                download_timeout_secs: env_parse("DOWNLOAD_TIMEOUT_SECS", 30),
                max_attempts: env_parse("WORKER_MAX_ATTEMPTS", 3),
                max_in_flight: env_parse("WORKER_MAX_IN_FLIGHT", 4),
            },
        })
    }
}

fn env_parse<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
