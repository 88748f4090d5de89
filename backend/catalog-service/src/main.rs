/// Catalog Service - HTTP Server
///
/// Serves product CRUD and the cache-aside read path. Image compression is
/// handled out-of-band by the `image-worker` binary consuming the work items
/// published here.
use actix_web::{middleware as actix_middleware, web, App, HttpResponse, HttpServer};
use catalog_service::cache::RedisProductCache;
use catalog_service::db::PgProductStore;
use catalog_service::handlers;
use catalog_service::kafka::WorkItemProducer;
use catalog_service::services::ProductCatalog;
use catalog_service::Config;
use sqlx::postgres::PgPoolOptions;
use std::io;
use std::sync::Arc;
use std::time::Duration;

#[actix_web::main]
async fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("Invalid config: {e}")))?;

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!(address = %bind_address, env = %config.app.env, "Catalog service starting");

    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
        .connect(&config.database.url)
        .await
        .map_err(|e| {
            io::Error::new(
                io::ErrorKind::Other,
                format!("Failed to connect to database: {e}"),
            )
        })?;

    sqlx::migrate!()
        .run(&db_pool)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("Migration failed: {e}")))?;

    let redis_client = redis::Client::open(config.cache.redis_url.as_str())
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("Invalid REDIS_URL: {e}")))?;
    let cache = RedisProductCache::new(redis_client, Some(config.cache.product_ttl_secs))
        .await
        .map_err(|e| {
            io::Error::new(
                io::ErrorKind::Other,
                format!("Failed to initialize cache: {e}"),
            )
        })?;

    let producer = WorkItemProducer::new(
        &config.kafka.brokers,
        &config.kafka.image_jobs_topic,
        &config.kafka.dead_letter_topic,
    )
    .map_err(|e| {
        io::Error::new(
            io::ErrorKind::Other,
            format!("Failed to create Kafka producer: {e}"),
        )
    })?;

    let catalog = web::Data::new(ProductCatalog::new(
        Arc::new(PgProductStore::new(db_pool)),
        Arc::new(cache),
        Arc::new(producer),
    ));

    HttpServer::new(move || {
        App::new()
            .app_data(catalog.clone())
            .wrap(actix_middleware::Logger::default())
            .route(
                "/api/v1/health",
                web::get()
                    .to(|| async { HttpResponse::Ok().json(serde_json::json!({"status": "ok"})) }),
            )
            .service(
                web::scope("/api/v1/products")
                    .route("", web::get().to(handlers::list_products))
                    .route("", web::post().to(handlers::create_product))
                    .route("/{product_id}", web::get().to(handlers::get_product)),
            )
    })
    .bind(&bind_address)?
    .run()
    .await
}
