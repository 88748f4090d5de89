use anyhow::{Context, Result};
use async_trait::async_trait;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use std::sync::Arc;
use std::time::Duration;

use crate::models::WorkItem;

/// Seam between the write path and the queue, so the fan-out can be
/// exercised without a broker.
#[async_trait]
pub trait WorkItemSink: Send + Sync {
    async fn publish(&self, item: &WorkItem) -> Result<()>;
}

/// Seam between the worker and the dead-letter topic
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn publish_dead_letter(&self, payload: &[u8], reason: &str) -> Result<()>;
}

/// Kafka producer wrapper for image-compression work items.
///
/// The write path publishes one item per original image URL, fire-and-forget;
/// the worker uses the same producer to route exhausted items to the
/// dead-letter topic.
#[derive(Clone)]
pub struct WorkItemProducer {
    inner: Arc<FutureProducer>,
    topic: String,
    dead_letter_topic: String,
}

impl WorkItemProducer {
    pub fn new(brokers: &str, topic: &str, dead_letter_topic: &str) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("message.timeout.ms", "5000")
            .create()
            .with_context(|| format!("Failed to create Kafka producer for '{}'", topic))?;

        Ok(Self {
            inner: Arc::new(producer),
            topic: topic.to_string(),
            dead_letter_topic: dead_letter_topic.to_string(),
        })
    }

    /// Publish one work item, keyed by product id.
    pub async fn publish(&self, item: &WorkItem) -> Result<()> {
        let payload =
            serde_json::to_string(item).context("Failed to serialize work item payload")?;
        let key = item.product_id.to_string();

        let record = FutureRecord::to(&self.topic).key(&key).payload(&payload);

        self.inner
            .send(record, Duration::from_secs(10))
            .await
            .map_err(|(err, _)| anyhow::anyhow!("Failed to publish work item: {}", err))?;

        Ok(())
    }

    /// Route an item that exhausted its retry budget to the dead-letter topic.
    /// The original payload is preserved verbatim; the failure reason travels
    /// in a message header.
    pub async fn publish_dead_letter(&self, payload: &[u8], reason: &str) -> Result<()> {
        let headers = OwnedHeaders::new().insert(Header {
            key: "error",
            value: Some(reason),
        });

        let record = FutureRecord::<(), _>::to(&self.dead_letter_topic)
            .payload(payload)
            .headers(headers);

        self.inner
            .send(record, Duration::from_secs(10))
            .await
            .map_err(|(err, _)| anyhow::anyhow!("Failed to publish to dead-letter topic: {}", err))?;

        Ok(())
    }
}

#[async_trait]
impl WorkItemSink for WorkItemProducer {
    async fn publish(&self, item: &WorkItem) -> Result<()> {
        WorkItemProducer::publish(self, item).await
    }
}

#[async_trait]
impl DeadLetterSink for WorkItemProducer {
    async fn publish_dead_letter(&self, payload: &[u8], reason: &str) -> Result<()> {
        WorkItemProducer::publish_dead_letter(self, payload, reason).await
    }
}
