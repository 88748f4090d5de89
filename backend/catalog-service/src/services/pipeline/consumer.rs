//! Kafka consumer for image-compression work items
//!
//! Delivery contract: at-least-once. Each partition keeps a ledger of
//! delivered offsets; when an item resolves (persisted or dead-lettered)
//! the ledger releases the highest offset with no unresolved predecessor,
//! and only that offset is stored for the periodic auto-commit. An item
//! that never resolves keeps its partition's stored offset behind it, so a
//! restart redelivers it instead of committing past it. Redelivered items
//! are absorbed by the idempotent append. In-flight items are capped by a
//! semaphore, which applies backpressure to the poll loop.

use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::ClientConfig;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};

use crate::error::{AppError, Result};
use crate::kafka::{DeadLetterSink, WorkItemProducer};
use crate::models::WorkItem;

use super::service::ImagePipeline;

/// Kafka consumer configuration
#[derive(Clone, Debug)]
pub struct WorkItemConsumerConfig {
    pub brokers: String,
    pub topic: String,
    pub group_id: String,
    /// Upper bound on concurrently processed items
    pub max_in_flight: usize,
}

impl Default for WorkItemConsumerConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            topic: "catalog.image.jobs".to_string(),
            group_id: "image-worker".to_string(),
            max_in_flight: 4,
        }
    }
}

/// Sink for resolved offsets, one stored offset per partition
pub trait OffsetStore: Send + Sync {
    fn store(&self, partition: i32, offset: i64) -> Result<()>;
}

struct ConsumerOffsetStore {
    consumer: Arc<StreamConsumer>,
    topic: String,
}

impl OffsetStore for ConsumerOffsetStore {
    fn store(&self, partition: i32, offset: i64) -> Result<()> {
        self.consumer
            .store_offset(&self.topic, partition, offset)
            .map_err(|e| AppError::Queue(format!("Failed to store offset: {e}")))
    }
}

#[derive(Default)]
struct PartitionLedger {
    in_flight: BTreeSet<i64>,
    resolved: BTreeSet<i64>,
    stored: Option<i64>,
}

/// Per-partition low-water-mark tracking for concurrently processed items.
///
/// An offset becomes storeable only once every delivered offset below it
/// has resolved, so items finishing out of order never move the stored
/// offset past an unresolved predecessor.
#[derive(Default)]
pub struct OffsetLedger {
    partitions: Mutex<HashMap<i32, PartitionLedger>>,
}

impl OffsetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a delivered offset before its item starts.
    pub fn begin(&self, partition: i32, offset: i64) {
        let mut partitions = self.partitions.lock().unwrap();
        partitions
            .entry(partition)
            .or_default()
            .in_flight
            .insert(offset);
    }

    /// Mark an offset resolved. Returns the new storeable offset when the
    /// low-water mark advanced, `None` while an earlier delivered offset
    /// is still unresolved.
    pub fn resolve(&self, partition: i32, offset: i64) -> Option<i64> {
        let mut partitions = self.partitions.lock().unwrap();
        let ledger = partitions.entry(partition).or_default();
        ledger.in_flight.remove(&offset);
        ledger.resolved.insert(offset);

        let candidate = match ledger.in_flight.iter().next() {
            Some(&lowest) => ledger.resolved.range(..lowest).next_back().copied(),
            None => ledger.resolved.iter().next_back().copied(),
        }?;

        if ledger.stored.map_or(true, |stored| candidate > stored) {
            ledger.stored = Some(candidate);
            ledger.resolved = ledger.resolved.split_off(&(candidate + 1));
            Some(candidate)
        } else {
            None
        }
    }
}

/// Resolves delivered messages: parse, process or dead-letter, then release
/// the item's offset through the ledger. Holds no broker handle of its own;
/// stored offsets go through the injected `OffsetStore`.
#[derive(Clone)]
pub struct WorkDispatcher {
    pipeline: Arc<ImagePipeline>,
    dead_letters: Arc<dyn DeadLetterSink>,
    offsets: Arc<dyn OffsetStore>,
    ledger: Arc<OffsetLedger>,
    limiter: Arc<Semaphore>,
    max_in_flight: usize,
}

impl WorkDispatcher {
    pub fn new(
        pipeline: Arc<ImagePipeline>,
        dead_letters: Arc<dyn DeadLetterSink>,
        offsets: Arc<dyn OffsetStore>,
        max_in_flight: usize,
    ) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            pipeline,
            dead_letters,
            offsets,
            ledger: Arc::new(OffsetLedger::new()),
            limiter: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
        }
    }

    /// Parse one delivered message and hand it to a bounded worker task.
    pub async fn dispatch(&self, partition: i32, offset: i64, payload: Option<Vec<u8>>) {
        let Some(payload) = payload else {
            debug!(partition, offset, "Empty message payload, skipping");
            self.release(partition, offset);
            return;
        };

        let item: WorkItem = match serde_json::from_slice(&payload) {
            Ok(item) => item,
            Err(e) => {
                // Malformed payloads are a per-message failure, never fatal
                warn!(partition, offset, error = %e, "Invalid work item payload, skipping");
                self.release(partition, offset);
                return;
            }
        };

        self.ledger.begin(partition, offset);

        // Backpressure: wait for a slot before pulling more work
        let permit = match self.limiter.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };

        let this = self.clone();
        tokio::spawn(async move {
            let _permit = permit;

            let resolved = match this.pipeline.process_item(&item).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(
                        product_id = item.product_id,
                        image_url = %item.image_url,
                        error = %e,
                        "Work item exhausted, routing to dead-letter topic"
                    );
                    match this
                        .dead_letters
                        .publish_dead_letter(&payload, &e.to_string())
                        .await
                    {
                        Ok(()) => true,
                        Err(publish_err) => {
                            error!(
                                product_id = item.product_id,
                                error = %publish_err,
                                "Dead-letter publish failed, item will be redelivered"
                            );
                            false
                        }
                    }
                }
            };

            if resolved {
                this.release(partition, offset);
            }
            // An unresolved item stays in the ledger, holding the stored
            // offset behind it until a restart or rebalance redelivers it.
        });
    }

    /// Mark an offset resolved; store the low-water mark if it advanced.
    fn release(&self, partition: i32, offset: i64) {
        if let Some(safe) = self.ledger.resolve(partition, offset) {
            if let Err(e) = self.offsets.store(partition, safe) {
                warn!(partition, offset = safe, error = %e, "Failed to store offset");
            }
        }
    }

    /// Wait for every in-flight item to finish.
    pub async fn drain(&self) {
        let _ = self.limiter.acquire_many(self.max_in_flight as u32).await;
    }
}

/// Kafka consumer driving the image pipeline
pub struct WorkItemConsumer {
    consumer: Arc<StreamConsumer>,
    dispatcher: WorkDispatcher,
    shutdown_rx: watch::Receiver<bool>,
}

impl WorkItemConsumer {
    /// Create and subscribe the consumer. Failure here is fatal to the
    /// worker process.
    pub fn new(
        config: &WorkItemConsumerConfig,
        pipeline: Arc<ImagePipeline>,
        producer: WorkItemProducer,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "true")
            .set("auto.commit.interval.ms", "5000")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "45000")
            .set("max.poll.interval.ms", "300000")
            .create()
            .map_err(|e| AppError::Queue(format!("Failed to create Kafka consumer: {e}")))?;

        consumer
            .subscribe(&[&config.topic])
            .map_err(|e| AppError::Queue(format!("Failed to subscribe to topic: {e}")))?;

        info!(
            brokers = %config.brokers,
            topic = %config.topic,
            group_id = %config.group_id,
            max_in_flight = config.max_in_flight,
            "Work item consumer initialized"
        );

        let consumer = Arc::new(consumer);
        let offsets = Arc::new(ConsumerOffsetStore {
            consumer: consumer.clone(),
            topic: config.topic.clone(),
        });
        let dispatcher =
            WorkDispatcher::new(pipeline, Arc::new(producer), offsets, config.max_in_flight);

        Ok(Self {
            consumer,
            dispatcher,
            shutdown_rx,
        })
    }

    /// Run the consumer loop until shutdown is signalled.
    pub async fn run(&mut self) -> Result<()> {
        info!("Starting work item consumer loop");

        loop {
            tokio::select! {
                changed = self.shutdown_rx.changed() => {
                    match changed {
                        Ok(()) if *self.shutdown_rx.borrow() => {
                            info!("Shutdown signal received, stopping consumer");
                            break;
                        }
                        Ok(()) => {}
                        Err(_) => {
                            // Sender gone; no further signal can arrive
                            warn!("Shutdown channel closed, stopping consumer");
                            break;
                        }
                    }
                }

                message = self.consumer.recv() => {
                    match message {
                        Ok(msg) => {
                            let partition = msg.partition();
                            let offset = msg.offset();
                            let payload = msg.payload().map(|p| p.to_vec());
                            drop(msg);
                            self.dispatcher.dispatch(partition, offset, payload).await;
                        }
                        Err(e) => {
                            // Per-poll failure, keep consuming
                            error!(error = %e, "Kafka consumer error");
                        }
                    }
                }
            }
        }

        // Let in-flight items finish before returning
        info!("Waiting for in-flight items to drain");
        self.dispatcher.drain().await;

        info!("Work item consumer stopped");
        Ok(())
    }
}
