// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Kafka broker backend.
//!
//! Topics live on partition 0; the partition offset is the message ID.
//! The producer is configured for:
//! - Idempotent, all-replica acknowledged writes
//! - Bounded delivery timeout so a stuck cluster fails the request
//!
//! librdkafka calls block, so offset lookups and consumes run on the
//! blocking pool.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::{Message as _, Offset, TopicPartitionList};
use tracing::{error, info, warn};

use super::{Broker, BrokerError, BrokerResult, PublishReceipt};
use crate::models::Message;

const PARTITION: i32 = 0;
const METADATA_TIMEOUT: Duration = Duration::from_secs(5);
const SEND_TIMEOUT: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

struct Session {
    producer: FutureProducer,
    offsets: Arc<BaseConsumer>,
    consumer_config: ClientConfig,
}

pub struct KafkaBroker {
    session: RwLock<Option<Arc<Session>>>,
    consume_wait: Duration,
}

impl KafkaBroker {
    pub fn new(consume_wait: Duration) -> Self {
        Self {
            session: RwLock::new(None),
            consume_wait,
        }
    }

    fn session(&self) -> BrokerResult<Arc<Session>> {
        self.session
            .read()
            .map_err(|_| BrokerError::NotInitialized)?
            .clone()
            .ok_or(BrokerError::NotInitialized)
    }

    fn connect(peers: &[String]) -> BrokerResult<Session> {
        let servers = peers.join(",");

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &servers)
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set("request.timeout.ms", "30000")
            .set("delivery.timeout.ms", "120000")
            .create()
            .map_err(|e| BrokerError::Unavailable(e.to_string()))?;

        producer
            .client()
            .fetch_metadata(None, METADATA_TIMEOUT)
            .map_err(|e| BrokerError::Unavailable(format!("{servers}: {e}")))?;

        let mut consumer_config = ClientConfig::new();
        consumer_config
            .set("bootstrap.servers", &servers)
            .set("group.id", "pubsub-dispatch")
            .set("enable.auto.commit", "false")
            .set("enable.partition.eof", "false");

        let offsets: BaseConsumer = consumer_config
            .create()
            .map_err(|e| BrokerError::Unavailable(e.to_string()))?;

        Ok(Session {
            producer,
            offsets: Arc::new(offsets),
            consumer_config,
        })
    }
}

/// Rewrite the stored payload so its `messageId` carries the record offset.
fn with_offset_id(payload: &str, offset: i64) -> BrokerResult<String> {
    let mut message: Message = serde_json::from_str(payload)?;
    message.message_id = offset.to_string();
    Ok(message.to_json()?)
}

#[async_trait]
impl Broker for KafkaBroker {
    async fn initialize(&mut self, peers: &[String]) -> BrokerResult<()> {
        if self.session().is_ok() {
            return Ok(());
        }
        if peers.is_empty() {
            return Err(BrokerError::Unavailable("no peers configured".to_string()));
        }

        info!(peers = %peers.join(","), "Connecting to Kafka");
        let owned = peers.to_vec();
        let session = tokio::task::spawn_blocking(move || Self::connect(&owned))
            .await
            .map_err(|e| BrokerError::Unavailable(e.to_string()))??;

        let slot = self
            .session
            .get_mut()
            .map_err(|_| BrokerError::NotInitialized)?;
        *slot = Some(Arc::new(session));
        info!("Kafka broker initialized");
        Ok(())
    }

    async fn publish(&self, topic: &str, message: Message) -> BrokerResult<PublishReceipt> {
        let session = self.session()?;
        let payload = message.to_json()?;
        let record: FutureRecord<'_, (), String> = FutureRecord::to(topic)
            .partition(PARTITION)
            .payload(&payload);

        match session
            .producer
            .send(record, Timeout::After(SEND_TIMEOUT))
            .await
        {
            Ok((partition, offset)) => Ok(PublishReceipt {
                message_id: offset.to_string(),
                topic: topic.to_string(),
                partition,
                offset,
            }),
            Err((e, _)) => {
                error!(error = %e, topic, "Failed to publish to Kafka");
                Err(BrokerError::Publish(e.to_string()))
            }
        }
    }

    async fn get_offset(&self, topic: &str) -> BrokerResult<i64> {
        let session = self.session()?;
        let topic = topic.to_string();

        tokio::task::spawn_blocking(move || {
            session
                .offsets
                .fetch_watermarks(&topic, PARTITION, METADATA_TIMEOUT)
                .map(|(_, high)| high)
                .map_err(|e| BrokerError::Offset(e.to_string()))
        })
        .await
        .map_err(|e| BrokerError::Offset(e.to_string()))?
    }

    async fn consume(&self, topic: &str, offset: i64, immediate: bool) -> BrokerResult<Vec<String>> {
        let session = self.session()?;
        let topic = topic.to_string();
        let wait = if immediate {
            METADATA_TIMEOUT
        } else {
            self.consume_wait
        };

        tokio::task::spawn_blocking(move || drain(&session, &topic, offset, immediate, wait))
            .await
            .map_err(|e| BrokerError::Consume(e.to_string()))?
    }

    async fn close_connections(&self) {
        let session = match self.session.write() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(session) = session {
            if let Err(e) = session.producer.flush(METADATA_TIMEOUT) {
                warn!(error = %e, "Kafka producer flush failed during shutdown");
            }
            info!("Kafka connections closed");
        }
    }
}

fn drain(
    session: &Session,
    topic: &str,
    offset: i64,
    immediate: bool,
    wait: Duration,
) -> BrokerResult<Vec<String>> {
    let (low, high) = session
        .offsets
        .fetch_watermarks(topic, PARTITION, METADATA_TIMEOUT)
        .map_err(|e| BrokerError::Consume(e.to_string()))?;

    let start = offset.max(low);
    if immediate && start >= high {
        return Ok(Vec::new());
    }

    let consumer: BaseConsumer = session
        .consumer_config
        .create()
        .map_err(|e| BrokerError::Consume(e.to_string()))?;

    let mut assignment = TopicPartitionList::new();
    assignment
        .add_partition_offset(topic, PARTITION, Offset::Offset(start))
        .map_err(|e| BrokerError::Consume(e.to_string()))?;
    consumer
        .assign(&assignment)
        .map_err(|e| BrokerError::Consume(e.to_string()))?;

    let deadline = Instant::now() + wait;
    let mut next = start;
    let mut batch = Vec::new();

    while Instant::now() < deadline {
        if next >= high && (immediate || !batch.is_empty()) {
            break;
        }
        match consumer.poll(POLL_INTERVAL) {
            Some(Ok(record)) => {
                next = record.offset() + 1;
                match record.payload_view::<str>() {
                    Some(Ok(payload)) => batch.push(with_offset_id(payload, record.offset())?),
                    Some(Err(e)) => {
                        warn!(error = %e, offset = record.offset(), "Skipping non UTF-8 record")
                    }
                    None => {}
                }
            }
            Some(Err(e)) => return Err(BrokerError::Consume(e.to_string())),
            None => {}
        }
    }

    Ok(batch)
}
