// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory broker backend.
//!
//! Every topic is a growable list of serialized messages. The message ID is
//! the zero-based position in that list. Offsets follow the log backend's
//! accounting used by subscription bookkeeping:
//!
//! | After N publishes | value |
//! |-------------------|-------|
//! | last message ID   | N - 1 |
//! | publish offset    | N     |
//! | `get_offset`      | N + 1 |

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, RwLock};
use tokio::time::Instant;
use tracing::{debug, info};

use super::{Broker, BrokerResult, PublishReceipt};
use crate::models::Message;

/// Default bound for non-immediate consumes.
pub const DEFAULT_CONSUME_WAIT: Duration = Duration::from_secs(5);

pub struct MemoryBroker {
    topics: RwLock<HashMap<String, Vec<String>>>,
    published: Notify,
    consume_wait: Duration,
    initialized: AtomicBool,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::with_consume_wait(DEFAULT_CONSUME_WAIT)
    }

    /// Broker whose non-immediate consumes wait at most `consume_wait`.
    pub fn with_consume_wait(consume_wait: Duration) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            published: Notify::new(),
            consume_wait,
            initialized: AtomicBool::new(false),
        }
    }

    async fn snapshot(&self, topic: &str, offset: i64) -> Vec<String> {
        let start = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
        let topics = self.topics.read().await;
        topics
            .get(topic)
            .map(|log| log.iter().skip(start).cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn initialize(&mut self, peers: &[String]) -> BrokerResult<()> {
        if !self.initialized.swap(true, Ordering::SeqCst) {
            info!(peers = peers.len(), "In-memory broker initialized");
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, mut message: Message) -> BrokerResult<PublishReceipt> {
        let receipt = {
            let mut topics = self.topics.write().await;
            let log = topics.entry(topic.to_string()).or_default();

            message.message_id = log.len().to_string();
            log.push(message.to_json()?);

            PublishReceipt {
                message_id: message.message_id,
                topic: topic.to_string(),
                partition: 0,
                offset: log.len() as i64,
            }
        };

        debug!(topic, message_id = %receipt.message_id, "Message appended");
        self.published.notify_waiters();
        Ok(receipt)
    }

    async fn get_offset(&self, topic: &str) -> BrokerResult<i64> {
        let topics = self.topics.read().await;
        let len = topics.get(topic).map(Vec::len).unwrap_or(0);
        Ok(len as i64 + 1)
    }

    async fn consume(&self, topic: &str, offset: i64, immediate: bool) -> BrokerResult<Vec<String>> {
        let deadline = Instant::now() + self.consume_wait;

        loop {
            // Register before reading so a publish between the read and the
            // wait is not missed.
            let notified = self.published.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let batch = self.snapshot(topic, offset).await;
            if immediate || !batch.is_empty() {
                return Ok(batch);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(batch);
            }
            if tokio::time::timeout(deadline - now, notified).await.is_err() {
                return Ok(self.snapshot(topic, offset).await);
            }
        }
    }

    async fn close_connections(&self) {
        self.topics.write().await.clear();
        self.initialized.store(false, Ordering::SeqCst);
        self.published.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn message(foo: &str) -> Message {
        let mut attributes = BTreeMap::new();
        attributes.insert("foo".to_string(), foo.to_string());
        Message::new("YmFzZTY0ZW5jb2RlZA==", attributes)
    }

    #[tokio::test]
    async fn offset_is_publish_count_plus_one() {
        let broker = MemoryBroker::new();
        assert_eq!(broker.get_offset("argo_uuid.topic1").await.unwrap(), 1);

        let mut previous: Option<i64> = None;
        for n in 1..=5 {
            let receipt = broker.publish("argo_uuid.topic1", message("bar")).await.unwrap();
            let id: i64 = receipt.message_id.parse().unwrap();
            if let Some(prev) = previous {
                assert!(prev < id);
            }
            previous = Some(id);
            assert_eq!(receipt.offset, n);
            assert_eq!(broker.get_offset("argo_uuid.topic1").await.unwrap(), n + 1);
        }
    }

    #[tokio::test]
    async fn topics_are_independent() {
        let broker = MemoryBroker::new();
        broker.publish("p.a", message("1")).await.unwrap();
        broker.publish("p.a", message("2")).await.unwrap();
        let receipt = broker.publish("p.b", message("3")).await.unwrap();

        assert_eq!(receipt.message_id, "0");
        assert_eq!(receipt.topic, "p.b");
        assert_eq!(broker.get_offset("p.a").await.unwrap(), 3);
        assert_eq!(broker.get_offset("p.b").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn first_publish_gets_id_zero_and_is_consumable() {
        let broker = MemoryBroker::new();
        let receipt = broker.publish("argo_uuid.topic1", message("bar")).await.unwrap();
        assert_eq!(receipt.message_id, "0");
        assert_eq!(receipt.partition, 0);

        let consumed = broker.consume("argo_uuid.topic1", 0, true).await.unwrap();
        assert_eq!(consumed.len(), 1);

        let stored: Message = serde_json::from_str(&consumed[0]).unwrap();
        assert_eq!(stored.message_id, "0");
        assert_eq!(stored.data, "YmFzZTY0ZW5jb2RlZA==");
        assert_eq!(stored.attributes.get("foo").map(String::as_str), Some("bar"));
    }

    #[tokio::test]
    async fn consume_starts_at_offset() {
        let broker = MemoryBroker::new();
        for foo in ["a", "b", "c"] {
            broker.publish("t", message(foo)).await.unwrap();
        }

        let tail = broker.consume("t", 1, true).await.unwrap();
        assert_eq!(tail.len(), 2);
        let first: Message = serde_json::from_str(&tail[0]).unwrap();
        assert_eq!(first.message_id, "1");

        assert!(broker.consume("t", 3, true).await.unwrap().is_empty());
        assert_eq!(broker.consume("t", -4, true).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn consecutive_immediate_consumes_are_identical() {
        let broker = MemoryBroker::new();
        broker.publish("t", message("a")).await.unwrap();
        broker.publish("t", message("b")).await.unwrap();

        let first = broker.consume("t", 0, true).await.unwrap();
        let second = broker.consume("t", 0, true).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn immediate_consume_of_unknown_topic_is_empty() {
        let broker = MemoryBroker::new();
        assert!(broker.consume("missing", 0, true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn waiting_consume_wakes_on_publish() {
        let broker = Arc::new(MemoryBroker::with_consume_wait(Duration::from_secs(5)));

        let waiter = {
            let broker = Arc::clone(&broker);
            tokio::spawn(async move { broker.consume("t", 0, false).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        broker.publish("t", message("late")).await.unwrap();

        let consumed = waiter.await.unwrap().unwrap();
        assert_eq!(consumed.len(), 1);
    }

    #[tokio::test]
    async fn waiting_consume_gives_up_after_bound() {
        let broker = MemoryBroker::with_consume_wait(Duration::from_millis(30));
        let started = std::time::Instant::now();
        let consumed = broker.consume("t", 0, false).await.unwrap();
        assert!(consumed.is_empty());
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn initialize_is_idempotent_and_close_is_safe() {
        let fresh = MemoryBroker::new();
        fresh.close_connections().await;

        let mut broker = MemoryBroker::new();
        broker.initialize(&["localhost:9092".to_string()]).await.unwrap();
        broker.initialize(&["localhost:9092".to_string()]).await.unwrap();
        broker.publish("t", message("a")).await.unwrap();
        broker.close_connections().await;
        assert_eq!(broker.get_offset("t").await.unwrap(), 1);
    }
}
