// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Broker Backends
//!
//! Offset-based contract shared by every message broker backend. The
//! dispatch layer only ever talks to [`Broker`], so handlers behave the same
//! against the durable log backend and the in-memory test backend.
//!
//! ## Backends
//!
//! - [`MemoryBroker`] - per-topic in-memory logs, used in tests and local runs
//! - `KafkaBroker` - log-based backend (cargo feature `kafka`)
//!
//! ## Sharing
//!
//! A broker is initialized once at startup, then shared as `Arc<dyn Broker>`
//! by all concurrent requests. Backends serialize conflicting operations
//! internally; the dispatch layer takes no lock of its own.

use async_trait::async_trait;

use crate::models::Message;

#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;

#[cfg(feature = "kafka")]
pub use kafka::KafkaBroker;
pub use memory::MemoryBroker;

/// Errors raised by broker backends.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// No peer responded while establishing the session
    #[error("no usable broker peer: {0}")]
    Unavailable(String),

    #[error("broker is not initialized")]
    NotInitialized,

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("consume failed: {0}")]
    Consume(String),

    #[error("offset lookup failed: {0}")]
    Offset(String),

    #[error("message serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type BrokerResult<T> = Result<T, BrokerError>;

/// Position assigned by the backend to a published message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub message_id: String,
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// Uniform publish/consume/offset contract.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Establish the backend session against `peers`.
    ///
    /// Calling it again on an initialized broker is a no-op. An error means
    /// the process cannot serve.
    async fn initialize(&mut self, peers: &[String]) -> BrokerResult<()>;

    /// Serialize `message` and append it to `topic`. The backend assigns the
    /// message ID and position.
    async fn publish(&self, topic: &str, message: Message) -> BrokerResult<PublishReceipt>;

    /// Next-available offset of `topic`.
    async fn get_offset(&self, topic: &str) -> BrokerResult<i64>;

    /// Raw messages at or after `offset`.
    ///
    /// With `immediate` set only what is available right now is returned.
    /// Otherwise the call may wait, bounded by the backend's configured wait,
    /// for at least one message. The result is finite; call again with an
    /// advanced offset for more.
    async fn consume(&self, topic: &str, offset: i64, immediate: bool) -> BrokerResult<Vec<String>>;

    /// Release every backend resource. Safe on a never-initialized broker.
    async fn close_connections(&self);
}
