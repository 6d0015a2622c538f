//! Broker client seams.
//!
//! Producers are shared and must accept concurrent `send` calls. Consumers are
//! owned by a single worker loop; `poll` and `commit` are never called
//! concurrently on the same instance.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BrokerError {
    #[error("broker unavailable: {0}")]
    Unavailable(String),
    #[error("unknown topic: {0}")]
    UnknownTopic(String),
    #[error("partition {partition} does not exist for topic {topic}")]
    InvalidPartition { topic: String, partition: u32 },
    #[error("client is closed")]
    Closed,
    #[error("broker storage error: {0}")]
    Storage(String),
}

/// A record to publish. `partition: None` lets the broker pick one from the key.
#[derive(Debug, Clone)]
pub struct OutboundRecord {
    pub topic: String,
    pub partition: Option<u32>,
    pub key: String,
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMetadata {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
}

/// A record handed to a consumer.
#[derive(Debug, Clone)]
pub struct InboundRecord {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
    pub key: String,
    pub payload: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicDescription {
    pub name: String,
    pub partitions: u32,
}

#[async_trait]
pub trait ProducerClient: Send + Sync {
    async fn send(&self, record: OutboundRecord) -> Result<RecordMetadata, BrokerError>;

    /// Wait for in-flight sends to complete.
    async fn flush(&self) -> Result<(), BrokerError>;
}

#[async_trait]
pub trait ConsumerClient: Send {
    /// Wait up to `timeout` for records. An empty batch means the wait expired.
    async fn poll(&mut self, timeout: Duration) -> Result<Vec<InboundRecord>, BrokerError>;

    /// Commit the positions of every record returned by previous polls.
    async fn commit(&mut self) -> Result<(), BrokerError>;

    /// Leave the group. Uncommitted records will be delivered again.
    async fn close(&mut self);
}

#[async_trait]
pub trait BrokerAdmin: Send + Sync {
    async fn describe_topic(&self, topic: &str) -> Result<TopicDescription, BrokerError>;
}

#[async_trait]
pub trait BrokerConnector: Send + Sync {
    async fn create_producer(&self) -> Result<Arc<dyn ProducerClient>, BrokerError>;

    async fn create_consumer(
        &self,
        group_id: &str,
        topic: &str,
        max_poll_records: usize,
    ) -> Result<Box<dyn ConsumerClient>, BrokerError>;
}

/// Partition for a record key, compatible with the Kafka default partitioner.
pub fn partition_for_key(key: &str, partitions: u32) -> u32 {
    (murmur2(key.as_bytes()) & 0x7fff_ffff) % partitions.max(1)
}

/// 32-bit murmur2 with Kafka's seed.
pub fn murmur2(data: &[u8]) -> u32 {
    const SEED: u32 = 0x9747_b28c;
    const M: u32 = 0x5bd1_e995;
    const R: u32 = 24;

    let mut h = SEED ^ data.len() as u32;
    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);
        h = h.wrapping_mul(M);
        h ^= k;
    }

    let tail = chunks.remainder();
    if tail.len() >= 3 {
        h ^= (tail[2] as u32) << 16;
    }
    if tail.len() >= 2 {
        h ^= (tail[1] as u32) << 8;
    }
    if !tail.is_empty() {
        h ^= tail[0] as u32;
        h = h.wrapping_mul(M);
    }

    h ^= h >> 13;
    h = h.wrapping_mul(M);
    h ^= h >> 15;
    h
}
