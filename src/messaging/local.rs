//! In-process partitioned broker with an optional sled journal.
//!
//! Topics are append-only partition logs. Consumers join a group and own the
//! partitions whose index modulo the member count equals their member index.
//! Read positions live in the consumer until `commit`; closing a consumer
//! without committing makes its records visible to the group again.
//!
//! Once every group on a topic has committed past a record it is dropped.
//! Capped topics also keep at most `max_records` per partition. With a
//! journal, records and commits are written to disk before they are
//! acknowledged and reloaded by [`LocalBroker::open`].

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::broker::{
    partition_for_key, BrokerAdmin, BrokerConnector, BrokerError, ConsumerClient, InboundRecord,
    OutboundRecord, ProducerClient, RecordMetadata, TopicDescription,
};
use super::journal::{Journal, StoredRecord, TopicMeta};

#[derive(Debug, Default)]
struct PartitionLog {
    /// Offset of the first retained record.
    base: u64,
    records: VecDeque<StoredRecord>,
}

impl PartitionLog {
    fn next_offset(&self) -> u64 {
        self.base + self.records.len() as u64
    }

    fn get(&self, offset: u64) -> Option<&StoredRecord> {
        let index = offset.checked_sub(self.base)?;
        self.records.get(index as usize)
    }

    /// Drop every record below `offset`. Returns false when nothing changed.
    fn trim_to(&mut self, offset: u64) -> bool {
        let offset = offset.min(self.next_offset());
        if offset <= self.base {
            return false;
        }
        self.records.drain(..(offset - self.base) as usize);
        self.base = offset;
        true
    }
}

#[derive(Debug)]
struct TopicLog {
    partitions: Vec<PartitionLog>,
    retention: Option<usize>,
}

#[derive(Debug, Default)]
struct ConsumerGroup {
    committed: HashMap<u32, u64>,
    members: Vec<u64>,
}

#[derive(Debug)]
struct BrokerState {
    topics: HashMap<String, TopicLog>,
    /// Keyed by (group id, topic).
    groups: HashMap<(String, String), ConsumerGroup>,
    available: bool,
    next_member_id: u64,
}

impl BrokerState {
    fn new() -> Self {
        Self {
            topics: HashMap::new(),
            groups: HashMap::new(),
            available: true,
            next_member_id: 0,
        }
    }
}

struct Shared {
    state: Mutex<BrokerState>,
    notify: Notify,
    journal: Option<Journal>,
}

/// Cloneable handle to one broker instance.
#[derive(Clone)]
pub struct LocalBroker {
    shared: Arc<Shared>,
}

impl Default for LocalBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalBroker {
    /// Broker whose log lives in memory only.
    pub fn new() -> Self {
        Self::with_state(BrokerState::new(), None)
    }

    /// Broker journalled under `path`, reloading whatever an earlier run left.
    ///
    /// Uncommitted records of the previous run are delivered again.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BrokerError> {
        let path = path.as_ref();
        let journal = Journal::open(path)?;
        let snapshot = journal.restore()?;

        let mut state = BrokerState::new();
        let mut pending = 0;
        for topic in snapshot.topics {
            let partitions: Vec<PartitionLog> = topic
                .partitions
                .into_iter()
                .map(|partition| PartitionLog {
                    base: partition.base,
                    records: partition.records.into(),
                })
                .collect();
            pending += partitions.iter().map(|p| p.records.len()).sum::<usize>();

            state.topics.insert(
                topic.name,
                TopicLog {
                    partitions,
                    retention: topic.meta.retention,
                },
            );
        }
        for (key, committed) in snapshot.committed {
            state.groups.insert(
                key,
                ConsumerGroup {
                    committed,
                    members: Vec::new(),
                },
            );
        }

        log::info!(
            "Broker journal opened at {} - {} topics, {} retained records",
            path.display(),
            state.topics.len(),
            pending
        );
        Ok(Self::with_state(state, Some(journal)))
    }

    fn with_state(state: BrokerState, journal: Option<Journal>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                notify: Notify::new(),
                journal,
            }),
        }
    }

    pub fn is_durable(&self) -> bool {
        self.shared.journal.is_some()
    }

    /// Create `name` with `partitions` partitions. Existing topics are left untouched.
    pub fn create_topic(&self, name: &str, partitions: u32) -> Result<(), BrokerError> {
        self.add_topic(name, partitions, None)
    }

    /// Like [`create_topic`](Self::create_topic), keeping at most `max_records`
    /// per partition.
    pub fn create_capped_topic(&self, name: &str, partitions: u32, max_records: usize) -> Result<(), BrokerError> {
        self.add_topic(name, partitions, Some(max_records.max(1)))
    }

    fn add_topic(&self, name: &str, partitions: u32, retention: Option<usize>) -> Result<(), BrokerError> {
        let partitions = partitions.max(1);
        let mut state = self.shared.state.lock();

        if let Some(existing) = state.topics.get(name) {
            if existing.partitions.len() as u32 != partitions {
                log::warn!(
                    "Topic '{}' already has {} partitions, ignoring requested {}",
                    name,
                    existing.partitions.len(),
                    partitions
                );
            }
            return Ok(());
        }

        if let Some(journal) = &self.shared.journal {
            journal.save_topic(name, TopicMeta { partitions, retention })?;
        }

        let mut log_partitions = Vec::with_capacity(partitions as usize);
        log_partitions.resize_with(partitions as usize, PartitionLog::default);
        state.topics.insert(
            name.to_string(),
            TopicLog {
                partitions: log_partitions,
                retention,
            },
        );

        log::info!("Created topic '{}' with {} partitions", name, partitions);
        Ok(())
    }

    /// Simulate an outage: every client call fails while unavailable.
    pub fn set_available(&self, available: bool) {
        self.shared.state.lock().available = available;
        self.shared.notify.notify_waiters();
    }

    /// Every retained record in `topic`, partition by partition.
    pub fn records(&self, topic: &str) -> Vec<InboundRecord> {
        let state = self.shared.state.lock();
        let Some(log) = state.topics.get(topic) else {
            return Vec::new();
        };

        log.partitions
            .iter()
            .enumerate()
            .flat_map(|(partition, records)| {
                records.records.iter().enumerate().map(move |(index, record)| {
                    to_inbound(topic, partition as u32, records.base + index as u64, record)
                })
            })
            .collect()
    }

    pub fn committed_offset(&self, group_id: &str, topic: &str, partition: u32) -> Option<u64> {
        let state = self.shared.state.lock();
        state
            .groups
            .get(&(group_id.to_string(), topic.to_string()))
            .and_then(|group| group.committed.get(&partition).copied())
    }

    /// Push journalled writes to disk.
    pub fn flush(&self) -> Result<(), BrokerError> {
        match &self.shared.journal {
            Some(journal) => journal.flush(),
            None => Ok(()),
        }
    }

    fn join_group(&self, group_id: &str, topic: &str) -> Result<u64, BrokerError> {
        let mut state = self.shared.state.lock();
        ensure_available(&state)?;
        if !state.topics.contains_key(topic) {
            return Err(BrokerError::UnknownTopic(topic.to_string()));
        }

        let member_id = state.next_member_id;
        state.next_member_id += 1;
        state
            .groups
            .entry((group_id.to_string(), topic.to_string()))
            .or_default()
            .members
            .push(member_id);

        log::debug!("Member {} joined group '{}' on topic '{}'", member_id, group_id, topic);
        Ok(member_id)
    }

    /// Drop records of `topic` that every group has committed past.
    fn trim_committed(&self, state: &mut BrokerState, topic: &str) {
        let groups: Vec<&ConsumerGroup> = state
            .groups
            .iter()
            .filter(|((_, group_topic), _)| group_topic == topic)
            .map(|(_, group)| group)
            .collect();
        if groups.is_empty() {
            return;
        }

        let Some(log) = state.topics.get_mut(topic) else {
            return;
        };
        for (partition, records) in log.partitions.iter_mut().enumerate() {
            let partition = partition as u32;
            let floor = groups
                .iter()
                .map(|group| group.committed.get(&partition).copied().unwrap_or(0))
                .min()
                .unwrap_or(0);

            if records.trim_to(floor) {
                self.trim_journal(topic, partition, records.base);
            }
        }
    }

    fn trim_journal(&self, topic: &str, partition: u32, base: u64) {
        if let Some(journal) = &self.shared.journal {
            if let Err(e) = journal.trim(topic, partition, base) {
                log::warn!("Failed to trim journal for {}[{}]: {}", topic, partition, e);
            }
        }
    }
}

fn ensure_available(state: &BrokerState) -> Result<(), BrokerError> {
    if state.available {
        Ok(())
    } else {
        Err(BrokerError::Unavailable("broker is not reachable".to_string()))
    }
}

fn to_inbound(topic: &str, partition: u32, offset: u64, record: &StoredRecord) -> InboundRecord {
    InboundRecord {
        topic: topic.to_string(),
        partition,
        offset,
        key: record.key.clone(),
        payload: record.payload.clone(),
        timestamp: record.timestamp,
    }
}

pub struct LocalProducer {
    broker: LocalBroker,
}

#[async_trait]
impl ProducerClient for LocalProducer {
    async fn send(&self, record: OutboundRecord) -> Result<RecordMetadata, BrokerError> {
        let metadata = {
            let mut state = self.broker.shared.state.lock();
            ensure_available(&state)?;

            let log = state
                .topics
                .get_mut(&record.topic)
                .ok_or_else(|| BrokerError::UnknownTopic(record.topic.clone()))?;

            let count = log.partitions.len() as u32;
            let partition = record
                .partition
                .unwrap_or_else(|| partition_for_key(&record.key, count));
            let retention = log.retention;
            let records = log
                .partitions
                .get_mut(partition as usize)
                .ok_or_else(|| BrokerError::InvalidPartition {
                    topic: record.topic.clone(),
                    partition,
                })?;

            let offset = records.next_offset();
            let stored = StoredRecord {
                key: record.key,
                payload: record.payload,
                timestamp: Utc::now(),
            };
            if let Some(journal) = &self.broker.shared.journal {
                journal.append(&record.topic, partition, offset, &stored)?;
            }
            records.records.push_back(stored);

            if let Some(max) = retention {
                if records.trim_to(records.next_offset().saturating_sub(max as u64)) {
                    self.broker.trim_journal(&record.topic, partition, records.base);
                }
            }

            RecordMetadata {
                topic: record.topic,
                partition,
                offset,
            }
        };

        self.broker.shared.notify.notify_waiters();
        Ok(metadata)
    }

    async fn flush(&self) -> Result<(), BrokerError> {
        self.broker.flush()
    }
}

pub struct LocalConsumer {
    broker: LocalBroker,
    group_id: String,
    topic: String,
    member_id: u64,
    max_poll_records: usize,
    /// Next offset to read, per owned partition.
    positions: HashMap<u32, u64>,
    closed: bool,
}

impl LocalConsumer {
    fn fetch(&mut self) -> Result<Vec<InboundRecord>, BrokerError> {
        let state = self.broker.shared.state.lock();
        ensure_available(&state)?;

        let log = state
            .topics
            .get(&self.topic)
            .ok_or_else(|| BrokerError::UnknownTopic(self.topic.clone()))?;
        let group = state
            .groups
            .get(&(self.group_id.clone(), self.topic.clone()))
            .ok_or(BrokerError::Closed)?;

        let owned = owned_partitions(group, self.member_id, log.partitions.len() as u32);
        self.positions.retain(|partition, _| owned.contains(partition));

        let mut batch = Vec::new();
        for partition in owned {
            let records = &log.partitions[partition as usize];
            let position = self
                .positions
                .entry(partition)
                .or_insert_with(|| group.committed.get(&partition).copied().unwrap_or(0));
            if *position < records.base {
                log::warn!(
                    "Offsets {}..{} of {}[{}] were dropped before group '{}' read them",
                    *position,
                    records.base,
                    self.topic,
                    partition,
                    self.group_id
                );
                *position = records.base;
            }

            let start = *position;
            for offset in start..records.next_offset() {
                if batch.len() >= self.max_poll_records {
                    break;
                }
                let Some(record) = records.get(offset) else {
                    break;
                };
                batch.push(to_inbound(&self.topic, partition, offset, record));
                self.positions.insert(partition, offset + 1);
            }
        }

        Ok(batch)
    }
}

fn owned_partitions(group: &ConsumerGroup, member_id: u64, partitions: u32) -> Vec<u32> {
    let Some(index) = group.members.iter().position(|id| *id == member_id) else {
        return Vec::new();
    };
    let members = group.members.len() as u32;
    (0..partitions)
        .filter(|partition| partition % members == index as u32)
        .collect()
}

#[async_trait]
impl ConsumerClient for LocalConsumer {
    async fn poll(&mut self, timeout: Duration) -> Result<Vec<InboundRecord>, BrokerError> {
        if self.closed {
            return Err(BrokerError::Closed);
        }

        let deadline = Instant::now() + timeout;
        let shared = self.broker.shared.clone();
        loop {
            let notified = shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let batch = self.fetch()?;
            if !batch.is_empty() {
                return Ok(batch);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn commit(&mut self) -> Result<(), BrokerError> {
        if self.closed {
            return Err(BrokerError::Closed);
        }

        let mut guard = self.broker.shared.state.lock();
        let state = &mut *guard;
        ensure_available(state)?;

        let group = state
            .groups
            .get_mut(&(self.group_id.clone(), self.topic.clone()))
            .ok_or(BrokerError::Closed)?;
        for (partition, offset) in &self.positions {
            if let Some(journal) = &self.broker.shared.journal {
                journal.commit(&self.group_id, &self.topic, *partition, *offset)?;
            }
            group.committed.insert(*partition, *offset);
        }

        self.broker.trim_committed(state, &self.topic);
        Ok(())
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.positions.clear();

        let mut state = self.broker.shared.state.lock();
        if let Some(group) = state
            .groups
            .get_mut(&(self.group_id.clone(), self.topic.clone()))
        {
            group.members.retain(|id| *id != self.member_id);
        }
        log::debug!("Member {} left group '{}'", self.member_id, self.group_id);
    }
}

#[async_trait]
impl BrokerAdmin for LocalBroker {
    async fn describe_topic(&self, topic: &str) -> Result<TopicDescription, BrokerError> {
        let state = self.shared.state.lock();
        ensure_available(&state)?;
        state
            .topics
            .get(topic)
            .map(|log| TopicDescription {
                name: topic.to_string(),
                partitions: log.partitions.len() as u32,
            })
            .ok_or_else(|| BrokerError::UnknownTopic(topic.to_string()))
    }
}

#[async_trait]
impl BrokerConnector for LocalBroker {
    async fn create_producer(&self) -> Result<Arc<dyn ProducerClient>, BrokerError> {
        ensure_available(&self.shared.state.lock())?;
        Ok(Arc::new(LocalProducer {
            broker: self.clone(),
        }))
    }

    async fn create_consumer(
        &self,
        group_id: &str,
        topic: &str,
        max_poll_records: usize,
    ) -> Result<Box<dyn ConsumerClient>, BrokerError> {
        let member_id = self.join_group(group_id, topic)?;
        Ok(Box::new(LocalConsumer {
            broker: self.clone(),
            group_id: group_id.to_string(),
            topic: topic.to_string(),
            member_id,
            max_poll_records: max_poll_records.max(1),
            positions: HashMap::new(),
            closed: false,
        }))
    }
}
