//! Durable journal behind the local broker, kept in sled.
//!
//! Trees:
//! - `topics`: topic name to partition count and retention
//! - `log:<topic>`: one per topic, keyed by big-endian partition then offset
//! - `offsets`: committed offset per group, topic and partition
//! - `bases`: first retained offset per topic and partition

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;

use super::broker::BrokerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredRecord {
    pub key: String,
    pub payload: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct TopicMeta {
    pub partitions: u32,
    /// Maximum records kept per partition.
    pub retention: Option<usize>,
}

pub(crate) struct RestoredPartition {
    pub base: u64,
    pub records: Vec<StoredRecord>,
}

pub(crate) struct RestoredTopic {
    pub name: String,
    pub meta: TopicMeta,
    pub partitions: Vec<RestoredPartition>,
}

/// Broker state read back from disk.
#[derive(Default)]
pub(crate) struct Snapshot {
    pub topics: Vec<RestoredTopic>,
    /// Keyed by (group id, topic), then partition.
    pub committed: HashMap<(String, String), HashMap<u32, u64>>,
}

#[derive(Clone)]
pub(crate) struct Journal {
    db: sled::Db,
    topics: sled::Tree,
    offsets: sled::Tree,
    bases: sled::Tree,
}

fn storage(e: impl Display) -> BrokerError {
    BrokerError::Storage(e.to_string())
}

fn record_key(partition: u32, offset: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(12);
    key.extend_from_slice(&partition.to_be_bytes());
    key.extend_from_slice(&offset.to_be_bytes());
    key
}

fn parse_record_key(key: &[u8]) -> Option<(u32, u64)> {
    if key.len() != 12 {
        return None;
    }
    let partition = u32::from_be_bytes(key[..4].try_into().ok()?);
    let offset = u64::from_be_bytes(key[4..].try_into().ok()?);
    Some((partition, offset))
}

fn offset_key(group_id: &str, topic: &str, partition: u32) -> String {
    format!("{}\0{}\0{}", group_id, topic, partition)
}

fn base_key(topic: &str, partition: u32) -> String {
    format!("{}\0{}", topic, partition)
}

fn read_u64(value: &[u8]) -> Result<u64, BrokerError> {
    let bytes: [u8; 8] = value
        .try_into()
        .map_err(|_| storage(format!("expected 8 bytes, found {}", value.len())))?;
    Ok(u64::from_be_bytes(bytes))
}

impl Journal {
    pub fn open(path: &Path) -> Result<Self, BrokerError> {
        let db = sled::open(path).map_err(storage)?;
        Ok(Self {
            topics: db.open_tree("topics").map_err(storage)?,
            offsets: db.open_tree("offsets").map_err(storage)?,
            bases: db.open_tree("bases").map_err(storage)?,
            db,
        })
    }

    fn log(&self, topic: &str) -> Result<sled::Tree, BrokerError> {
        self.db.open_tree(format!("log:{}", topic)).map_err(storage)
    }

    pub fn save_topic(&self, name: &str, meta: TopicMeta) -> Result<(), BrokerError> {
        let value = serde_json::to_vec(&meta).map_err(storage)?;
        self.topics.insert(name.as_bytes(), value).map_err(storage)?;
        Ok(())
    }

    pub fn append(
        &self,
        topic: &str,
        partition: u32,
        offset: u64,
        record: &StoredRecord,
    ) -> Result<(), BrokerError> {
        let value = serde_json::to_vec(record).map_err(storage)?;
        self.log(topic)?
            .insert(record_key(partition, offset), value)
            .map_err(storage)?;
        Ok(())
    }

    pub fn commit(&self, group_id: &str, topic: &str, partition: u32, offset: u64) -> Result<(), BrokerError> {
        self.offsets
            .insert(
                offset_key(group_id, topic, partition).as_bytes(),
                offset.to_be_bytes().to_vec(),
            )
            .map_err(storage)?;
        Ok(())
    }

    /// Remove every record of `partition` below `base` and remember the new base.
    pub fn trim(&self, topic: &str, partition: u32, base: u64) -> Result<(), BrokerError> {
        let log = self.log(topic)?;
        let keys = log
            .range(record_key(partition, 0)..record_key(partition, base))
            .keys()
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage)?;
        for key in keys {
            log.remove(key).map_err(storage)?;
        }

        self.bases
            .insert(base_key(topic, partition).as_bytes(), base.to_be_bytes().to_vec())
            .map_err(storage)?;
        Ok(())
    }

    pub fn flush(&self) -> Result<(), BrokerError> {
        self.db.flush().map_err(storage)?;
        Ok(())
    }

    fn base(&self, topic: &str, partition: u32) -> Result<u64, BrokerError> {
        match self.bases.get(base_key(topic, partition).as_bytes()).map_err(storage)? {
            Some(value) => read_u64(&value),
            None => Ok(0),
        }
    }

    pub fn restore(&self) -> Result<Snapshot, BrokerError> {
        let mut snapshot = Snapshot::default();

        for entry in self.topics.iter() {
            let (name, meta) = entry.map_err(storage)?;
            let name = String::from_utf8(name.to_vec()).map_err(storage)?;
            let meta: TopicMeta = serde_json::from_slice(&meta).map_err(storage)?;

            let mut partitions = Vec::with_capacity(meta.partitions as usize);
            for partition in 0..meta.partitions {
                partitions.push(RestoredPartition {
                    base: self.base(&name, partition)?,
                    records: Vec::new(),
                });
            }

            for entry in self.log(&name)?.iter() {
                let (key, value) = entry.map_err(storage)?;
                let Some((partition, offset)) = parse_record_key(&key) else {
                    continue;
                };
                let Some(restored) = partitions.get_mut(partition as usize) else {
                    continue;
                };
                // Left over from an interrupted trim.
                if offset < restored.base {
                    continue;
                }
                if restored.records.is_empty() {
                    restored.base = offset;
                }
                restored
                    .records
                    .push(serde_json::from_slice(&value).map_err(storage)?);
            }

            snapshot.topics.push(RestoredTopic {
                name,
                meta,
                partitions,
            });
        }

        for entry in self.offsets.iter() {
            let (key, value) = entry.map_err(storage)?;
            let key = String::from_utf8(key.to_vec()).map_err(storage)?;
            let mut parts = key.splitn(3, '\0');
            let (Some(group_id), Some(topic), Some(partition)) = (parts.next(), parts.next(), parts.next())
            else {
                log::warn!("Skipping malformed offset entry '{}'", key.escape_debug());
                continue;
            };
            let partition: u32 = partition.parse().map_err(storage)?;

            snapshot
                .committed
                .entry((group_id.to_string(), topic.to_string()))
                .or_default()
                .insert(partition, read_u64(&value)?);
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(key: &str) -> StoredRecord {
        StoredRecord {
            key: key.to_string(),
            payload: format!("payload-{}", key),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_record_keys_sort_by_partition_then_offset() {
        assert!(record_key(0, u64::MAX) < record_key(1, 0));
        assert!(record_key(1, 255) < record_key(1, 256));
        assert_eq!(parse_record_key(&record_key(7, 42)), Some((7, 42)));
        assert_eq!(parse_record_key(b"short"), None);
    }

    #[test]
    fn test_restore_after_trim() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(dir.path()).unwrap();
        let meta = TopicMeta {
            partitions: 2,
            retention: None,
        };

        journal.save_topic("jobs", meta).unwrap();
        for (offset, key) in ["a", "b", "c"].iter().enumerate() {
            journal.append("jobs", 0, offset as u64, &stored(key)).unwrap();
        }
        journal.commit("g", "jobs", 0, 2).unwrap();
        journal.trim("jobs", 0, 2).unwrap();

        let snapshot = journal.restore().unwrap();
        assert_eq!(snapshot.topics.len(), 1);
        let topic = &snapshot.topics[0];
        assert_eq!(topic.meta, meta);
        assert_eq!(topic.partitions[0].base, 2);
        assert_eq!(topic.partitions[0].records.len(), 1);
        assert_eq!(topic.partitions[0].records[0].key, "c");
        assert!(topic.partitions[1].records.is_empty());
        assert_eq!(
            snapshot.committed[&("g".to_string(), "jobs".to_string())][&0],
            2
        );
    }

    #[test]
    fn test_trimmed_empty_partition_keeps_its_base() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(dir.path()).unwrap();
        journal
            .save_topic("jobs", TopicMeta { partitions: 1, retention: None })
            .unwrap();
        journal.append("jobs", 0, 0, &stored("a")).unwrap();
        journal.trim("jobs", 0, 1).unwrap();

        let snapshot = journal.restore().unwrap();
        let partition = &snapshot.topics[0].partitions[0];
        assert_eq!(partition.base, 1);
        assert!(partition.records.is_empty());
    }
}
