//! Publishes generation requests and dead-letter records.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;
use uuid::Uuid;

use super::broker::{partition_for_key, BrokerConnector, BrokerError, OutboundRecord, ProducerClient};
use super::models::{DlqRecord, GenerationMessage};
use crate::config::BrokerConfig;
use crate::document::models::GenerationRequest;
use crate::metrics;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to serialize message: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

pub struct DocumentProducer {
    connector: Arc<dyn BrokerConnector>,
    client: OnceCell<Arc<dyn ProducerClient>>,
    topic: String,
    dlq_topic: String,
    partitions: u32,
}

impl DocumentProducer {
    pub fn new(connector: Arc<dyn BrokerConnector>, config: &BrokerConfig) -> Self {
        Self {
            connector,
            client: OnceCell::new(),
            topic: config.topic.clone(),
            dlq_topic: config.dlq_topic.clone(),
            partitions: config.partitions.max(1),
        }
    }

    /// Shared client, created on first use. Concurrent callers wait for one creation.
    async fn client(&self) -> Result<&Arc<dyn ProducerClient>, BrokerError> {
        self.client
            .get_or_try_init(|| async {
                log::info!("Creating broker producer client");
                self.connector.create_producer().await
            })
            .await
    }

    /// Enqueue `request` under a fresh event id and return that id.
    ///
    /// Fails when the broker does not acknowledge the record.
    pub async fn publish(&self, request: &GenerationRequest) -> Result<String, PublishError> {
        let event_id = Uuid::new_v4().to_string();
        let message = GenerationMessage::from_request(&event_id, request);

        log::info!(
            "Publishing generation request - event: {}, template: {}",
            event_id,
            request.template_name
        );

        let result = self.send_message(&event_id, &message).await;
        let outcome = if result.is_ok() { "success" } else { "failure" };
        metrics::PRODUCER_SENDS
            .with_label_values(&[self.topic.as_str(), outcome])
            .inc();

        match result {
            Ok(()) => Ok(event_id),
            Err(e) => {
                log::error!("Failed to publish event {}: {}", event_id, e);
                Err(e)
            }
        }
    }

    async fn send_message(&self, event_id: &str, message: &GenerationMessage) -> Result<(), PublishError> {
        let payload = serde_json::to_string(message)?;
        let partition = partition_for(event_id, self.partitions);

        let metadata = self
            .client()
            .await?
            .send(OutboundRecord {
                topic: self.topic.clone(),
                partition: Some(partition),
                key: event_id.to_string(),
                payload,
            })
            .await?;

        log::debug!(
            "Event {} stored in {}[{}] at offset {}",
            event_id,
            metadata.topic,
            metadata.partition,
            metadata.offset
        );
        Ok(())
    }

    /// Publish a dead-letter record. Failures are logged and swallowed.
    pub async fn send_to_dlq(&self, event_id: &str, raw_message: &str, reason: &str) {
        log::warn!("Sending event {} to DLQ: {}", event_id, reason);

        let outcome = match self.send_dlq_record(event_id, raw_message, reason).await {
            Ok(()) => {
                log::info!("Event {} sent to DLQ topic {}", event_id, self.dlq_topic);
                "success"
            }
            Err(e) => {
                log::error!("Failed to send event {} to DLQ: {}", event_id, e);
                "failure"
            }
        };
        metrics::DLQ_PUBLISHES.with_label_values(&[outcome]).inc();
    }

    async fn send_dlq_record(&self, event_id: &str, raw_message: &str, reason: &str) -> Result<(), PublishError> {
        let payload = serde_json::to_string(&DlqRecord::new(event_id, raw_message, reason))?;
        self.client()
            .await?
            .send(OutboundRecord {
                topic: self.dlq_topic.clone(),
                partition: None,
                key: format!("DLQ-{}", event_id),
                payload,
            })
            .await?;
        Ok(())
    }

    /// Flush pending sends if a client was ever created.
    pub async fn close(&self) {
        if let Some(client) = self.client.get() {
            if let Err(e) = client.flush().await {
                log::warn!("Producer flush failed during shutdown: {}", e);
            }
        }
        log::info!("Producer closed");
    }
}

/// Partition for an event id. Stable across builds and restarts.
pub fn partition_for(event_id: &str, partitions: u32) -> u32 {
    partition_for_key(event_id, partitions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::local::LocalBroker;
    use serde_json::json;

    fn setup() -> (LocalBroker, DocumentProducer) {
        let broker = LocalBroker::new();
        let config = BrokerConfig::default();
        broker.create_topic(&config.topic, config.partitions).unwrap();
        broker.create_capped_topic(&config.dlq_topic, 1, config.dlq_retention).unwrap();
        let producer = DocumentProducer::new(Arc::new(broker.clone()), &config);
        (broker, producer)
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            template_name: "simple-document".into(),
            data: Some(json!({ "header": "X" })),
            is_async: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_publish_assigns_event_id_and_partition() {
        let (broker, producer) = setup();

        let event_id = producer.publish(&request()).await.unwrap();
        assert!(Uuid::parse_str(&event_id).is_ok());

        let records = broker.records("document-generation");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, event_id);
        assert_eq!(records[0].partition, partition_for(&event_id, 3));

        let wire: GenerationMessage = serde_json::from_str(&records[0].payload).unwrap();
        assert_eq!(wire.event_id.as_deref(), Some(event_id.as_str()));
    }

    #[tokio::test]
    async fn test_publish_surfaces_broker_failure() {
        let (broker, producer) = setup();
        broker.set_available(false);

        let err = producer.publish(&request()).await.unwrap_err();
        assert!(matches!(err, PublishError::Broker(BrokerError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_dlq_is_best_effort() {
        let (broker, producer) = setup();

        producer.send_to_dlq("ev-1", "{\"templateName\":\"x\"}", "boom").await;
        let records = broker.records("document-generation-dlq");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, "DLQ-ev-1");

        broker.set_available(false);
        producer.send_to_dlq("ev-2", "raw", "boom").await;
        broker.set_available(true);
        assert_eq!(broker.records("document-generation-dlq").len(), 1);
    }

    #[test]
    fn test_partition_is_stable() {
        let a = partition_for("5f0c3c2e-1111-4222-8333-944455556666", 3);
        assert_eq!(a, partition_for("5f0c3c2e-1111-4222-8333-944455556666", 3));
        assert!(a < 3);
        assert_eq!(partition_for("foobar", 3), 0);
    }
}
