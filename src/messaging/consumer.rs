//! Consumer worker pool.
//!
//! Each worker owns one broker consumer and loops: poll a batch, process the
//! records one by one, commit the batch. A record either produces a document
//! (with a callback when a URL was given) or lands in the DLQ. Loop-level
//! failures pause the worker instead of stopping it.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::broker::{BrokerConnector, BrokerError, ConsumerClient, InboundRecord};
use super::models::GenerationMessage;
use super::producer::DocumentProducer;
use crate::callback::CallbackDispatcher;
use crate::config::ConsumerConfig;
use crate::document::models::{GeneratedDocument, GenerationRequest};
use crate::document::DocumentService;
use crate::error::DocumentError;
use crate::metrics;

/// Terminal state of one consumed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Document generated and the callback accepted it.
    Delivered,
    /// Document generated; no callback URL was supplied.
    Completed,
    /// Document generated but every callback attempt failed.
    CallbackFailed,
    /// Message published to the DLQ (error callback attempted when possible).
    DeadLettered,
    /// Shutdown interrupted the retry loop; the record must not be committed.
    Interrupted,
}

impl RecordOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordOutcome::Delivered => "delivered",
            RecordOutcome::Completed => "completed",
            RecordOutcome::CallbackFailed => "callback_failed",
            RecordOutcome::DeadLettered => "dead_lettered",
            RecordOutcome::Interrupted => "interrupted",
        }
    }
}

enum RetryFailure {
    Failed(DocumentError),
    Interrupted,
}

/// Keeps the active-worker gauge accurate even when a worker is aborted.
struct ActiveWorker;

impl ActiveWorker {
    fn enter() -> Self {
        metrics::ACTIVE_WORKERS.inc();
        ActiveWorker
    }
}

impl Drop for ActiveWorker {
    fn drop(&mut self) {
        metrics::ACTIVE_WORKERS.dec();
    }
}

pub struct DocumentConsumer {
    config: ConsumerConfig,
    topic: String,
    connector: Arc<dyn BrokerConnector>,
    service: Arc<DocumentService>,
    dispatcher: Arc<CallbackDispatcher>,
    producer: Arc<DocumentProducer>,
    shutdown: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl DocumentConsumer {
    pub fn new(
        config: ConsumerConfig,
        topic: impl Into<String>,
        connector: Arc<dyn BrokerConnector>,
        service: Arc<DocumentService>,
        dispatcher: Arc<CallbackDispatcher>,
        producer: Arc<DocumentProducer>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            topic: topic.into(),
            connector,
            service,
            dispatcher,
            producer,
            shutdown,
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Start `threads` worker loops, each with its own consumer client.
    pub async fn start(self: &Arc<Self>) -> Result<(), BrokerError> {
        let threads = self.config.threads.max(1);
        log::info!(
            "Starting {} consumer workers - group: {}, topic: {}",
            threads,
            self.config.group_id,
            self.topic
        );

        for worker_id in 0..threads {
            let client = self
                .connector
                .create_consumer(&self.config.group_id, &self.topic, self.config.max_poll_records)
                .await?;

            let consumer = Arc::clone(self);
            let handle = tokio::spawn(async move { consumer.run_worker(worker_id, client).await });
            self.workers.lock().push(handle);
        }

        Ok(())
    }

    async fn run_worker(self: Arc<Self>, worker_id: usize, mut client: Box<dyn ConsumerClient>) {
        let _active = ActiveWorker::enter();
        log::info!("Consumer worker {} started", worker_id);

        loop {
            let polled = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                polled = client.poll(self.config.poll_timeout) => polled,
            };

            let records = match polled {
                Ok(records) => records,
                Err(e) => {
                    log::error!("Worker {} poll failed: {}", worker_id, e);
                    metrics::CONSUMER_LOOP_ERRORS.inc();
                    if self.pause().await {
                        break;
                    }
                    continue;
                }
            };

            if records.is_empty() {
                continue;
            }

            log::debug!("Worker {} received {} records", worker_id, records.len());
            if !self.process_batch(&records).await {
                log::warn!(
                    "Worker {} interrupted mid-batch, leaving records uncommitted",
                    worker_id
                );
                break;
            }

            if let Err(e) = client.commit().await {
                log::error!("Worker {} commit failed: {}", worker_id, e);
                metrics::CONSUMER_LOOP_ERRORS.inc();
                if self.pause().await {
                    break;
                }
            }
        }

        client.close().await;
        log::info!("Consumer worker {} stopped", worker_id);
    }

    /// Process records in order. Returns false when shutdown interrupted the batch.
    async fn process_batch(&self, records: &[InboundRecord]) -> bool {
        for record in records {
            metrics::CONSUMER_RECORDS.inc();
            if self.process_record(record).await == RecordOutcome::Interrupted {
                return false;
            }
        }
        true
    }

    /// Returns true when shutdown was requested during the pause.
    async fn pause(&self) -> bool {
        tokio::select! {
            _ = self.shutdown.cancelled() => true,
            _ = tokio::time::sleep(self.config.error_pause) => false,
        }
    }

    /// Drive one record to its terminal state.
    pub async fn process_record(&self, record: &InboundRecord) -> RecordOutcome {
        let started = Instant::now();
        let outcome = self.handle_record(record).await;

        metrics::PROCESSING_SECONDS
            .with_label_values(&[outcome.as_str()])
            .observe(started.elapsed().as_secs_f64());
        metrics::CONSUMER_MESSAGES
            .with_label_values(&[outcome.as_str()])
            .inc();
        outcome
    }

    async fn handle_record(&self, record: &InboundRecord) -> RecordOutcome {
        let message: GenerationMessage = match serde_json::from_str(&record.payload) {
            Ok(message) => message,
            Err(e) => {
                log::error!(
                    "Invalid message at {}[{}]@{}: {}",
                    record.topic,
                    record.partition,
                    record.offset,
                    e
                );
                self.producer
                    .send_to_dlq(&record.key, &record.payload, &format!("Invalid message format: {}", e))
                    .await;
                return RecordOutcome::DeadLettered;
            }
        };

        let event_id = message
            .event_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| record.key.clone());

        if let Some(reason) = message.missing_required() {
            log::error!("Rejecting event {}: {}", event_id, reason);
            self.producer.send_to_dlq(&event_id, &record.payload, reason).await;
            if let Some(url) = message.callback_url() {
                self.dispatcher
                    .send_error_callback(url, &event_id, &format!("Invalid message: {}", reason))
                    .await;
            }
            return RecordOutcome::DeadLettered;
        }

        let request = message.to_request();
        log::info!(
            "Processing event {} - template: {}, partition: {}, offset: {}",
            event_id,
            request.template_name,
            record.partition,
            record.offset
        );

        match self.generate_with_retry(&event_id, &request).await {
            Ok(document) => self.deliver(&event_id, &message, &document).await,
            Err(RetryFailure::Interrupted) => RecordOutcome::Interrupted,
            Err(RetryFailure::Failed(e)) => {
                self.producer
                    .send_to_dlq(&event_id, &record.payload, &e.to_string())
                    .await;
                if let Some(url) = message.callback_url() {
                    self.dispatcher
                        .send_error_callback(url, &event_id, &format!("Error generating document: {}", e))
                        .await;
                }
                RecordOutcome::DeadLettered
            }
        }
    }

    async fn deliver(
        &self,
        event_id: &str,
        message: &GenerationMessage,
        document: &GeneratedDocument,
    ) -> RecordOutcome {
        let Some(url) = message.callback_url() else {
            log::warn!("Event {} generated but has no callback URL", event_id);
            return RecordOutcome::Completed;
        };

        let delivered = self
            .dispatcher
            .send_document_callback(
                url,
                event_id,
                &document.bytes,
                &document.filename,
                &document.content_type,
            )
            .await;

        if delivered {
            RecordOutcome::Delivered
        } else {
            log::error!("Event {} generated but callback delivery failed", event_id);
            RecordOutcome::CallbackFailed
        }
    }

    /// Up to `max_retry_attempts` sequential attempts with `backoff × attempt`
    /// between them. Non-retryable errors stop immediately.
    async fn generate_with_retry(
        &self,
        event_id: &str,
        request: &GenerationRequest,
    ) -> Result<GeneratedDocument, RetryFailure> {
        let max_attempts = self.config.max_retry_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.service.generate(request).await {
                Ok(document) => {
                    metrics::GENERATION_ATTEMPTS.with_label_values(&["success"]).inc();
                    log::info!(
                        "Event {} generated on attempt {} - {} bytes",
                        event_id,
                        attempt,
                        document.bytes.len()
                    );
                    return Ok(document);
                }
                Err(e) => {
                    metrics::GENERATION_ATTEMPTS.with_label_values(&["failure"]).inc();

                    if !e.is_retryable() {
                        log::error!("Event {} failed with non-retryable error: {}", event_id, e);
                        return Err(RetryFailure::Failed(e));
                    }
                    if attempt >= max_attempts {
                        log::error!(
                            "Event {} failed after {} attempts: {}",
                            event_id,
                            attempt,
                            e
                        );
                        return Err(RetryFailure::Failed(e));
                    }

                    let delay = self.config.retry_backoff * attempt;
                    log::warn!(
                        "Event {} attempt {}/{} failed: {} - retrying in {:?}",
                        event_id,
                        attempt,
                        max_attempts,
                        e,
                        delay
                    );

                    tokio::select! {
                        _ = self.shutdown.cancelled() => {
                            log::warn!("Retry of event {} interrupted by shutdown", event_id);
                            return Err(RetryFailure::Interrupted);
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Signal every worker to stop and wait up to the grace period, aborting stragglers.
    pub async fn shutdown(&self) {
        log::info!("Shutting down consumer workers");
        self.shutdown.cancel();

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        let aborts: Vec<_> = handles.iter().map(|handle| handle.abort_handle()).collect();

        match tokio::time::timeout(self.config.shutdown_grace, futures::future::join_all(handles)).await {
            Ok(_) => log::info!("All consumer workers stopped"),
            Err(_) => {
                log::warn!(
                    "Consumer workers did not stop within {:?}, aborting",
                    self.config.shutdown_grace
                );
                for abort in aborts {
                    abort.abort();
                }
            }
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.lock().len()
    }
}
