//! Messaging module - the asynchronous generation pipeline.
//!
//! - `broker` - client traits the pipeline talks to
//! - `local` - in-process partitioned broker implementing those traits
//! - `journal` - sled storage that lets the local broker survive restarts
//! - `producer` - publishes requests and dead-letter records
//! - `consumer` - worker pool that regenerates documents and delivers callbacks
//! - `health` - broker readiness check

pub mod broker;
pub mod consumer;
pub mod health;
mod journal;
pub mod local;
pub mod models;
pub mod producer;

pub use broker::{
    BrokerAdmin, BrokerConnector, BrokerError, ConsumerClient, InboundRecord, OutboundRecord,
    ProducerClient, RecordMetadata, TopicDescription,
};
pub use consumer::{DocumentConsumer, RecordOutcome};
pub use health::{BrokerHealthCheck, HealthReport, HealthStatus};
pub use local::LocalBroker;
pub use models::{DlqRecord, GenerationMessage};
pub use producer::{DocumentProducer, PublishError};
