use actix_web::middleware::{Compress, Logger};
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub mod callback;
pub mod config;
pub mod document;
pub mod error;
pub mod generators;
pub mod messaging;
pub mod metrics;
pub mod state;
pub mod template;
pub mod validation;

pub use crate::state::AppState;

use crate::callback::CallbackDispatcher;
use crate::config::AppConfig;
use crate::document::DocumentService;
use crate::generators::{GeneratorFactory, WkhtmltopdfEngine};
use crate::messaging::{BrokerHealthCheck, DocumentConsumer, DocumentProducer, LocalBroker};
use crate::template::{CachedTemplateStore, InMemoryTemplateStore, PlaceholderRenderer};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self::new("NotFound", message)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new("BadRequest", message)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new("InternalServerError", message)
    }
}

pub async fn run() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env();
    metrics::init();

    let broker = match &config.broker.data_dir {
        Some(dir) => LocalBroker::open(dir)
            .with_context(|| format!("failed to open broker journal at {}", dir.display()))?,
        None => {
            log::warn!("Broker journal disabled, queued requests will not survive a restart");
            LocalBroker::new()
        }
    };
    broker
        .create_topic(&config.broker.topic, config.broker.partitions)
        .context("failed to create generation topic")?;
    broker
        .create_capped_topic(&config.broker.dlq_topic, 1, config.broker.dlq_retention)
        .context("failed to create DLQ topic")?;
    log::info!(
        "Broker ready - topic: {} ({} partitions), dlq: {}",
        config.broker.topic,
        config.broker.partitions,
        config.broker.dlq_topic
    );

    let templates = InMemoryTemplateStore::load_from_dir(&config.templates.dir)
        .context("failed to load templates")?;
    log::info!("Loaded {} templates from {}", templates.len(), config.templates.dir.display());
    let templates = Arc::new(CachedTemplateStore::new(Arc::new(templates), config.templates.cache_ttl));

    let generators = Arc::new(GeneratorFactory::with_defaults(Arc::new(WkhtmltopdfEngine::new(
        config.pdf.converter_bin.clone(),
    ))));

    let producer = Arc::new(DocumentProducer::new(Arc::new(broker.clone()), &config.broker));
    let service = Arc::new(DocumentService::new(
        templates,
        Arc::new(PlaceholderRenderer),
        generators,
        producer.clone(),
    ));

    let shutdown = CancellationToken::new();
    let dispatcher = Arc::new(
        CallbackDispatcher::new(config.callback.clone(), shutdown.clone())
            .context("failed to build callback HTTP client")?,
    );

    let consumer = Arc::new(DocumentConsumer::new(
        config.consumer.clone(),
        config.broker.topic.clone(),
        Arc::new(broker.clone()),
        service.clone(),
        dispatcher,
        producer.clone(),
        shutdown,
    ));
    consumer.start().await.context("failed to start consumer workers")?;

    let health = Arc::new(BrokerHealthCheck::new(Arc::new(broker), &config.broker));
    let app_state = web::Data::new(AppState::new(service, health));

    log::info!("Starting server at http://{}:{}", config.server.host, config.server.port);

    let served = HttpServer::new(move || {
        App::new()
            .wrap(Compress::default())
            .wrap(Logger::default())
            .app_data(app_state.clone())
            .app_data(web::JsonConfig::default().limit(16 * 1024 * 1024))
            .configure(document::handlers::config)
    })
    .bind((config.server.host.as_str(), config.server.port))
    .context("failed to bind HTTP server")?
    .run()
    .await;

    consumer.shutdown().await;
    producer.close().await;
    log::info!("Shutdown complete");

    served.context("HTTP server failed")
}
