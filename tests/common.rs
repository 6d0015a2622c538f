#![allow(dead_code)]

use actix_web::dev::ServerHandle;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use sistemplate_server::callback::CallbackDispatcher;
use sistemplate_server::config::{BrokerConfig, CallbackConfig, ConsumerConfig};
use sistemplate_server::document::{DocumentService, GenerationRequest};
use sistemplate_server::generators::{GeneratorError, GeneratorFactory, HtmlToPdf, PageSettings, PdfMetadata};
use sistemplate_server::messaging::{BrokerConnector, DocumentConsumer, DocumentProducer, LocalBroker};
use sistemplate_server::template::{DocumentType, InMemoryTemplateStore, PlaceholderRenderer, Template};

/// HTML to PDF double: fails the first `failures` calls, then returns a fake PDF
/// that embeds the HTML it was given.
#[derive(Default)]
pub struct StubConverter {
    failures: AtomicUsize,
    calls: AtomicUsize,
    last_html: Mutex<Option<String>>,
    last_settings: Mutex<Option<PageSettings>>,
}

impl StubConverter {
    pub fn failing(failures: usize) -> Self {
        Self {
            failures: AtomicUsize::new(failures),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_html(&self) -> Option<String> {
        self.last_html.lock().clone()
    }

    pub fn last_settings(&self) -> Option<PageSettings> {
        *self.last_settings.lock()
    }
}

impl HtmlToPdf for StubConverter {
    fn convert(
        &self,
        html: &str,
        settings: &PageSettings,
        _metadata: &PdfMetadata,
    ) -> Result<Vec<u8>, GeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_html.lock() = Some(html.to_string());
        *self.last_settings.lock() = Some(*settings);

        let should_fail = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(GeneratorError::ConverterExit(1));
        }

        Ok(format!("%PDF-1.4\n{}", html).into_bytes())
    }
}

pub fn fixture_templates() -> Vec<Template> {
    vec![
        Template::new(
            "simple-document",
            DocumentType::Pdf,
            "<html><head></head><body><h1>{{ title }}</h1><p>{{ body }}</p></body></html>",
        )
        .with_required_fields(["title"]),
        Template::new(
            "welcome-email",
            DocumentType::Email,
            "<p>Hello {{ name }}, welcome aboard.</p>",
        )
        .with_required_fields(["name"]),
        Template::new("otp-sms", DocumentType::Sms, "Your code is {{ code }}"),
        Template::new("retired-document", DocumentType::Pdf, "<p>{{ title }}</p>").inactive(),
    ]
}

pub fn pdf_request() -> GenerationRequest {
    GenerationRequest {
        template_name: "simple-document".to_string(),
        data: Some(json!({ "title": "Invoice <42>", "body": "Thank you" })),
        ..Default::default()
    }
}

pub fn consumer_config() -> ConsumerConfig {
    ConsumerConfig {
        poll_timeout: Duration::from_millis(50),
        retry_backoff: Duration::from_millis(10),
        error_pause: Duration::from_millis(10),
        shutdown_grace: Duration::from_secs(5),
        ..ConsumerConfig::default()
    }
}

pub fn callback_config() -> CallbackConfig {
    CallbackConfig {
        timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(2),
        max_attempts: 3,
        backoff: Duration::from_millis(10),
    }
}

/// Service, producer and broker wired the way the binary wires them.
pub struct Pipeline {
    pub broker: LocalBroker,
    pub broker_config: BrokerConfig,
    pub converter: Arc<StubConverter>,
    pub templates: Arc<InMemoryTemplateStore>,
    pub producer: Arc<DocumentProducer>,
    pub service: Arc<DocumentService>,
    pub shutdown: CancellationToken,
}

impl Pipeline {
    pub fn new(converter: StubConverter) -> Self {
        let broker_config = BrokerConfig::default();
        let broker = LocalBroker::new();
        broker
            .create_topic(&broker_config.topic, broker_config.partitions)
            .unwrap();
        broker
            .create_capped_topic(&broker_config.dlq_topic, 1, broker_config.dlq_retention)
            .unwrap();

        let converter = Arc::new(converter);
        let templates = Arc::new(InMemoryTemplateStore::with_templates(fixture_templates()));
        let producer = Arc::new(DocumentProducer::new(Arc::new(broker.clone()), &broker_config));
        let service = Arc::new(DocumentService::new(
            templates.clone(),
            Arc::new(PlaceholderRenderer),
            Arc::new(GeneratorFactory::with_defaults(converter.clone())),
            producer.clone(),
        ));

        Self {
            broker,
            broker_config,
            converter,
            templates,
            producer,
            service,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn dispatcher(&self, config: CallbackConfig) -> Arc<CallbackDispatcher> {
        Arc::new(CallbackDispatcher::new(config, self.shutdown.clone()).unwrap())
    }

    pub fn consumer(&self, config: ConsumerConfig) -> Arc<DocumentConsumer> {
        self.consumer_with(config, Arc::new(self.broker.clone()))
    }

    /// Consumer reading through `connector` instead of the pipeline broker directly.
    pub fn consumer_with(&self, config: ConsumerConfig, connector: Arc<dyn BrokerConnector>) -> Arc<DocumentConsumer> {
        Arc::new(DocumentConsumer::new(
            config,
            self.broker_config.topic.clone(),
            connector,
            self.service.clone(),
            self.dispatcher(callback_config()),
            self.producer.clone(),
            self.shutdown.clone(),
        ))
    }

    /// DLQ records decoded as JSON.
    pub fn dlq(&self) -> Vec<Value> {
        self.broker
            .records(&self.broker_config.dlq_topic)
            .iter()
            .map(|record| serde_json::from_str(&record.payload).unwrap())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ReceivedCallback {
    pub headers: HashMap<String, String>,
    pub body: Value,
}

impl ReceivedCallback {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }
}

struct ReceiverState {
    received: Arc<Mutex<Vec<ReceivedCallback>>>,
    failures: Arc<AtomicUsize>,
}

async fn receive(req: HttpRequest, body: web::Bytes, state: web::Data<ReceiverState>) -> HttpResponse {
    let headers = req
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_lowercase(), value.to_string()))
        })
        .collect();
    let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
    state.received.lock().push(ReceivedCallback { headers, body });

    let fail = state
        .failures
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if fail {
        HttpResponse::InternalServerError().finish()
    } else {
        HttpResponse::Ok().finish()
    }
}

/// Real HTTP server on an ephemeral port that records every callback POST.
/// The first `failures` requests are answered with 500.
pub struct CallbackReceiver {
    pub url: String,
    received: Arc<Mutex<Vec<ReceivedCallback>>>,
    handle: ServerHandle,
}

impl CallbackReceiver {
    pub async fn start(failures: usize) -> Self {
        let received = Arc::new(Mutex::new(Vec::new()));
        let failures = Arc::new(AtomicUsize::new(failures));

        let state_received = received.clone();
        let server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(ReceiverState {
                    received: state_received.clone(),
                    failures: failures.clone(),
                }))
                .app_data(web::PayloadConfig::new(16 * 1024 * 1024))
                .route("/callback", web::post().to(receive))
        })
        .workers(1)
        .disable_signals()
        .bind(("127.0.0.1", 0))
        .unwrap();

        let port = server.addrs()[0].port();
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);

        Self {
            url: format!("http://127.0.0.1:{}/callback", port),
            received,
            handle,
        }
    }

    pub fn received(&self) -> Vec<ReceivedCallback> {
        self.received.lock().clone()
    }

    /// Wait until at least `count` callbacks arrived or `timeout` elapsed.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<ReceivedCallback> {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.received.lock().len() < count && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.received()
    }

    pub async fn stop(self) {
        self.handle.stop(false).await;
    }
}
