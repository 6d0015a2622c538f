//! Pipeline metrics held in a process-wide prometheus registry.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

const NAMESPACE: &str = "sistemplate";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref PRODUCER_SENDS: IntCounterVec = register_counter_vec(
        "producer_messages_total",
        "Messages published to the generation topic",
        &["topic", "outcome"],
    );
    pub static ref DLQ_PUBLISHES: IntCounterVec = register_counter_vec(
        "dlq_messages_total",
        "Records published to the dead-letter topic",
        &["outcome"],
    );
    pub static ref CONSUMER_RECORDS: IntCounter = register_counter(
        "consumer_records_total",
        "Records received by consumer workers",
    );
    pub static ref CONSUMER_MESSAGES: IntCounterVec = register_counter_vec(
        "consumer_messages_total",
        "Terminal outcome of each consumed message",
        &["outcome"],
    );
    pub static ref CONSUMER_LOOP_ERRORS: IntCounter = register_counter(
        "consumer_loop_errors_total",
        "Poll or commit failures in consumer loops",
    );
    pub static ref GENERATION_ATTEMPTS: IntCounterVec = register_counter_vec(
        "generation_attempts_total",
        "Document generation attempts made by consumers",
        &["outcome"],
    );
    pub static ref CALLBACK_ATTEMPTS: IntCounterVec = register_counter_vec(
        "callback_attempts_total",
        "Individual callback HTTP attempts",
        &["type", "outcome"],
    );
    pub static ref CALLBACK_RESULTS: IntCounterVec = register_counter_vec(
        "callback_deliveries_total",
        "Final callback delivery result after retries",
        &["type", "outcome"],
    );
    pub static ref ACTIVE_WORKERS: IntGauge = {
        let gauge = IntGauge::with_opts(
            Opts::new("consumer_active_workers", "Consumer worker loops currently running")
                .namespace(NAMESPACE),
        )
        .expect("valid gauge options");
        REGISTRY
            .register(Box::new(gauge.clone()))
            .expect("gauge registered once");
        gauge
    };
    pub static ref PROCESSING_SECONDS: HistogramVec = {
        let histogram = HistogramVec::new(
            HistogramOpts::new(
                "message_processing_seconds",
                "Wall time spent processing one consumed message",
            )
            .namespace(NAMESPACE),
            &["outcome"],
        )
        .expect("valid histogram options");
        REGISTRY
            .register(Box::new(histogram.clone()))
            .expect("histogram registered once");
        histogram
    };
}

fn register_counter_vec(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    let counter = IntCounterVec::new(Opts::new(name, help).namespace(NAMESPACE), labels)
        .expect("valid counter options");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("counter registered once");
    counter
}

fn register_counter(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::with_opts(Opts::new(name, help).namespace(NAMESPACE))
        .expect("valid counter options");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("counter registered once");
    counter
}

/// Force registration of every metric so `/metrics` lists them before first use.
pub fn init() {
    lazy_static::initialize(&PRODUCER_SENDS);
    lazy_static::initialize(&DLQ_PUBLISHES);
    lazy_static::initialize(&CONSUMER_RECORDS);
    lazy_static::initialize(&CONSUMER_MESSAGES);
    lazy_static::initialize(&CONSUMER_LOOP_ERRORS);
    lazy_static::initialize(&GENERATION_ATTEMPTS);
    lazy_static::initialize(&CALLBACK_ATTEMPTS);
    lazy_static::initialize(&CALLBACK_RESULTS);
    lazy_static::initialize(&ACTIVE_WORKERS);
    lazy_static::initialize(&PROCESSING_SECONDS);
}

/// Text exposition of the registry.
pub fn gather_text() -> Result<String, String> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| e.to_string())?;
    String::from_utf8(buffer).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_lists_registered_metrics() {
        init();
        CALLBACK_ATTEMPTS.with_label_values(&["document", "success"]).inc();

        let text = gather_text().unwrap();
        assert!(text.contains("sistemplate_callback_attempts_total"));
        assert!(text.contains("sistemplate_consumer_active_workers"));
    }
}
