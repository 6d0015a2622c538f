//! Runtime configuration read from the environment (and `.env`).

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub bootstrap_servers: String,
    pub topic: String,
    pub dlq_topic: String,
    pub partitions: u32,
    pub health_check_timeout: Duration,
    /// Directory of the broker journal. `None` keeps the log in memory only.
    pub data_dir: Option<PathBuf>,
    /// Records kept per DLQ partition; older ones are dropped.
    pub dlq_retention: usize,
}

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub group_id: String,
    pub threads: usize,
    pub max_poll_records: usize,
    pub poll_timeout: Duration,
    pub max_retry_attempts: u32,
    pub retry_backoff: Duration,
    pub error_pause: Duration,
    pub shutdown_grace: Duration,
}

#[derive(Debug, Clone)]
pub struct CallbackConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_attempts: u32,
    pub backoff: Duration,
}

#[derive(Debug, Clone)]
pub struct TemplateConfig {
    pub dir: PathBuf,
    pub cache_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct PdfConfig {
    pub converter_bin: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub broker: BrokerConfig,
    pub consumer: ConsumerConfig,
    pub callback: CallbackConfig,
    pub templates: TemplateConfig,
    pub pdf: PdfConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: "localhost:9092".to_string(),
            topic: "document-generation".to_string(),
            dlq_topic: "document-generation-dlq".to_string(),
            partitions: 3,
            health_check_timeout: Duration::from_secs(5),
            data_dir: Some(PathBuf::from("./data/broker")),
            dlq_retention: 10_000,
        }
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            group_id: "sistemplate-document-consumer".to_string(),
            threads: 1,
            max_poll_records: 100,
            poll_timeout: Duration::from_millis(1000),
            max_retry_attempts: 3,
            retry_backoff: Duration::from_millis(5000),
            error_pause: Duration::from_millis(5000),
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(30),
            max_attempts: 3,
            backoff: Duration::from_millis(2000),
        }
    }
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./templates"),
            cache_ttl: Duration::from_secs(600),
        }
    }
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            converter_bin: PathBuf::from("wkhtmltopdf"),
        }
    }
}

impl AppConfig {
    /// Load `.env` if present, then read every setting from the environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup; unset keys keep their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = AppConfig::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        AppConfig {
            server: ServerConfig {
                host: get("SERVER_HOST").unwrap_or(d.server.host),
                port: parse_or(get("SERVER_PORT"), "SERVER_PORT", d.server.port),
            },
            broker: BrokerConfig {
                bootstrap_servers: get("BROKER_BOOTSTRAP_SERVERS").unwrap_or(d.broker.bootstrap_servers),
                topic: get("TOPIC_DOCUMENT_GENERATION").unwrap_or(d.broker.topic),
                dlq_topic: get("TOPIC_DOCUMENT_GENERATION_DLQ").unwrap_or(d.broker.dlq_topic),
                partitions: positive_or(get("TOPIC_PARTITIONS"), "TOPIC_PARTITIONS", d.broker.partitions),
                health_check_timeout: secs_or(
                    get("HEALTH_CHECK_TIMEOUT_SECONDS"),
                    "HEALTH_CHECK_TIMEOUT_SECONDS",
                    d.broker.health_check_timeout,
                ),
                data_dir: match get("BROKER_DATA_DIR") {
                    Some(dir) if dir.trim().eq_ignore_ascii_case("none") => None,
                    Some(dir) => Some(PathBuf::from(dir)),
                    None => d.broker.data_dir,
                },
                dlq_retention: positive_or(
                    get("BROKER_DLQ_RETENTION"),
                    "BROKER_DLQ_RETENTION",
                    d.broker.dlq_retention,
                ),
            },
            consumer: ConsumerConfig {
                group_id: get("CONSUMER_GROUP_ID").unwrap_or(d.consumer.group_id),
                threads: positive_or(get("CONSUMER_THREADS"), "CONSUMER_THREADS", d.consumer.threads),
                max_poll_records: positive_or(
                    get("CONSUMER_MAX_POLL_RECORDS"),
                    "CONSUMER_MAX_POLL_RECORDS",
                    d.consumer.max_poll_records,
                ),
                poll_timeout: millis_or(
                    get("CONSUMER_POLL_TIMEOUT_MS"),
                    "CONSUMER_POLL_TIMEOUT_MS",
                    d.consumer.poll_timeout,
                ),
                max_retry_attempts: positive_or(
                    get("CONSUMER_MAX_RETRY_ATTEMPTS"),
                    "CONSUMER_MAX_RETRY_ATTEMPTS",
                    d.consumer.max_retry_attempts,
                ),
                retry_backoff: millis_or(
                    get("CONSUMER_RETRY_BACKOFF_MS"),
                    "CONSUMER_RETRY_BACKOFF_MS",
                    d.consumer.retry_backoff,
                ),
                error_pause: millis_or(
                    get("CONSUMER_ERROR_PAUSE_MS"),
                    "CONSUMER_ERROR_PAUSE_MS",
                    d.consumer.error_pause,
                ),
                shutdown_grace: secs_or(
                    get("CONSUMER_SHUTDOWN_GRACE_SECONDS"),
                    "CONSUMER_SHUTDOWN_GRACE_SECONDS",
                    d.consumer.shutdown_grace,
                ),
            },
            callback: CallbackConfig {
                timeout: secs_or(get("CALLBACK_TIMEOUT_SECONDS"), "CALLBACK_TIMEOUT_SECONDS", d.callback.timeout),
                connect_timeout: secs_or(
                    get("CALLBACK_CONNECT_TIMEOUT_SECONDS"),
                    "CALLBACK_CONNECT_TIMEOUT_SECONDS",
                    d.callback.connect_timeout,
                ),
                max_attempts: positive_or(
                    get("CALLBACK_RETRY_ATTEMPTS"),
                    "CALLBACK_RETRY_ATTEMPTS",
                    d.callback.max_attempts,
                ),
                backoff: millis_or(
                    get("CALLBACK_RETRY_BACKOFF_MS"),
                    "CALLBACK_RETRY_BACKOFF_MS",
                    d.callback.backoff,
                ),
            },
            templates: TemplateConfig {
                dir: get("TEMPLATES_DIR").map(PathBuf::from).unwrap_or(d.templates.dir),
                cache_ttl: secs_or(
                    get("TEMPLATE_CACHE_TTL_SECONDS"),
                    "TEMPLATE_CACHE_TTL_SECONDS",
                    d.templates.cache_ttl,
                ),
            },
            pdf: PdfConfig {
                converter_bin: get("PDF_CONVERTER_BIN").map(PathBuf::from).unwrap_or(d.pdf.converter_bin),
            },
        }
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Display,
{
    match raw {
        None => default,
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            log::warn!("Invalid value '{}' for {}, using default: {}", value, key, default);
            default
        }),
    }
}

fn positive_or<T>(raw: Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Display + PartialOrd + Default + Copy,
{
    let value = parse_or(raw, key, default);
    if value <= T::default() {
        log::warn!("{} must be greater than zero, using default: {}", key, default);
        return default;
    }
    value
}

fn millis_or(raw: Option<String>, key: &str, default: Duration) -> Duration {
    Duration::from_millis(parse_or(raw, key, default.as_millis() as u64))
}

fn secs_or(raw: Option<String>, key: &str, default: Duration) -> Duration {
    Duration::from_secs(parse_or(raw, key, default.as_secs()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]);
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.broker.topic, "document-generation");
        assert_eq!(cfg.broker.dlq_topic, "document-generation-dlq");
        assert_eq!(cfg.broker.partitions, 3);
        assert_eq!(cfg.broker.data_dir, Some(PathBuf::from("./data/broker")));
        assert_eq!(cfg.broker.dlq_retention, 10_000);
        assert_eq!(cfg.consumer.group_id, "sistemplate-document-consumer");
        assert_eq!(cfg.consumer.max_retry_attempts, 3);
        assert_eq!(cfg.consumer.retry_backoff, Duration::from_millis(5000));
        assert_eq!(cfg.callback.backoff, Duration::from_millis(2000));
        assert_eq!(cfg.callback.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("SERVER_PORT", "9090"),
            ("TOPIC_PARTITIONS", "6"),
            ("CONSUMER_THREADS", "4"),
            ("CALLBACK_RETRY_BACKOFF_MS", "10"),
            ("TEMPLATES_DIR", "/srv/templates"),
            ("BROKER_DLQ_RETENTION", "50"),
        ]);
        assert_eq!(cfg.broker.dlq_retention, 50);
        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.broker.partitions, 6);
        assert_eq!(cfg.consumer.threads, 4);
        assert_eq!(cfg.callback.backoff, Duration::from_millis(10));
        assert_eq!(cfg.templates.dir, PathBuf::from("/srv/templates"));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let cfg = config(&[
            ("SERVER_PORT", "http"),
            ("TOPIC_PARTITIONS", "0"),
            ("CONSUMER_MAX_RETRY_ATTEMPTS", "-1"),
            ("BROKER_BOOTSTRAP_SERVERS", "   "),
        ]);
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.broker.partitions, 3);
        assert_eq!(cfg.consumer.max_retry_attempts, 3);
        assert_eq!(cfg.broker.bootstrap_servers, "localhost:9092");
    }

    #[test]
    fn test_broker_journal_can_be_disabled() {
        assert_eq!(config(&[("BROKER_DATA_DIR", "none")]).broker.data_dir, None);
        assert_eq!(
            config(&[("BROKER_DATA_DIR", "/var/lib/sistemplate")]).broker.data_dir,
            Some(PathBuf::from("/var/lib/sistemplate"))
        );
    }
}
