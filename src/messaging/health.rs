//! Readiness check for the broker connection.

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

use super::broker::BrokerAdmin;
use crate::config::BrokerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub name: String,
    pub status: HealthStatus,
    pub data: Map<String, Value>,
}

impl HealthReport {
    pub fn is_up(&self) -> bool {
        self.status == HealthStatus::Up
    }
}

pub struct BrokerHealthCheck {
    admin: Arc<dyn BrokerAdmin>,
    bootstrap_servers: String,
    topic: String,
    timeout: Duration,
}

impl BrokerHealthCheck {
    pub fn new(admin: Arc<dyn BrokerAdmin>, config: &BrokerConfig) -> Self {
        Self {
            admin,
            bootstrap_servers: config.bootstrap_servers.clone(),
            topic: config.topic.clone(),
            timeout: config.health_check_timeout,
        }
    }

    /// Up when the generation topic can be described within the timeout.
    pub async fn check(&self) -> HealthReport {
        let mut data = Map::new();
        data.insert("bootstrap.servers".into(), json!(self.bootstrap_servers));
        data.insert("topic".into(), json!(self.topic));

        let status = match tokio::time::timeout(self.timeout, self.admin.describe_topic(&self.topic)).await {
            Ok(Ok(description)) => {
                data.insert("partitions".into(), json!(description.partitions));
                HealthStatus::Up
            }
            Ok(Err(e)) => {
                log::warn!("Broker health check failed: {}", e);
                data.insert("error".into(), json!(e.to_string()));
                HealthStatus::Down
            }
            Err(_) => {
                log::warn!("Broker health check timed out after {:?}", self.timeout);
                data.insert("error".into(), json!(format!("timed out after {:?}", self.timeout)));
                HealthStatus::Down
            }
        };

        HealthReport {
            name: "Broker connection health check".to_string(),
            status,
            data,
        }
    }
}
