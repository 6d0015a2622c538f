//! Webhook delivery with bounded retries and linear backoff.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use super::models::{CallbackKind, CallbackPayload};
use crate::config::CallbackConfig;
use crate::metrics;

pub const USER_AGENT: &str = "sistemplate-callback/1.0";

pub struct CallbackDispatcher {
    client: Client,
    config: CallbackConfig,
    shutdown: CancellationToken,
}

impl CallbackDispatcher {
    pub fn new(config: CallbackConfig, shutdown: CancellationToken) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            config,
            shutdown,
        })
    }

    /// Deliver a generated document. Returns whether any attempt succeeded.
    pub async fn send_document_callback(
        &self,
        url: &str,
        event_id: &str,
        document: &[u8],
        filename: &str,
        content_type: &str,
    ) -> bool {
        log::info!("Sending document callback - event: {}, url: {}", event_id, url);
        let payload = CallbackPayload::document(event_id, BASE64.encode(document), filename, content_type);
        self.deliver(url, &payload, CallbackKind::Document).await
    }

    /// Deliver an error notification. Returns whether any attempt succeeded.
    pub async fn send_error_callback(&self, url: &str, event_id: &str, message: &str) -> bool {
        log::info!("Sending error callback - event: {}, url: {}", event_id, url);
        let payload = CallbackPayload::error(event_id, message);
        self.deliver(url, &payload, CallbackKind::Error).await
    }

    /// POST `payload` up to `max_attempts` times, sleeping `backoff × attempt`
    /// between failures. Never returns an error; shutdown ends the loop early.
    pub async fn deliver(&self, url: &str, payload: &CallbackPayload, kind: CallbackKind) -> bool {
        let body = match serde_json::to_string(payload) {
            Ok(body) => body,
            Err(e) => {
                log::error!("Failed to serialize callback for event {}: {}", payload.event_id, e);
                self.record_result(kind, false);
                return false;
            }
        };

        let max_attempts = self.config.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            if self.attempt(url, &body, &payload.event_id, kind, attempt).await {
                log::info!(
                    "Callback delivered - event: {}, type: {}, attempt: {}",
                    payload.event_id,
                    kind.as_str(),
                    attempt
                );
                self.record_result(kind, true);
                return true;
            }

            if attempt < max_attempts {
                let delay = self.config.backoff * attempt;
                log::debug!(
                    "Retrying callback for event {} in {:?} (attempt {}/{})",
                    payload.event_id,
                    delay,
                    attempt + 1,
                    max_attempts
                );
                tokio::select! {
                    _ = self.shutdown.cancelled() => {
                        log::warn!("Callback retries for event {} interrupted by shutdown", payload.event_id);
                        break;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        log::error!(
            "Callback failed after all attempts - event: {}, type: {}, url: {}",
            payload.event_id,
            kind.as_str(),
            url
        );
        self.record_result(kind, false);
        false
    }

    async fn attempt(&self, url: &str, body: &str, event_id: &str, kind: CallbackKind, attempt: u32) -> bool {
        let response = self
            .client
            .post(url)
            .timeout(self.config.timeout)
            .header(CONTENT_TYPE, "application/json")
            .header("X-Event-Id", event_id)
            .header("X-Callback-Type", kind.as_str())
            .header("X-Attempt", attempt.to_string())
            .body(body.to_string())
            .send()
            .await;

        let success = match response {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                log::warn!(
                    "Callback attempt {} for event {} returned status {}",
                    attempt,
                    event_id,
                    resp.status()
                );
                false
            }
            Err(e) => {
                log::warn!("Callback attempt {} for event {} failed: {}", attempt, event_id, e);
                false
            }
        };

        let outcome = if success { "success" } else { "failure" };
        metrics::CALLBACK_ATTEMPTS
            .with_label_values(&[kind.as_str(), outcome])
            .inc();
        success
    }

    fn record_result(&self, kind: CallbackKind, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        metrics::CALLBACK_RESULTS
            .with_label_values(&[kind.as_str(), outcome])
            .inc();
    }
}
