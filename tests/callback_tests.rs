mod common;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use common::{callback_config, CallbackReceiver};
use sistemplate_server::callback::CallbackDispatcher;
use sistemplate_server::config::CallbackConfig;

fn dispatcher(config: CallbackConfig) -> CallbackDispatcher {
    CallbackDispatcher::new(config, CancellationToken::new()).unwrap()
}

#[actix_web::test]
async fn test_document_callback_contract() {
    let receiver = CallbackReceiver::start(0).await;
    let dispatcher = dispatcher(callback_config());

    let delivered = dispatcher
        .send_document_callback(&receiver.url, "evt-1", b"%PDF-1.4 body", "fatura.pdf", "application/pdf")
        .await;
    assert!(delivered);

    let received = receiver.received();
    assert_eq!(received.len(), 1);
    let callback = &received[0];
    assert_eq!(callback.header("X-Event-Id"), Some("evt-1"));
    assert_eq!(callback.header("X-Callback-Type"), Some("document"));
    assert_eq!(callback.header("X-Attempt"), Some("1"));
    assert_eq!(callback.header("User-Agent"), Some("sistemplate-callback/1.0"));

    assert_eq!(callback.body["eventId"], "evt-1");
    assert_eq!(callback.body["status"], "SUCCESS");
    assert_eq!(callback.body["filename"], "fatura.pdf");
    assert_eq!(callback.body["contentType"], "application/pdf");
    assert_eq!(
        BASE64.decode(callback.body["document"].as_str().unwrap()).unwrap(),
        b"%PDF-1.4 body"
    );
    assert!(callback.body["timestamp"].is_string());
    assert!(callback.body.get("message").is_none());
    receiver.stop().await;
}

#[actix_web::test]
async fn test_error_callback_contract() {
    let receiver = CallbackReceiver::start(0).await;
    let dispatcher = dispatcher(callback_config());

    assert!(dispatcher
        .send_error_callback(&receiver.url, "evt-2", "Error generating document: boom")
        .await);

    let callback = &receiver.received()[0];
    assert_eq!(callback.header("X-Callback-Type"), Some("error"));
    assert_eq!(callback.body["status"], "ERROR");
    assert_eq!(callback.body["message"], "Error generating document: boom");
    assert!(callback.body.get("document").is_none());
    receiver.stop().await;
}

#[actix_web::test]
async fn test_retries_until_success() {
    let receiver = CallbackReceiver::start(2).await;
    let dispatcher = dispatcher(callback_config());

    assert!(dispatcher.send_error_callback(&receiver.url, "evt-3", "late").await);

    let attempts: Vec<String> = receiver
        .received()
        .iter()
        .map(|callback| callback.header("X-Attempt").unwrap_or_default().to_string())
        .collect();
    assert_eq!(attempts, vec!["1", "2", "3"]);
    receiver.stop().await;
}

#[actix_web::test]
async fn test_gives_up_after_max_attempts() {
    let receiver = CallbackReceiver::start(usize::MAX).await;
    let dispatcher = dispatcher(CallbackConfig {
        max_attempts: 2,
        ..callback_config()
    });

    assert!(!dispatcher.send_error_callback(&receiver.url, "evt-4", "never").await);
    assert_eq!(receiver.received().len(), 2);
    receiver.stop().await;
}

#[actix_web::test]
async fn test_backoff_grows_linearly() {
    let receiver = CallbackReceiver::start(usize::MAX).await;
    let dispatcher = dispatcher(CallbackConfig {
        max_attempts: 3,
        backoff: Duration::from_millis(100),
        ..callback_config()
    });

    let started = Instant::now();
    assert!(!dispatcher.send_error_callback(&receiver.url, "evt-5", "slow").await);
    // 100ms after the first failure, 200ms after the second, none after the last.
    assert!(started.elapsed() >= Duration::from_millis(300));
    receiver.stop().await;
}

#[actix_web::test]
async fn test_unreachable_url_fails() {
    let dispatcher = dispatcher(CallbackConfig {
        max_attempts: 2,
        ..callback_config()
    });

    assert!(!dispatcher.send_error_callback("http://127.0.0.1:1/callback", "evt-6", "gone").await);
}

#[actix_web::test]
async fn test_shutdown_cuts_backoff_short() {
    let receiver = CallbackReceiver::start(usize::MAX).await;
    let shutdown = CancellationToken::new();
    let dispatcher = CallbackDispatcher::new(
        CallbackConfig {
            backoff: Duration::from_secs(60),
            ..callback_config()
        },
        shutdown.clone(),
    )
    .unwrap();

    shutdown.cancel();
    let started = Instant::now();
    assert!(!dispatcher.send_error_callback(&receiver.url, "evt-7", "stop").await);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(receiver.received().len(), 1);
    receiver.stop().await;
}
