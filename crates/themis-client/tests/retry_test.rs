//! Retry Policy Integration Tests
//!
//! These tests drive the request executor through a scripted transport and
//! verify:
//! - 5xx responses are retried up to `max_retries` attempts
//! - 4xx responses are returned without retrying
//! - transport failures are retried and the last one is surfaced
//! - backoff grows between attempts

mod common;

use common::*;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use themis_client::{
    HttpRequest, RequestExecutor, RetryConfig, ThemisClient, ThemisError, Transport,
};

fn executor(transport: Arc<dyn Transport>, max_retries: usize) -> RequestExecutor {
    RequestExecutor::new(transport, fast_retry(max_retries), Duration::from_secs(1)).unwrap()
}

// ============================================================================
// Status Handling Tests
// ============================================================================

#[tokio::test]
async fn test_server_errors_are_retried_then_surfaced() {
    let transport = MockTransport::new(|_| json_response(503, json!({"error": "busy"})));
    let executor = executor(transport.clone(), 3);

    let err = executor
        .execute(HttpRequest::get("http://shard/health"))
        .await
        .unwrap_err();

    assert_eq!(transport.calls(), 3);
    match err {
        ThemisError::HttpStatus { status, url, body } => {
            assert_eq!(status, 503);
            assert_eq!(url, "http://shard/health");
            assert!(body.contains("busy"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_then_success() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let transport = MockTransport::new(move |_| {
        if counter.fetch_add(1, Ordering::SeqCst) < 2 {
            json_response(500, json!({}))
        } else {
            json_response(200, json!({"status": "healthy"}))
        }
    });
    let executor = executor(transport.clone(), 3);

    let response = executor
        .execute(HttpRequest::get("http://shard/health"))
        .await
        .unwrap();
    assert!(response.is_success());
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    for status in [400, 401, 404, 409, 422] {
        let transport = MockTransport::new(move |_| json_response(status, json!({})));
        let executor = executor(transport.clone(), 5);

        let response = executor
            .execute(HttpRequest::get("http://shard/entities/k"))
            .await
            .unwrap();
        assert_eq!(response.status.as_u16(), status);
        assert_eq!(transport.calls(), 1);
    }
}

#[tokio::test]
async fn test_single_attempt_does_not_retry() {
    let transport = MockTransport::new(|_| json_response(502, json!({})));
    let executor = executor(transport.clone(), 1);

    let err = executor
        .execute(HttpRequest::get("http://shard/health"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(502));
    assert_eq!(transport.calls(), 1);
}

// ============================================================================
// Transport Failure Tests
// ============================================================================

#[tokio::test]
async fn test_transport_errors_are_retried() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let transport = MockTransport::new(move |_| {
        let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
        Err(ThemisError::Transport(format!("connection refused ({})", attempt)))
    });
    let executor = executor(transport.clone(), 4);

    let err = executor
        .execute(HttpRequest::get("http://shard/health"))
        .await
        .unwrap_err();
    assert_eq!(transport.calls(), 4);
    assert_eq!(err.to_string(), "Transport error: connection refused (4)");
}

#[tokio::test]
async fn test_timeout_then_success() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let transport = MockTransport::new(move |_| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(ThemisError::Timeout(1000))
        } else {
            json_response(200, json!({}))
        }
    });
    let executor = executor(transport.clone(), 3);

    assert!(executor
        .execute(HttpRequest::get("http://shard/health"))
        .await
        .is_ok());
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_non_transport_errors_are_not_retried() {
    let transport = MockTransport::new(|_| Err(ThemisError::Protocol("bad frame".to_string())));
    let executor = executor(transport.clone(), 3);

    let err = executor
        .execute(HttpRequest::get("http://shard/health"))
        .await
        .unwrap_err();
    assert!(matches!(err, ThemisError::Protocol(_)));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_backoff_delays_retries() {
    let transport = MockTransport::new(|_| json_response(500, json!({})));
    let retry = RetryConfig {
        max_retries: 3,
        initial_backoff_ms: 20,
        max_backoff_ms: 1000,
        backoff_multiplier: 2.0,
    };
    let executor = RequestExecutor::new(transport, retry, Duration::from_secs(1)).unwrap();

    let started = Instant::now();
    let _ = executor.execute(HttpRequest::get("http://shard/health")).await;

    // 20ms + 40ms between the three attempts.
    assert!(started.elapsed() >= Duration::from_millis(60));
}

#[tokio::test]
async fn test_executor_rejects_zero_attempts() {
    let transport = MockTransport::new(|_| json_response(200, json!({})));
    let result = RequestExecutor::new(transport, fast_retry(0), Duration::from_secs(1));
    assert!(matches!(result, Err(ThemisError::Config(_))));
}

// ============================================================================
// Client Wiring Tests
// ============================================================================

#[tokio::test]
async fn test_health_through_mock_transport() {
    let transport = MockTransport::new(|request| {
        assert_eq!(request.url, "http://node-1:8765/health");
        json_response(200, json!({"status": "healthy", "version": "1.0"}))
    });
    let client = ThemisClient::with_transport(
        test_config(["http://node-1:8765/", "http://node-2:8765"]),
        transport.clone(),
    )
    .unwrap();

    let health = client.health(None).await.unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_client_rejects_https_endpoints() {
    let result = ThemisClient::new(test_config(["https://node-1:8443"]));
    match result {
        Err(ThemisError::Config(message)) => assert!(message.contains("https://node-1:8443")),
        Err(other) => panic!("expected config error, got {:?}", other),
        Ok(_) => panic!("https endpoint was accepted"),
    }
}
