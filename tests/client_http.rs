//! Transport tests against a mock collection service.
//!
//! The client is synchronous, so every construction and call happens on
//! a blocking task while wiremock serves from the test runtime.

use serde_json::json;
use traceline::{Attributes, ClientConfig, Span, Trace, TraceClient, TraceStatus};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Routes client `tracing` output to the test harness. Safe to call
/// from every test; only the first initialization wins.
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn sample_trace() -> Trace {
    let mut trace = Trace::new("checkout").with_service("shop");
    let mut span = Span::new(trace.trace_id.clone(), "charge");
    span.set_attribute("amount", 19.99f64);
    span.close(TraceStatus::Ok);
    trace.push_span(span).unwrap();
    trace.end(TraceStatus::Ok);
    trace
}

#[tokio::test]
async fn send_trace_returns_true_on_200() {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/traces"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let accepted = tokio::task::spawn_blocking(move || {
        let client = TraceClient::new(ClientConfig::default().endpoint(uri)).unwrap();
        client.send_trace(&sample_trace())
    })
    .await
    .unwrap();

    assert!(accepted);
}

#[tokio::test]
async fn send_trace_posts_canonical_wire_shape() {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/traces"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let uri = server.uri();
    let trace_id = tokio::task::spawn_blocking(move || {
        let client = TraceClient::new(ClientConfig::default().endpoint(uri)).unwrap();
        let trace = sample_trace();
        assert!(client.send_trace(&trace));
        trace.trace_id
    })
    .await
    .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["trace_id"], trace_id.as_str());
    assert_eq!(body["name"], "checkout");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service_name"], "shop");
    assert_eq!(body["spans"].as_array().unwrap().len(), 1);
    let span = &body["spans"][0];
    assert_eq!(span["trace_id"], trace_id.as_str());
    assert!(span["parent_span_id"].is_null());
    assert_eq!(span["attributes"]["amount"], 19.99);
    assert!(span["events"].is_array());
    // RFC3339 timestamps.
    assert!(body["start_time"].as_str().unwrap().contains('T'));
}

#[tokio::test]
async fn send_trace_carries_standard_headers() {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/traces"))
        .and(header("Authorization", "Bearer secret-key"))
        .and(header("Content-Type", "application/json"))
        .and(header("User-Agent", concat!("traceline-rust-sdk/", env!("CARGO_PKG_VERSION"))))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let accepted = tokio::task::spawn_blocking(move || {
        let client =
            TraceClient::new(ClientConfig::default().endpoint(uri).api_key("secret-key"))
                .unwrap();
        client.send_trace(&sample_trace())
    })
    .await
    .unwrap();

    assert!(accepted);
}

#[tokio::test]
async fn send_trace_returns_false_on_rejection() {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/traces"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let uri = server.uri();
    let accepted = tokio::task::spawn_blocking(move || {
        let client = TraceClient::new(ClientConfig::default().endpoint(uri)).unwrap();
        client.send_trace(&sample_trace())
    })
    .await
    .unwrap();

    assert!(!accepted);
}

#[tokio::test]
async fn send_trace_returns_false_when_unreachable() {
    init_test_tracing();
    let accepted = tokio::task::spawn_blocking(|| {
        let client = TraceClient::new(
            ClientConfig::default()
                .endpoint("http://127.0.0.1:1")
                .timeout(std::time::Duration::from_millis(200)),
        )
        .unwrap();
        client.send_trace(&sample_trace())
    })
    .await
    .unwrap();

    assert!(!accepted);
}

#[tokio::test]
async fn health_reflects_endpoint_status() {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let uri = server.uri();
    let healthy = tokio::task::spawn_blocking(move || {
        let client = TraceClient::new(ClientConfig::default().endpoint(uri)).unwrap();
        client.health()
    })
    .await
    .unwrap();

    assert!(healthy);
}

#[tokio::test]
async fn fetch_stats_parses_json_body() {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"total_traces": 3})))
        .mount(&server)
        .await;

    let uri = server.uri();
    let stats = tokio::task::spawn_blocking(move || {
        let client = TraceClient::new(ClientConfig::default().endpoint(uri)).unwrap();
        client.fetch_stats().unwrap()
    })
    .await
    .unwrap();

    assert_eq!(stats["total_traces"], 3);
}

#[tokio::test]
async fn fetch_traces_surfaces_transport_errors() {
    init_test_tracing();
    let err = tokio::task::spawn_blocking(|| {
        let client = TraceClient::new(
            ClientConfig::default()
                .endpoint("http://127.0.0.1:1")
                .timeout(std::time::Duration::from_millis(200)),
        )
        .unwrap();
        client.fetch_traces().unwrap_err()
    })
    .await
    .unwrap();

    assert_eq!(err.category(), "network");
    assert!(err.is_recoverable());
}
