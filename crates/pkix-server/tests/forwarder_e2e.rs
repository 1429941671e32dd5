//! End-to-end tests for forwarder mode against real local upstreams

mod common;

use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{Method, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use common::*;
use pkix_proto::ocsp::ExceptionResponse;
use pkix_proto::{PkiMessage, RetryPolicy, UpstreamClient};
use pkix_server::{router, Config, Forwarder, Mode, PkixServer, UpstreamConfig};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

async fn spawn(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn forwarder_app(url: String, method: Method, timeout: Duration, max_retries: u32) -> Router {
    let client = UpstreamClient::new(
        timeout,
        RetryPolicy {
            max_retries,
            interval: Duration::from_millis(20),
        },
    )
    .unwrap();
    let forwarder = Forwarder::new(client, url, method, vec![Method::GET, Method::POST]);
    router(Arc::new(forwarder), "")
}

#[tokio::test]
async fn test_forwards_to_responder_over_post_and_get() {
    let (upstream, dir) = responder_app("/ocsp", Some(300));
    let id = cert_id("abcdef");
    let stored = fresh_response(&id);
    store_response(dir.path(), &id, &stored);
    let addr = spawn(upstream).await;

    for method in [Method::POST, Method::GET] {
        let app = forwarder_app(
            format!("http://{}/ocsp", addr),
            method.clone(),
            Duration::from_secs(5),
            0,
        );
        let (response, body) = call(app, post("/", "application/ocsp-request", request_der(&id))).await;

        assert_eq!(response.status(), StatusCode::OK, "upstream over {}", method);
        assert_eq!(body, stored);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/ocsp-response");
        assert_eq!(
            response.headers()[CACHE_CONTROL],
            "max-age=300,public,no-transform,must-revalidate"
        );
    }
}

#[tokio::test]
async fn test_client_get_is_forwarded() {
    let (upstream, dir) = responder_app("", None);
    let id = cert_id("4242");
    let stored = fresh_response(&id);
    store_response(dir.path(), &id, &stored);
    let addr = spawn(upstream).await;

    let app = forwarder_app(format!("http://{}", addr), Method::POST, Duration::from_secs(5), 0);
    let uri = format!("/{}", STANDARD.encode(request_der(&id)));
    let (response, body) = call(app, get(&uri)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body, stored);
}

#[tokio::test]
async fn test_upstream_error_responses_are_replayed() {
    let (upstream, _dir) = responder_app("", None);
    let addr = spawn(upstream).await;

    let app = forwarder_app(format!("http://{}", addr), Method::POST, Duration::from_secs(5), 0);
    let (response, body) =
        call(app, post("/", "application/ocsp-request", request_der(&cert_id("999")))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        ExceptionResponse::from_der(body).unwrap(),
        ExceptionResponse::Unauthorized
    );
}

#[tokio::test]
async fn test_upstream_http_status_is_replayed() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let upstream = Router::new().fallback(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            (StatusCode::SERVICE_UNAVAILABLE, "maintenance")
        }
    });
    let addr = spawn(upstream).await;

    let app = forwarder_app(format!("http://{}", addr), Method::POST, Duration::from_secs(5), 3);
    let (response, body) =
        call(app, post("/", "application/ocsp-request", request_der(&cert_id("1")))).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, b"maintenance");
    // Replies are never retried, whatever their status
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_slow_upstream_times_out_after_retries() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let upstream = Router::new().fallback(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(5)).await;
            StatusCode::OK
        }
    });
    let addr = spawn(upstream).await;

    let app = forwarder_app(format!("http://{}", addr), Method::POST, Duration::from_millis(200), 2);
    let (response, body) =
        call(app, post("/", "application/ocsp-request", request_der(&cert_id("1")))).await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(body.is_empty());
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_malformed_request_never_reaches_upstream() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let upstream = Router::new().fallback(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            StatusCode::OK
        }
    });
    let addr = spawn(upstream).await;

    let app = forwarder_app(format!("http://{}", addr), Method::POST, Duration::from_secs(5), 0);
    let (response, body) =
        call(app.clone(), post("/", "application/ocsp-request", request_with_entries(0))).await;
    assert_eq!(
        ExceptionResponse::from_der(body).unwrap(),
        ExceptionResponse::MalformedRequest
    );
    assert_eq!(response.status(), StatusCode::OK);

    let (response, _) = call(app, post("/", "text/plain", request_der(&cert_id("1")))).await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_forwarder_from_config() {
    let (upstream, dir) = responder_app("", None);
    let id = cert_id("f00d");
    let stored = fresh_response(&id);
    store_response(dir.path(), &id, &stored);
    let addr = spawn(upstream).await;

    let config = Config {
        mode: Mode::Forwarder,
        upstream: Some(UpstreamConfig {
            url: format!("http://{}/", addr),
            method: "get".to_string(),
            timeout_secs: 5,
            max_retries: 0,
            retry_interval_ms: 10,
        }),
        ..Config::default()
    };
    let server = PkixServer::from_config(&config).unwrap();

    let (response, body) = call(
        server.router(),
        post("/", "application/ocsp-request", request_der(&id)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body, stored);
}
