//! Shared fixtures for the end-to-end tests

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request as HttpRequest, Response as HttpResponse};
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use num_bigint::BigUint;
use pkix_proto::ocsp::{CertId, Request};
use pkix_proto::{oid, Node, PkiMessage};
use pkix_server::{router, FsStore, Responder};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub fn cert_id(serial: &str) -> CertId {
    CertId {
        hash_algorithm: oid::SHA1.to_string(),
        issuer_name_hash: "a1".repeat(20),
        issuer_key_hash: "b2".repeat(20),
        serial_number: serial.to_string(),
    }
}

pub fn request_der(id: &CertId) -> Vec<u8> {
    Request::create_from_params(id).unwrap().der().to_vec()
}

/// OCSPRequest with `count` entries in its requestList
pub fn request_with_entries(count: usize) -> Vec<u8> {
    let entries = (0..count)
        .map(|i| Node::sequence(vec![cert_id_node(&cert_id(&format!("{:x}", i + 1)))]))
        .collect();
    Node::sequence(vec![Node::sequence(vec![Node::sequence(entries)])]).to_der()
}

fn cert_id_node(id: &CertId) -> Node {
    Node::sequence(vec![
        Node::algorithm(&id.hash_algorithm).unwrap(),
        Node::octet_string(&hex::decode(&id.issuer_name_hash).unwrap()),
        Node::octet_string(&hex::decode(&id.issuer_key_hash).unwrap()),
        Node::integer(&BigUint::parse_bytes(id.serial_number.as_bytes(), 16).unwrap()),
    ])
}

/// Successful basic response for `id`; the signature is not checked
pub fn response_der(id: &CertId, next_update: Option<DateTime<Utc>>) -> Vec<u8> {
    let now = Utc::now();
    let mut single = vec![
        cert_id_node(id),
        Node::implicit_primitive(0, vec![]),
        Node::generalized_time(&now),
    ];
    if let Some(next) = next_update {
        single.push(Node::explicit(0, Node::generalized_time(&next)));
    }
    let basic = Node::sequence(vec![
        Node::sequence(vec![
            Node::explicit(2, Node::octet_string(&[0x42; 20])),
            Node::generalized_time(&now),
            Node::sequence(vec![Node::sequence(single)]),
        ]),
        Node::algorithm("1.2.840.113549.1.1.11").unwrap(),
        Node::bit_string(&[0u8; 64]),
    ])
    .to_der();

    Node::sequence(vec![
        Node::enumerated(0),
        Node::explicit(
            0,
            Node::sequence(vec![Node::oid(oid::OCSP_BASIC).unwrap(), Node::octet_string(&basic)]),
        ),
    ])
    .to_der()
}

pub fn fresh_response(id: &CertId) -> Vec<u8> {
    response_der(id, Some(Utc::now() + Duration::hours(6)))
}

/// Write `der` where the filesystem store looks for `id`
pub fn store_response(base: &Path, id: &CertId, der: &[u8]) {
    let dir = base
        .join(&id.hash_algorithm)
        .join(&id.issuer_name_hash)
        .join(&id.issuer_key_hash);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(&id.serial_number), der).unwrap();
}

/// Responder router over a fresh store directory
pub fn responder_app(prefix: &str, max_age: Option<u64>) -> (Router, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = FsStore::new(dir.path()).unwrap();
    let responder = Responder::new(
        Arc::new(store),
        max_age,
        vec![axum::http::Method::GET, axum::http::Method::POST],
    );
    (router(Arc::new(responder), prefix), dir)
}

pub async fn call(app: Router, request: HttpRequest<Body>) -> (HttpResponse<Body>, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    (HttpResponse::from_parts(parts, Body::empty()), bytes.to_vec())
}

pub fn post(uri: &str, content_type: &str, body: Vec<u8>) -> HttpRequest<Body> {
    HttpRequest::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", content_type)
        .body(Body::from(body))
        .unwrap()
}

pub fn get(uri: &str) -> HttpRequest<Body> {
    HttpRequest::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}
