//! DER fixtures for unit tests

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use http::Method;
use num_bigint::BigUint;
use pkix_proto::ocsp::CertId;
use pkix_proto::{oid, InboundRequest, Node};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::store::{Store, StoreError};

pub(crate) fn cert_id() -> CertId {
    CertId {
        hash_algorithm: oid::SHA1.to_string(),
        issuer_name_hash: "4e".repeat(20),
        issuer_key_hash: "b7".repeat(20),
        serial_number: "1f2e3d".to_string(),
    }
}

fn cert_id_node(id: &CertId) -> Node {
    Node::sequence(vec![
        Node::algorithm(&id.hash_algorithm).unwrap(),
        Node::octet_string(&hex::decode(&id.issuer_name_hash).unwrap()),
        Node::octet_string(&hex::decode(&id.issuer_key_hash).unwrap()),
        Node::integer(&BigUint::parse_bytes(id.serial_number.as_bytes(), 16).unwrap()),
    ])
}

/// Successful response for `id` with status good. The signature is filler.
pub(crate) fn response_der(id: &CertId, next_update: Option<DateTime<Utc>>) -> Vec<u8> {
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

pub(crate) fn fresh_response(id: &CertId) -> Vec<u8> {
    response_der(id, Some(Utc::now() + Duration::hours(2)))
}

pub(crate) fn post(body: Vec<u8>) -> InboundRequest {
    InboundRequest {
        method: Method::POST,
        path_info: "/".to_string(),
        content_type: Some("application/ocsp-request".to_string()),
        body: body.into(),
    }
}

/// In-memory store; records every lookup
#[derive(Default)]
pub(crate) struct MemoryStore {
    pub responses: HashMap<CertId, Vec<u8>>,
    pub broken: bool,
    pub lookups: Mutex<Vec<CertId>>,
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_response(&self, cert_id: &CertId) -> Result<Vec<u8>, StoreError> {
        self.lookups.lock().unwrap().push(cert_id.clone());
        if self.broken {
            return Err(StoreError::Config("store offline".to_string()));
        }
        self.responses
            .get(cert_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(cert_id.serial_number.clone()))
    }
}
