//! OCSP responder: answers requests from the response store

use async_trait::async_trait;
use http::Method;
use pkix_proto::ocsp::{Request, Response};
use pkix_proto::{HttpReply, HttpTransportable, InboundRequest, PkiMessage};
use std::sync::Arc;
use tracing::{debug, info};

use crate::dispatch::{recover, ServiceError, Stage};
use crate::store::Store;

/// Turns one inbound HTTP request into one reply. Never fails: errors are
/// answered inside the protocol or with a bare status.
#[async_trait]
pub trait OcspHandler: Send + Sync {
    async fn handle(&self, request: &InboundRequest) -> HttpReply;
}

pub struct Responder {
    store: Arc<dyn Store>,
    max_age: Option<u64>,
    allowed_methods: Vec<Method>,
}

impl Responder {
    pub fn new(store: Arc<dyn Store>, max_age: Option<u64>, allowed_methods: Vec<Method>) -> Self {
        Self {
            store,
            max_age,
            allowed_methods,
        }
    }

    async fn process(&self, request: &InboundRequest, stage: &mut Stage) -> Result<HttpReply, ServiceError> {
        let data = Request::receive(request, &self.allowed_methods)?;
        let ocsp_request = Request::from_der(data)?;
        *stage = Stage::ParsedRequest;

        let cert_id = ocsp_request.cert_id();
        debug!(
            serial = %cert_id.serial_number,
            issuer_key_hash = %cert_id.issuer_key_hash,
            signed = ocsp_request.is_signed(),
            "Parsed OCSP request"
        );

        let stored = self.store.get_response(cert_id).await?;
        *stage = Stage::LookedUp;

        let mut response = Response::from_der(stored)?;
        if let Some(max_age) = self.max_age {
            response.set_max_age(max_age);
        }

        let reply = response.respond()?;
        *stage = Stage::Responded;
        info!(
            serial = %cert_id.serial_number,
            status = response.cert_status()?.label(),
            "Answered OCSP request"
        );
        Ok(reply)
    }
}

#[async_trait]
impl OcspHandler for Responder {
    async fn handle(&self, request: &InboundRequest) -> HttpReply {
        let mut stage = Stage::ReceivedBytes;
        match self.process(request, &mut stage).await {
            Ok(reply) => reply,
            Err(e) => recover(e, stage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{cert_id, fresh_response, post, response_der, MemoryStore};
    use chrono::{Duration, Utc};
    use http::header::{CACHE_CONTROL, CONTENT_TYPE};
    use http::StatusCode;
    use pkix_proto::ocsp::ExceptionResponse;

    fn responder(store: MemoryStore, max_age: Option<u64>) -> (Responder, Arc<MemoryStore>) {
        let store = Arc::new(store);
        let responder = Responder::new(store.clone(), max_age, vec![Method::GET, Method::POST]);
        (responder, store)
    }

    fn request_der() -> Vec<u8> {
        Request::create_from_params(&cert_id()).unwrap().der().to_vec()
    }

    fn exception(reply: &HttpReply) -> ExceptionResponse {
        assert_eq!(reply.status, StatusCode::OK);
        ExceptionResponse::from_der(reply.body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_serves_stored_response() {
        let stored = fresh_response(&cert_id());
        let mut store = MemoryStore::default();
        store.responses.insert(cert_id(), stored.clone());
        let (responder, store) = responder(store, Some(600));

        let reply = responder.handle(&post(request_der())).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body.as_ref(), stored.as_slice());
        assert_eq!(reply.header(&CONTENT_TYPE).unwrap(), "application/ocsp-response");
        assert_eq!(
            reply.header(&CACHE_CONTROL).unwrap(),
            "max-age=600,public,no-transform,must-revalidate"
        );
        assert_eq!(store.lookups.lock().unwrap().as_slice(), &[cert_id()]);
    }

    #[tokio::test]
    async fn test_max_age_bounded_by_next_update() {
        let stored = response_der(&cert_id(), Some(Utc::now() + Duration::seconds(120)));
        let mut store = MemoryStore::default();
        store.responses.insert(cert_id(), stored);
        let (responder, _) = responder(store, Some(600));

        let reply = responder.handle(&post(request_der())).await;
        let value = reply.header(&CACHE_CONTROL).unwrap().to_str().unwrap().to_string();
        let max_age: u64 = value
            .trim_start_matches("max-age=")
            .split(',')
            .next()
            .unwrap()
            .parse()
            .unwrap();
        assert!(max_age <= 120 && max_age >= 118, "max-age {}", max_age);
    }

    #[tokio::test]
    async fn test_unknown_certificate_is_unauthorized() {
        let (responder, _) = responder(MemoryStore::default(), None);
        let reply = responder.handle(&post(request_der())).await;
        assert_eq!(exception(&reply), ExceptionResponse::Unauthorized);
    }

    #[tokio::test]
    async fn test_broken_store_is_internal_error() {
        let store = MemoryStore {
            broken: true,
            ..MemoryStore::default()
        };
        let (responder, _) = responder(store, None);
        let reply = responder.handle(&post(request_der())).await;
        assert_eq!(exception(&reply), ExceptionResponse::InternalError);
    }

    #[tokio::test]
    async fn test_malformed_request_skips_store() {
        let (responder, store) = responder(MemoryStore::default(), None);
        let reply = responder.handle(&post(vec![0x30, 0x02, 0x05])).await;
        assert_eq!(exception(&reply), ExceptionResponse::MalformedRequest);
        assert!(store.lookups.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_stored_response_is_malformed() {
        let mut store = MemoryStore::default();
        store.responses.insert(cert_id(), b"garbage".to_vec());
        let (responder, _) = responder(store, None);

        // Malformed stored data surfaces as MalformedAsn1 from the parser
        let reply = responder.handle(&post(request_der())).await;
        assert_eq!(exception(&reply), ExceptionResponse::MalformedRequest);
    }

    #[tokio::test]
    async fn test_wrong_content_type_is_bare_415() {
        let (responder, _) = responder(MemoryStore::default(), None);
        let mut request = post(request_der());
        request.content_type = Some("text/plain".to_string());

        let reply = responder.handle(&request).await;
        assert_eq!(reply.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(reply.body.is_empty());
        assert!(reply.headers.is_empty());
    }

    #[tokio::test]
    async fn test_disallowed_method() {
        let store = Arc::new(MemoryStore::default());
        let responder = Responder::new(store, None, vec![Method::POST]);
        let request = InboundRequest {
            method: Method::GET,
            path_info: "/MAA=".to_string(),
            content_type: None,
            body: Default::default(),
        };
        let reply = responder.handle(&request).await;
        assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
    }
}
