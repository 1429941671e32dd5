//! OCSP forwarder: validates requests locally, then relays them upstream

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderName, CONNECTION, TE, TRAILER, TRANSFER_ENCODING, UPGRADE};
use http::Method;
use pkix_proto::ocsp::Request;
use pkix_proto::{HttpReply, HttpTransportable, InboundRequest, PkiMessage, UpstreamClient, UpstreamReply};
use tracing::{debug, info};

use crate::dispatch::{recover, ServiceError, Stage};
use crate::responder::OcspHandler;

/// Headers that describe the upstream connection rather than the reply
const HOP_BY_HOP: &[HeaderName] = &[CONNECTION, TE, TRAILER, TRANSFER_ENCODING, UPGRADE];

pub struct Forwarder {
    client: UpstreamClient,
    url: String,
    method: Method,
    allowed_methods: Vec<Method>,
}

impl Forwarder {
    pub fn new(client: UpstreamClient, url: impl Into<String>, method: Method, allowed_methods: Vec<Method>) -> Self {
        Self {
            client,
            url: url.into().trim_end_matches('/').to_string(),
            method,
            allowed_methods,
        }
    }

    async fn process(&self, request: &InboundRequest, stage: &mut Stage) -> Result<HttpReply, ServiceError> {
        let data = Request::receive(request, &self.allowed_methods)?;
        // Parsing only validates; the received bytes go upstream untouched
        let ocsp_request = Request::from_der(data)?;
        *stage = Stage::ParsedRequest;
        debug!(
            serial = %ocsp_request.cert_id().serial_number,
            upstream = %self.url,
            method = %self.method,
            "Forwarding OCSP request"
        );

        let upstream = ocsp_request.send(&self.client, &self.url, &self.method).await?;
        *stage = Stage::Forwarded;
        info!(
            serial = %ocsp_request.cert_id().serial_number,
            status = %upstream.status,
            bytes = upstream.body.len(),
            "Relayed upstream reply"
        );
        Ok(replay(upstream))
    }
}

/// Upstream status, headers and body as the client's reply
pub fn replay(upstream: UpstreamReply) -> HttpReply {
    let headers = upstream
        .headers
        .iter()
        .filter(|(name, _)| !HOP_BY_HOP.contains(name) && name.as_str() != "keep-alive")
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    HttpReply {
        status: upstream.status,
        headers,
        body: Bytes::from(upstream.body),
    }
}

#[async_trait]
impl OcspHandler for Forwarder {
    async fn handle(&self, request: &InboundRequest) -> HttpReply {
        let mut stage = Stage::ReceivedBytes;
        match self.process(request, &mut stage).await {
            Ok(reply) => reply,
            Err(e) => recover(e, stage),
        }
    }
}
