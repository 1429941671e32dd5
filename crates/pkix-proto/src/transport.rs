//! HTTP transport for PKI messages
//!
//! Inbound requests are described by [`InboundRequest`], a framework-neutral
//! view of method, path and body; replies by [`HttpReply`]. The outbound side
//! is [`UpstreamClient`], an async `reqwest` client with a timeout and a
//! bounded retry on connection failures.
//!
//! GET requests carry the DER message base64-encoded in the path (RFC 6960
//! Appendix A.1); POST requests carry it raw with the message MIME type.

use async_trait::async_trait;
use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE},
    Engine,
};
use bytes::Bytes;
use http::header::{HeaderName, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{HttpError, MessageError, TransportError};
use crate::message::PkiMessage;

/// Characters left unescaped when placing base64 in a URL path
const PATH_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// An inbound HTTP request, reduced to what message decoding needs
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    /// Path below the service prefix, percent-encoded as received
    pub path_info: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// An HTTP reply ready to be written back to the client
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub body: Bytes,
}

impl HttpReply {
    /// Bare status with an empty body
    pub fn status_only(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn header(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.headers
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, value)| value)
    }
}

/// Reply received from an upstream server
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// A message that can be received from, replied with, or sent over HTTP
#[async_trait]
pub trait HttpTransportable: PkiMessage + Send + Sync {
    const MIME_TYPE: &'static str;

    /// Extract the DER payload from an inbound request.
    ///
    /// Methods outside `allowed` fail with 405; a POST with a different
    /// content type fails with 415; an empty or undecodable payload fails
    /// with 400.
    fn receive(request: &InboundRequest, allowed: &[Method]) -> Result<Vec<u8>, HttpError> {
        receive_payload(Self::MIME_TYPE, request, allowed)
    }

    /// Reply headers. Content-Type only unless the type has caching
    /// metadata to add.
    fn respond_headers(&self) -> Result<Vec<(HeaderName, HeaderValue)>, MessageError> {
        Ok(vec![(CONTENT_TYPE, HeaderValue::from_static(Self::MIME_TYPE))])
    }

    /// Build the 200 reply carrying this message
    fn respond(&self) -> Result<HttpReply, MessageError> {
        Ok(HttpReply {
            status: StatusCode::OK,
            headers: self.respond_headers()?,
            body: Bytes::copy_from_slice(self.der()),
        })
    }

    /// Send this message to `url` and return the raw reply
    async fn send(
        &self,
        client: &UpstreamClient,
        url: &str,
        method: &Method,
    ) -> Result<UpstreamReply, TransportError> {
        client.send_der(self.der(), Self::MIME_TYPE, url, method).await
    }
}

/// Payload extraction shared by every transportable type
pub fn receive_payload(
    mime_type: &str,
    request: &InboundRequest,
    allowed: &[Method],
) -> Result<Vec<u8>, HttpError> {
    if !allowed.contains(&request.method) {
        return Err(HttpError::method_not_allowed(format!(
            "Method {} not allowed",
            request.method
        )));
    }

    let data = match request.method {
        Method::GET => decode_get_path(&request.path_info)?,
        Method::POST => {
            if request.content_type.as_deref() != Some(mime_type) {
                return Err(HttpError::unsupported_media_type(format!(
                    "Content-Type must be {}",
                    mime_type
                )));
            }
            request.body.to_vec()
        }
        _ => {
            return Err(HttpError::method_not_allowed(format!(
                "Method {} not supported",
                request.method
            )))
        }
    };

    if data.is_empty() {
        return Err(HttpError::bad_request("Empty request"));
    }
    Ok(data)
}

/// Decode the base64 message carried in a GET path.
///
/// Leading slashes are part of the path separator unless the base64 text
/// itself starts with '/'; stripping `len % 4` characters when at least that
/// many leading slashes exist restores 4-character alignment.
pub fn decode_get_path(path_info: &str) -> Result<Vec<u8>, HttpError> {
    let decoded = percent_decode_str(path_info)
        .decode_utf8()
        .map_err(|_| HttpError::bad_request("Request path is not valid UTF-8"))?;

    let leading = decoded.bytes().take_while(|b| *b == b'/').count();
    let over = decoded.len() % 4;
    let text = if over <= leading {
        &decoded[over..]
    } else {
        &decoded[..]
    };

    if text.is_empty() {
        return Err(HttpError::bad_request("Empty request"));
    }

    STANDARD
        .decode(text)
        .or_else(|_| URL_SAFE.decode(text))
        .map_err(|_| HttpError::bad_request("Request path is not valid base64"))
}

/// Retry policy for upstream requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first
    pub max_retries: u32,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            interval: Duration::from_millis(500),
        }
    }
}

/// Async HTTP client for sending messages upstream
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl UpstreamClient {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { http, retry })
    }

    /// Send `der` with GET (base64 in the path) or POST (raw body).
    ///
    /// Connection failures and timeouts are retried per the policy; any
    /// response, whatever its status, is returned as is.
    pub async fn send_der(
        &self,
        der: &[u8],
        mime_type: &str,
        url: &str,
        method: &Method,
    ) -> Result<UpstreamReply, TransportError> {
        let target = match *method {
            Method::GET => format!(
                "{}/{}",
                url,
                utf8_percent_encode(&STANDARD.encode(der), PATH_SAFE)
            ),
            Method::POST => url.to_string(),
            _ => return Err(TransportError::UnsupportedMethod(method.to_string())),
        };

        let mut attempt = 0;
        loop {
            let builder = if *method == Method::POST {
                self.http
                    .post(&target)
                    .header(CONTENT_TYPE, mime_type)
                    .body(der.to_vec())
            } else {
                self.http.get(&target)
            };

            match builder.send().await {
                Ok(response) => {
                    let status = response.status();
                    let headers = response.headers().clone();
                    let body = response.bytes().await?;
                    debug!(url = %url, status = %status, bytes = body.len(), "Upstream replied");
                    return Ok(UpstreamReply {
                        status,
                        headers,
                        body,
                    });
                }
                Err(e) if (e.is_timeout() || e.is_connect()) && attempt < self.retry.max_retries => {
                    attempt += 1;
                    warn!(
                        url = %url,
                        attempt,
                        max_retries = self.retry.max_retries,
                        error = %e,
                        "Upstream request failed, retrying"
                    );
                    tokio::time::sleep(self.retry.interval).await;
                }
                Err(e) if e.is_timeout() => {
                    return Err(TransportError::Timeout {
                        url: url.to_string(),
                    })
                }
                Err(e) if e.is_connect() => {
                    return Err(TransportError::Unreachable {
                        url: url.to_string(),
                        reason: e.to_string(),
                    })
                }
                Err(e) => return Err(TransportError::Client(e)),
            }
        }
    }
}
