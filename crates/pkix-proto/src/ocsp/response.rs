use chrono::{DateTime, Utc};
use http::header::{HeaderName, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, ETAG, EXPIRES, LAST_MODIFIED};
use http::HeaderValue;
use sha1::{Digest, Sha1};
use tracing::warn;

use super::{CertId, CertStatus, OcspResponseStatus, RESPONSE_MIME_TYPE};
use crate::asn1::{Selector, Tlv};
use crate::error::{MessageError, OcspErrorCode, ParseFailure, Protocol};
use crate::message::{PkiMessage, Signable, SignatureParts};
use crate::oid;
use crate::transport::HttpTransportable;
use crate::util;

/// Response types this engine can decode, by responseType OID
const KNOWN_RESPONSE_TYPES: &[&str] = &[oid::OCSP_BASIC];

/// Timestamps of a basic response and its single response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseDates {
    pub produced_at: DateTime<Utc>,
    pub this_update: DateTime<Utc>,
    pub next_update: Option<DateTime<Utc>>,
    pub revocation_time: Option<DateTime<Utc>>,
}

/// The OCSPResponse envelope
///
/// Per-certificate accessors delegate to the embedded [`BasicResponse`] and
/// fail with [`MessageError::NoBasicResponse`] when there is none.
#[derive(Debug, Clone)]
pub struct Response {
    der: Vec<u8>,
    status: OcspResponseStatus,
    response_type: Option<String>,
    basic: Option<BasicResponse>,
    max_age: Option<u64>,
}

impl Response {
    pub fn status(&self) -> OcspResponseStatus {
        self.status
    }

    /// responseType OID, when responseBytes are present
    pub fn response_type(&self) -> Option<&str> {
        self.response_type.as_deref()
    }

    pub fn basic(&self) -> Result<&BasicResponse, MessageError> {
        self.basic
            .as_ref()
            .ok_or_else(|| MessageError::no_basic_response())
    }

    /// Upper bound for the advertised max-age
    pub fn set_max_age(&mut self, seconds: u64) {
        self.max_age = Some(seconds);
    }

    pub fn max_age(&self) -> Option<u64> {
        self.max_age
    }

    pub fn produced_at(&self) -> Result<DateTime<Utc>, MessageError> {
        Ok(self.basic()?.produced_at())
    }

    pub fn cert_id(&self) -> Result<&CertId, MessageError> {
        Ok(self.basic()?.single().cert_id())
    }

    pub fn cert_status(&self) -> Result<CertStatus, MessageError> {
        Ok(self.basic()?.single().cert_status())
    }

    pub fn this_update(&self) -> Result<DateTime<Utc>, MessageError> {
        Ok(self.basic()?.single().this_update())
    }

    pub fn next_update(&self) -> Result<Option<DateTime<Utc>>, MessageError> {
        Ok(self.basic()?.single().next_update())
    }

    pub fn revocation_time(&self) -> Result<Option<DateTime<Utc>>, MessageError> {
        Ok(self.cert_status()?.revocation_time())
    }

    /// All timestamps carried by the response
    pub fn dates(&self) -> Result<ResponseDates, MessageError> {
        let basic = self.basic()?;
        let single = basic.single();
        Ok(ResponseDates {
            produced_at: basic.produced_at(),
            this_update: single.this_update(),
            next_update: single.next_update(),
            revocation_time: single.cert_status().revocation_time(),
        })
    }

    /// Seconds a cache may keep this response at `now`.
    ///
    /// The time left until nextUpdate, clamped at zero and capped by the
    /// configured max-age. Zero when there is no nextUpdate.
    pub fn cache_max_age(&self, now: DateTime<Utc>) -> Result<u64, MessageError> {
        let single = self.basic()?.single();
        let Some(next_update) = single.next_update() else {
            return Ok(0);
        };

        let remaining = (next_update - now).num_seconds();
        if remaining < 0 {
            let id = single.cert_id();
            warn!(
                serial = %id.serial_number,
                issuer_name_hash = %id.issuer_name_hash,
                issuer_key_hash = %id.issuer_key_hash,
                next_update = %next_update,
                "Serving stale OCSP response"
            );
        }

        let remaining = remaining.max(0) as u64;
        Ok(self.max_age.map_or(remaining, |cap| cap.min(remaining)))
    }

    /// Cache-Control value for `now`
    pub fn cache_control(&self, now: DateTime<Utc>) -> Result<String, MessageError> {
        Ok(format!(
            "max-age={},public,no-transform,must-revalidate",
            self.cache_max_age(now)?
        ))
    }

    /// Entity tag: quoted SHA-1 of the encoded response
    pub fn etag(&self) -> String {
        format!("\"{}\"", hex::encode(Sha1::digest(&self.der)))
    }

    /// RFC 5019 caching headers computed against `now`
    pub fn headers_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<(HeaderName, HeaderValue)>, MessageError> {
        let basic = self.basic()?;
        let mut headers = vec![
            (CONTENT_TYPE, HeaderValue::from_static(RESPONSE_MIME_TYPE)),
            (CONTENT_LENGTH, HeaderValue::from(self.der.len())),
            (ETAG, header_value(self.etag())?),
            (LAST_MODIFIED, header_value(util::http_date(&basic.produced_at()))?),
        ];
        if let Some(next_update) = basic.single().next_update() {
            headers.push((EXPIRES, header_value(util::http_date(&next_update))?));
        }
        headers.push((CACHE_CONTROL, header_value(self.cache_control(now)?)?));
        Ok(headers)
    }

    fn parse(der: &[u8]) -> Result<Parsed, ParseFailure> {
        let root = Tlv::parse(der)?;
        root.expect(&Selector::SEQUENCE)?;

        let code = root.child(0)?.as_u64()?;
        let status = u8::try_from(code)
            .ok()
            .and_then(OcspResponseStatus::from_u8)
            .ok_or_else(|| {
                MessageError::ocsp(
                    OcspErrorCode::MalformedAsn1,
                    format!("unknown response status {}", code),
                )
            })?;

        let Some(wrapper) = root.find(&Selector::explicit(0)) else {
            return Ok(Parsed {
                status,
                response_type: None,
                basic: None,
            });
        };

        let bytes = wrapper.child(0)?.expect(&Selector::SEQUENCE)?;
        let response_type = bytes.child(0)?.as_oid()?;
        let basic = if KNOWN_RESPONSE_TYPES.contains(&response_type.as_str()) {
            let inner = bytes.require(&Selector::OCTET_STRING)?.content();
            Some(BasicResponse::from_der(inner.to_vec())?)
        } else {
            warn!(response_type = %response_type, "Unrecognised OCSP response type");
            None
        };

        Ok(Parsed {
            status,
            response_type: Some(response_type),
            basic,
        })
    }
}

struct Parsed {
    status: OcspResponseStatus,
    response_type: Option<String>,
    basic: Option<BasicResponse>,
}

fn header_value(value: String) -> Result<HeaderValue, MessageError> {
    HeaderValue::try_from(value)
        .map_err(|e| MessageError::ocsp(OcspErrorCode::InternalError, format!("invalid header value: {}", e)))
}

impl PkiMessage for Response {
    fn from_der(der: Vec<u8>) -> Result<Self, MessageError> {
        let parsed = Self::parse(&der).map_err(|e| e.into_message(Protocol::Ocsp))?;
        Ok(Self {
            der,
            status: parsed.status,
            response_type: parsed.response_type,
            basic: parsed.basic,
            max_age: None,
        })
    }

    fn der(&self) -> &[u8] {
        &self.der
    }
}

impl Signable for Response {
    fn signed_data(&self) -> Result<Vec<u8>, MessageError> {
        self.basic()?.signed_data()
    }

    fn signature_raw(&self) -> Result<Vec<u8>, MessageError> {
        self.basic()?.signature_raw()
    }

    fn signature_algorithm(&self) -> Result<String, MessageError> {
        self.basic()?.signature_algorithm()
    }

    fn signer_certs(&self) -> Result<Vec<Vec<u8>>, MessageError> {
        self.basic()?.signer_certs()
    }
}

impl HttpTransportable for Response {
    const MIME_TYPE: &'static str = RESPONSE_MIME_TYPE;

    fn respond_headers(&self) -> Result<Vec<(HeaderName, HeaderValue)>, MessageError> {
        self.headers_at(Utc::now())
    }
}

/// BasicOCSPResponse
#[derive(Debug, Clone)]
pub struct BasicResponse {
    der: Vec<u8>,
    produced_at: DateTime<Utc>,
    responses: usize,
    single: SingleResponse,
    signature: SignatureParts,
}

impl BasicResponse {
    pub fn produced_at(&self) -> DateTime<Utc> {
        self.produced_at
    }

    /// The first SingleResponse; any others are not decoded
    pub fn single(&self) -> &SingleResponse {
        &self.single
    }

    /// Number of SingleResponses in the response list
    pub fn response_count(&self) -> usize {
        self.responses
    }

    fn parse(der: &[u8]) -> Result<BasicResponse, ParseFailure> {
        let root = Tlv::parse(der)?;
        root.expect(&Selector::SEQUENCE)?;
        let tbs = root.child(0)?.expect(&Selector::SEQUENCE)?;

        let produced_at = tbs.require(&Selector::GENERALIZED_TIME)?.as_generalized_time()?;
        let responses = tbs.require(&Selector::SEQUENCE)?;
        let single = SingleResponse::from_tlv(responses.child(0)?)?;

        let signature = SignatureParts::from_fields(
            tbs,
            root.child(1)?,
            root.child(2)?,
            root.find(&Selector::explicit(0)),
        )?;

        Ok(BasicResponse {
            der: der.to_vec(),
            produced_at,
            responses: responses.len(),
            single,
            signature,
        })
    }
}

impl PkiMessage for BasicResponse {
    fn from_der(der: Vec<u8>) -> Result<Self, MessageError> {
        Self::parse(&der).map_err(|e| e.into_message(Protocol::Ocsp))
    }

    fn der(&self) -> &[u8] {
        &self.der
    }
}

impl Signable for BasicResponse {
    fn signed_data(&self) -> Result<Vec<u8>, MessageError> {
        Ok(self.signature.signed_data.clone())
    }

    fn signature_raw(&self) -> Result<Vec<u8>, MessageError> {
        Ok(self.signature.value.clone())
    }

    fn signature_algorithm(&self) -> Result<String, MessageError> {
        Ok(self.signature.algorithm.clone())
    }

    fn signer_certs(&self) -> Result<Vec<Vec<u8>>, MessageError> {
        Ok(self.signature.certs.clone())
    }
}

/// Status of one certificate within a BasicResponse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleResponse {
    cert_id: CertId,
    cert_status: CertStatus,
    this_update: DateTime<Utc>,
    next_update: Option<DateTime<Utc>>,
}

impl SingleResponse {
    pub fn cert_id(&self) -> &CertId {
        &self.cert_id
    }

    pub fn cert_status(&self) -> CertStatus {
        self.cert_status
    }

    pub fn this_update(&self) -> DateTime<Utc> {
        self.this_update
    }

    pub fn next_update(&self) -> Option<DateTime<Utc>> {
        self.next_update
    }

    fn from_tlv(node: &Tlv<'_>) -> Result<Self, ParseFailure> {
        node.expect(&Selector::SEQUENCE)?;
        let cert_id = CertId::from_tlv(node.child(0)?)?;

        let status = node.child(1)?;
        let cert_status = match status.tag().0 {
            _ if status.class() != der_parser::asn1_rs::Class::ContextSpecific => {
                return Err(MessageError::ocsp(OcspErrorCode::MalformedAsn1, "certStatus is not context-tagged").into())
            }
            0 => CertStatus::Good,
            1 => {
                let revocation_time = status.child(0)?.as_generalized_time()?;
                let reason = match status.find(&Selector::explicit(0)) {
                    Some(wrapper) => Some(u8::try_from(wrapper.child(0)?.as_u64()?).map_err(|_| {
                        MessageError::ocsp(OcspErrorCode::MalformedAsn1, "revocation reason out of range")
                    })?),
                    None => None,
                };
                CertStatus::Revoked {
                    revocation_time,
                    reason,
                }
            }
            2 => CertStatus::Unknown,
            other => {
                return Err(MessageError::ocsp(
                    OcspErrorCode::MalformedAsn1,
                    format!("unknown certStatus tag {}", other),
                )
                .into())
            }
        };

        let this_update = node.require(&Selector::GENERALIZED_TIME)?.as_generalized_time()?;
        let next_update = match node.find(&Selector::explicit(0)) {
            Some(wrapper) => Some(wrapper.child(0)?.as_generalized_time()?),
            None => None,
        };

        Ok(Self {
            cert_id,
            cert_status,
            this_update,
            next_update,
        })
    }
}
