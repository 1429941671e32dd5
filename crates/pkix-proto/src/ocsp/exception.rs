use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, StatusCode};
use tracing::warn;

use super::{OcspResponseStatus, RESPONSE_MIME_TYPE};
use crate::error::{MessageError, OcspErrorCode};
use crate::message::PkiMessage;
use crate::transport::{HttpReply, HttpTransportable};

/// Unsigned OCSP error response: `SEQUENCE { ENUMERATED status }`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionResponse {
    MalformedRequest,
    InternalError,
    TryLater,
    SigRequired,
    Unauthorized,
}

const MALFORMED_REQUEST: [u8; 5] = [0x30, 0x03, 0x0A, 0x01, 0x01];
const INTERNAL_ERROR: [u8; 5] = [0x30, 0x03, 0x0A, 0x01, 0x02];
const TRY_LATER: [u8; 5] = [0x30, 0x03, 0x0A, 0x01, 0x03];
const SIG_REQUIRED: [u8; 5] = [0x30, 0x03, 0x0A, 0x01, 0x05];
const UNAUTHORIZED: [u8; 5] = [0x30, 0x03, 0x0A, 0x01, 0x06];

impl ExceptionResponse {
    /// Error response for an OCSP error code.
    ///
    /// Codes with no response of their own fall back to `InternalError`.
    pub fn create_error_response(code: OcspErrorCode) -> Self {
        match code {
            OcspErrorCode::MalformedAsn1 => Self::MalformedRequest,
            OcspErrorCode::InternalError => Self::InternalError,
            OcspErrorCode::TryLater => Self::TryLater,
            OcspErrorCode::SigRequired => Self::SigRequired,
            OcspErrorCode::Unauthorized => Self::Unauthorized,
            other => {
                warn!(code = %other, "No dedicated error response, using InternalError");
                Self::InternalError
            }
        }
    }

    pub fn status(self) -> OcspResponseStatus {
        match self {
            Self::MalformedRequest => OcspResponseStatus::MalformedRequest,
            Self::InternalError => OcspResponseStatus::InternalError,
            Self::TryLater => OcspResponseStatus::TryLater,
            Self::SigRequired => OcspResponseStatus::SigRequired,
            Self::Unauthorized => OcspResponseStatus::Unauthorized,
        }
    }

    fn encoded(self) -> &'static [u8] {
        match self {
            Self::MalformedRequest => &MALFORMED_REQUEST,
            Self::InternalError => &INTERNAL_ERROR,
            Self::TryLater => &TRY_LATER,
            Self::SigRequired => &SIG_REQUIRED,
            Self::Unauthorized => &UNAUTHORIZED,
        }
    }

    /// The 200 reply; never fails
    pub fn reply(self) -> HttpReply {
        HttpReply {
            status: StatusCode::OK,
            headers: vec![(CONTENT_TYPE, HeaderValue::from_static(RESPONSE_MIME_TYPE))],
            body: Bytes::from_static(self.encoded()),
        }
    }
}

impl PkiMessage for ExceptionResponse {
    fn from_der(der: Vec<u8>) -> Result<Self, MessageError> {
        [
            Self::MalformedRequest,
            Self::InternalError,
            Self::TryLater,
            Self::SigRequired,
            Self::Unauthorized,
        ]
        .into_iter()
        .find(|candidate| candidate.encoded() == der.as_slice())
        .ok_or_else(|| MessageError::ocsp(OcspErrorCode::MalformedAsn1, "not an OCSP error response"))
    }

    fn der(&self) -> &[u8] {
        self.encoded()
    }
}

impl HttpTransportable for ExceptionResponse {
    const MIME_TYPE: &'static str = RESPONSE_MIME_TYPE;

    fn respond(&self) -> Result<HttpReply, MessageError> {
        Ok(self.reply())
    }
}
