//! Error types for message handling
//!
//! Two families are kept apart:
//!
//! - [`MessageError`]: a problem with the content of a message. OCSP errors
//!   carry an [`OcspErrorCode`] that the responder maps onto an unsigned
//!   OCSP error response.
//! - [`HttpError`] and [`TransportError`]: a problem with the HTTP exchange
//!   itself. These map onto plain HTTP status codes.
//!
//! Every error records the source location where it was raised, which the
//! server logs alongside the message.

use http::StatusCode;
use std::fmt;
use std::panic::Location;

use crate::asn1::Asn1Error;

/// OCSP error codes (RFC 6960 response statuses plus request-level failures)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OcspErrorCode {
    Success = 0,
    MalformedAsn1 = 1,
    InternalError = 2,
    TryLater = 3,
    SigRequired = 5,
    Unauthorized = 6,
    UnsupportedVersion = 12,
    ReqListEmpty = 13,
    ReqListMulti = 14,
    UnsupportedExtension = 15,
    UnsupportedAlgorithm = 16,
}

impl OcspErrorCode {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Success),
            1 => Some(Self::MalformedAsn1),
            2 => Some(Self::InternalError),
            3 => Some(Self::TryLater),
            5 => Some(Self::SigRequired),
            6 => Some(Self::Unauthorized),
            12 => Some(Self::UnsupportedVersion),
            13 => Some(Self::ReqListEmpty),
            14 => Some(Self::ReqListMulti),
            15 => Some(Self::UnsupportedExtension),
            16 => Some(Self::UnsupportedAlgorithm),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::MalformedAsn1 => "MalformedAsn1",
            Self::InternalError => "InternalError",
            Self::TryLater => "TryLater",
            Self::SigRequired => "SigRequired",
            Self::Unauthorized => "Unauthorized",
            Self::UnsupportedVersion => "UnsupportedVersion",
            Self::ReqListEmpty => "ReqListEmpty",
            Self::ReqListMulti => "ReqListMulti",
            Self::UnsupportedExtension => "UnsupportedExtension",
            Self::UnsupportedAlgorithm => "UnsupportedAlgorithm",
        }
    }
}

impl fmt::Display for OcspErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.code())
    }
}

/// TSP error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TspErrorCode {
    Success = 0,
    MalformedAsn1 = 1,
    UnsupportedVersion = 2,
}

impl TspErrorCode {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for TspErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "Success",
            Self::MalformedAsn1 => "MalformedAsn1",
            Self::UnsupportedVersion => "UnsupportedVersion",
        };
        write!(f, "{}({})", name, self.code())
    }
}

/// Which family a malformed-message error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Ocsp,
    Tsp,
    X509,
}

/// Errors about message content
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("OCSP error {code}: {message}")]
    Ocsp {
        code: OcspErrorCode,
        message: String,
        origin: &'static Location<'static>,
    },

    #[error("TSP error {code}: {message}")]
    Tsp {
        code: TspErrorCode,
        message: String,
        origin: &'static Location<'static>,
    },

    #[error("X.509 error: {message}")]
    X509 {
        message: String,
        origin: &'static Location<'static>,
    },

    /// Operation not available for this message or algorithm
    #[error("not implemented: {what}")]
    Unimplemented {
        what: String,
        origin: &'static Location<'static>,
    },

    /// No verification primitive for the signature algorithm
    #[error("unsupported signature algorithm: {algorithm}")]
    UnsupportedAlgorithm {
        algorithm: String,
        origin: &'static Location<'static>,
    },

    /// An OCSP response carried no decodable basic response
    #[error("OCSP response carries no BasicOCSPResponse")]
    NoBasicResponse { origin: &'static Location<'static> },
}

impl MessageError {
    #[track_caller]
    pub fn ocsp(code: OcspErrorCode, message: impl Into<String>) -> Self {
        Self::Ocsp {
            code,
            message: message.into(),
            origin: Location::caller(),
        }
    }

    #[track_caller]
    pub fn tsp(code: TspErrorCode, message: impl Into<String>) -> Self {
        Self::Tsp {
            code,
            message: message.into(),
            origin: Location::caller(),
        }
    }

    #[track_caller]
    pub fn x509(message: impl Into<String>) -> Self {
        Self::X509 {
            message: message.into(),
            origin: Location::caller(),
        }
    }

    #[track_caller]
    pub fn unimplemented(what: impl Into<String>) -> Self {
        Self::Unimplemented {
            what: what.into(),
            origin: Location::caller(),
        }
    }

    #[track_caller]
    pub fn unsupported_algorithm(algorithm: impl Into<String>) -> Self {
        Self::UnsupportedAlgorithm {
            algorithm: algorithm.into(),
            origin: Location::caller(),
        }
    }

    #[track_caller]
    pub fn no_basic_response() -> Self {
        Self::NoBasicResponse {
            origin: Location::caller(),
        }
    }

    /// Malformed-message error for the given protocol family
    #[track_caller]
    pub fn malformed(protocol: Protocol, message: impl Into<String>) -> Self {
        match protocol {
            Protocol::Ocsp => Self::ocsp(OcspErrorCode::MalformedAsn1, message),
            Protocol::Tsp => Self::tsp(TspErrorCode::MalformedAsn1, message),
            Protocol::X509 => Self::x509(message),
        }
    }

    /// Short name of the error family, used as a log field
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ocsp { .. } => "OcspError",
            Self::Tsp { .. } => "TspError",
            Self::X509 { .. } => "X509Error",
            Self::Unimplemented { .. } => "Unimplemented",
            Self::UnsupportedAlgorithm { .. } => "UnsupportedAlgorithm",
            Self::NoBasicResponse { .. } => "NoBasicResponse",
        }
    }

    /// Numeric code within the family (0 where the family has none)
    pub fn code(&self) -> u8 {
        match self {
            Self::Ocsp { code, .. } => code.code(),
            Self::Tsp { code, .. } => code.code(),
            _ => 0,
        }
    }

    pub fn ocsp_code(&self) -> Option<OcspErrorCode> {
        match self {
            Self::Ocsp { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn origin(&self) -> &'static Location<'static> {
        match self {
            Self::Ocsp { origin, .. }
            | Self::Tsp { origin, .. }
            | Self::X509 { origin, .. }
            | Self::Unimplemented { origin, .. }
            | Self::UnsupportedAlgorithm { origin, .. }
            | Self::NoBasicResponse { origin } => origin,
        }
    }
}

/// Failure while decoding a message: either the DER layer gave up or the
/// message logic rejected the content.
#[derive(Debug)]
pub(crate) enum ParseFailure {
    Codec(Asn1Error),
    Message(MessageError),
}

impl From<Asn1Error> for ParseFailure {
    fn from(err: Asn1Error) -> Self {
        Self::Codec(err)
    }
}

impl From<MessageError> for ParseFailure {
    fn from(err: MessageError) -> Self {
        Self::Message(err)
    }
}

impl ParseFailure {
    /// Codec failures become the protocol's malformed-message error;
    /// message errors pass through untouched.
    #[track_caller]
    pub(crate) fn into_message(self, protocol: Protocol) -> MessageError {
        match self {
            Self::Codec(err) => MessageError::malformed(protocol, err.to_string()),
            Self::Message(err) => err,
        }
    }
}

/// HTTP-level rejection of an inbound request
#[derive(Debug, thiserror::Error)]
#[error("HTTP {status}: {message}")]
pub struct HttpError {
    pub status: StatusCode,
    pub message: String,
    origin: &'static Location<'static>,
}

impl HttpError {
    #[track_caller]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            origin: Location::caller(),
        }
    }

    #[track_caller]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    #[track_caller]
    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, message)
    }

    #[track_caller]
    pub fn unsupported_media_type(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, message)
    }

    pub fn origin(&self) -> &'static Location<'static> {
        self.origin
    }
}

/// Outbound HTTP failures
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("unsupported upstream method: {0}")]
    UnsupportedMethod(String),

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("could not reach {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}
