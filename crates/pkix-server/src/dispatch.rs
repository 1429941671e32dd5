//! Error taxonomy and the error-to-reply table
//!
//! Every failure in the request pipeline becomes a [`ServiceError`]. Before
//! a reply is sent, [`recover`] logs the error with its kind, code, message
//! and origin, then maps it through [`outcome_for`] to either an unsigned
//! OCSP error response (HTTP 200) or a bare HTTP status.

use http::StatusCode;
use pkix_proto::ocsp::ExceptionResponse;
use pkix_proto::{HttpError, HttpReply, MessageError, OcspErrorCode, TransportError};
use std::fmt;
use std::panic::Location;
use thiserror::Error;
use tracing::{error, warn};

use crate::store::StoreError;

/// Where in the pipeline a request failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ReceivedBytes,
    ParsedRequest,
    LookedUp,
    Forwarded,
    Responded,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ReceivedBytes => "received",
            Stage::ParsedRequest => "parsed",
            Stage::LookedUp => "looked-up",
            Stage::Forwarded => "forwarded",
            Stage::Responded => "responded",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Message(#[from] MessageError),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("{error}")]
    Store {
        error: StoreError,
        origin: &'static Location<'static>,
    },

    #[error("upstream: {error}")]
    Upstream {
        error: TransportError,
        origin: &'static Location<'static>,
    },
}

impl From<StoreError> for ServiceError {
    #[track_caller]
    fn from(error: StoreError) -> Self {
        ServiceError::Store {
            error,
            origin: Location::caller(),
        }
    }
}

impl From<TransportError> for ServiceError {
    #[track_caller]
    fn from(error: TransportError) -> Self {
        ServiceError::Upstream {
            error,
            origin: Location::caller(),
        }
    }
}

impl ServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Message(e) => e.kind(),
            ServiceError::Http(_) => "HttpError",
            ServiceError::Store { error, .. } => error.kind(),
            ServiceError::Upstream { .. } => "UpstreamError",
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            ServiceError::Message(e) => u16::from(e.code()),
            ServiceError::Http(e) => e.status.as_u16(),
            ServiceError::Store { error, .. } => u16::from(error.code()),
            ServiceError::Upstream { .. } => 0,
        }
    }

    pub fn origin(&self) -> &'static Location<'static> {
        match self {
            ServiceError::Message(e) => e.origin(),
            ServiceError::Http(e) => e.origin(),
            ServiceError::Store { origin, .. } | ServiceError::Upstream { origin, .. } => origin,
        }
    }
}

/// What the client receives for a failed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Unsigned OCSP error response with HTTP 200
    Protocol(ExceptionResponse),
    /// Bare status line, no body
    HttpStatus(StatusCode),
}

impl Outcome {
    pub fn reply(self) -> HttpReply {
        match self {
            Outcome::Protocol(response) => response.reply(),
            Outcome::HttpStatus(status) => HttpReply::status_only(status),
        }
    }
}

/// The error table. Anything without a dedicated entry is InternalError.
pub fn outcome_for(err: &ServiceError) -> Outcome {
    match err {
        ServiceError::Message(MessageError::Ocsp { code, .. }) => match code {
            OcspErrorCode::MalformedAsn1
            | OcspErrorCode::InternalError
            | OcspErrorCode::TryLater
            | OcspErrorCode::SigRequired
            | OcspErrorCode::Unauthorized => {
                Outcome::Protocol(ExceptionResponse::create_error_response(*code))
            }
            OcspErrorCode::ReqListEmpty => Outcome::Protocol(ExceptionResponse::MalformedRequest),
            OcspErrorCode::Success => {
                error!(
                    origin = %err.origin(),
                    "Success raised as an error, this is a bug"
                );
                Outcome::Protocol(ExceptionResponse::InternalError)
            }
            OcspErrorCode::UnsupportedVersion
            | OcspErrorCode::ReqListMulti
            | OcspErrorCode::UnsupportedExtension
            | OcspErrorCode::UnsupportedAlgorithm => {
                Outcome::Protocol(ExceptionResponse::InternalError)
            }
        },
        ServiceError::Message(
            MessageError::Tsp { .. }
            | MessageError::X509 { .. }
            | MessageError::Unimplemented { .. }
            | MessageError::UnsupportedAlgorithm { .. }
            | MessageError::NoBasicResponse { .. },
        ) => Outcome::Protocol(ExceptionResponse::InternalError),
        ServiceError::Http(e) => Outcome::HttpStatus(e.status),
        ServiceError::Store { error, .. } => match error {
            StoreError::NotFound(_) => Outcome::Protocol(ExceptionResponse::Unauthorized),
            StoreError::Config(_) | StoreError::Io(_) => {
                Outcome::Protocol(ExceptionResponse::InternalError)
            }
        },
        ServiceError::Upstream { error, .. } => match error {
            TransportError::Timeout { .. } => Outcome::HttpStatus(StatusCode::GATEWAY_TIMEOUT),
            TransportError::Unreachable { .. } | TransportError::Client(_) => {
                Outcome::HttpStatus(StatusCode::BAD_GATEWAY)
            }
            TransportError::UnsupportedMethod(_) => {
                Outcome::Protocol(ExceptionResponse::InternalError)
            }
        },
    }
}

/// Log `err` and turn it into the reply the client gets
pub fn recover(err: ServiceError, stage: Stage) -> HttpReply {
    let outcome = outcome_for(&err);
    match outcome {
        Outcome::HttpStatus(status) => warn!(
            kind = err.kind(),
            code = err.code(),
            stage = %stage,
            origin = %err.origin(),
            status = %status,
            "Caught {}",
            err
        ),
        Outcome::Protocol(response) => warn!(
            kind = err.kind(),
            code = err.code(),
            stage = %stage,
            origin = %err.origin(),
            response = ?response,
            "Caught {}",
            err
        ),
    }
    outcome.reply()
}
