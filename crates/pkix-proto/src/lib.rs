//! PKIX Status Protocol Implementation
//!
//! This crate decodes and encodes the DER messages of two PKIX status
//! protocols:
//!
//! - OCSP, the Online Certificate Status Protocol (RFC 6960, with the
//!   RFC 5019 lightweight profile for caching)
//! - TSP, the Time-Stamp Protocol (RFC 3161)
//!
//! # Features
//!
//! - Single-certificate OCSP requests and responses
//! - Unsigned OCSP error responses
//! - RFC 5019 caching headers (ETag, Last-Modified, Expires, Cache-Control)
//! - Signature verification for OCSP responses and signed requests
//! - TSP request, response and TSTInfo decoding
//! - Minimal X.509 parsing for CertID construction
//! - HTTP transport: GET/POST decoding of inbound requests and an async
//!   upstream client
//!
//! # Example
//!
//! ```rust
//! use pkix_proto::ocsp::{CertId, ExceptionResponse, Request};
//! use pkix_proto::{oid, OcspErrorCode, PkiMessage};
//!
//! let cert_id = CertId {
//!     hash_algorithm: oid::SHA1.to_string(),
//!     issuer_name_hash: "00".repeat(20),
//!     issuer_key_hash: "11".repeat(20),
//!     serial_number: "1234".to_string(),
//! };
//!
//! // Build a request, then parse it back from its bytes
//! let request = Request::create_from_params(&cert_id).unwrap();
//! let parsed = Request::from_der(request.der().to_vec()).unwrap();
//! assert_eq!(parsed.cert_id(), &cert_id);
//!
//! // Error codes map onto unsigned error responses
//! let reply = ExceptionResponse::create_error_response(OcspErrorCode::TryLater).reply();
//! assert_eq!(reply.body.as_ref(), &[0x30, 0x03, 0x0a, 0x01, 0x03]);
//! ```

pub mod asn1;
pub mod crypto;
pub mod error;
pub mod message;
pub mod ocsp;
pub mod oid;
pub mod transport;
pub mod tsp;
pub mod util;
pub mod x509;

pub use asn1::{Asn1Error, Node, Selector, Tlv};
pub use error::{
    HttpError, MessageError, OcspErrorCode, Protocol, TransportError, TspErrorCode,
};
pub use message::{PkiMessage, Signable, SignatureParts};
pub use transport::{
    HttpReply, HttpTransportable, InboundRequest, RetryPolicy, UpstreamClient, UpstreamReply,
};
pub use x509::Certificate;
