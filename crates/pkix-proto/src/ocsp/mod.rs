//! OCSP (Online Certificate Status Protocol) - RFC 6960 / RFC 5019
//!
//! ```asn1
//! OCSPRequest ::= SEQUENCE {
//!     tbsRequest          TBSRequest,
//!     optionalSignature   [0] EXPLICIT Signature OPTIONAL
//! }
//!
//! TBSRequest ::= SEQUENCE {
//!     version             [0] EXPLICIT Version DEFAULT v1,
//!     requestorName       [1] EXPLICIT GeneralName OPTIONAL,
//!     requestList         SEQUENCE OF Request,
//!     requestExtensions   [2] EXPLICIT Extensions OPTIONAL
//! }
//!
//! CertID ::= SEQUENCE {
//!     hashAlgorithm       AlgorithmIdentifier,
//!     issuerNameHash      OCTET STRING,
//!     issuerKeyHash       OCTET STRING,
//!     serialNumber        INTEGER
//! }
//!
//! OCSPResponse ::= SEQUENCE {
//!     responseStatus      OCSPResponseStatus,
//!     responseBytes       [0] EXPLICIT ResponseBytes OPTIONAL
//! }
//!
//! BasicOCSPResponse ::= SEQUENCE {
//!     tbsResponseData     ResponseData,
//!     signatureAlgorithm  AlgorithmIdentifier,
//!     signature           BIT STRING,
//!     certs               [0] EXPLICIT SEQUENCE OF Certificate OPTIONAL
//! }
//!
//! SingleResponse ::= SEQUENCE {
//!     certID              CertID,
//!     certStatus          CertStatus,
//!     thisUpdate          GeneralizedTime,
//!     nextUpdate          [0] EXPLICIT GeneralizedTime OPTIONAL,
//!     singleExtensions    [1] EXPLICIT Extensions OPTIONAL
//! }
//! ```
//!
//! Only single-certificate requests are served: a request list with more
//! than one entry is rejected, and of a response's SingleResponses only the
//! first is read.

mod exception;
mod request;
mod response;

pub use exception::ExceptionResponse;
pub use request::Request;
pub use response::{BasicResponse, Response, ResponseDates, SingleResponse};

use chrono::{DateTime, Utc};
use num_bigint::BigUint;

use crate::asn1::{Asn1Error, Node, Selector, Tlv};
use crate::error::{MessageError, OcspErrorCode};
use crate::x509::Certificate;

pub const REQUEST_MIME_TYPE: &str = "application/ocsp-request";
pub const RESPONSE_MIME_TYPE: &str = "application/ocsp-response";

/// OCSP response status (RFC 6960 Section 2.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcspResponseStatus {
    /// Response has valid confirmations
    Successful = 0,
    /// Illegal confirmation request
    MalformedRequest = 1,
    /// Internal error in issuer
    InternalError = 2,
    /// Try again later
    TryLater = 3,
    /// Must sign the request
    SigRequired = 5,
    /// Request unauthorized
    Unauthorized = 6,
}

impl OcspResponseStatus {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Successful),
            1 => Some(Self::MalformedRequest),
            2 => Some(Self::InternalError),
            3 => Some(Self::TryLater),
            5 => Some(Self::SigRequired),
            6 => Some(Self::Unauthorized),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Identifies the certificate a request or response is about
///
/// Hashes and serial are lowercase hex; the algorithm is a dotted OID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CertId {
    pub hash_algorithm: String,
    pub issuer_name_hash: String,
    pub issuer_key_hash: String,
    pub serial_number: String,
}

impl CertId {
    /// Build the CertID for `cert`, hashing with `hash_algorithm` (an OID).
    ///
    /// `issuer` supplies the key hash; the name hash covers the issuer
    /// field of `cert` itself.
    pub fn for_certificate(
        cert: &Certificate,
        issuer: &Certificate,
        hash_algorithm: &str,
    ) -> Result<Self, MessageError> {
        Ok(Self {
            hash_algorithm: hash_algorithm.to_string(),
            issuer_name_hash: cert.issuer_name_hash(Some(hash_algorithm))?,
            issuer_key_hash: issuer.key_hash(Some(hash_algorithm))?,
            serial_number: cert.serial_number_hex(),
        })
    }

    pub(crate) fn from_tlv(node: &Tlv<'_>) -> Result<Self, Asn1Error> {
        node.expect(&Selector::SEQUENCE)?;
        let hash_algorithm = node.child(0)?.child(0)?.as_oid()?;
        let issuer_name_hash = hex::encode(non_empty(node.child(1)?.as_octet_string()?, "issuerNameHash")?);
        let issuer_key_hash = hex::encode(non_empty(node.child(2)?.as_octet_string()?, "issuerKeyHash")?);
        let serial_number = format!("{:x}", node.child(3)?.as_biguint()?);

        Ok(Self {
            hash_algorithm,
            issuer_name_hash,
            issuer_key_hash,
            serial_number,
        })
    }

    pub(crate) fn to_node(&self) -> Result<Node, MessageError> {
        let invalid = |field: &str| {
            MessageError::ocsp(
                OcspErrorCode::MalformedAsn1,
                format!("invalid CertID {}", field),
            )
        };

        let name_hash = hex::decode(&self.issuer_name_hash).map_err(|_| invalid("issuerNameHash"))?;
        let key_hash = hex::decode(&self.issuer_key_hash).map_err(|_| invalid("issuerKeyHash"))?;
        let serial = BigUint::parse_bytes(self.serial_number.as_bytes(), 16)
            .ok_or_else(|| invalid("serialNumber"))?;
        let algorithm = Node::algorithm(&self.hash_algorithm).map_err(|_| invalid("hashAlgorithm"))?;

        Ok(Node::sequence(vec![
            algorithm,
            Node::octet_string(&name_hash),
            Node::octet_string(&key_hash),
            Node::integer(&serial),
        ]))
    }
}

fn non_empty<'a>(bytes: &'a [u8], field: &str) -> Result<&'a [u8], Asn1Error> {
    if bytes.is_empty() {
        Err(Asn1Error::InvalidValue(format!("empty {}", field)))
    } else {
        Ok(bytes)
    }
}

/// Certificate status from a SingleResponse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertStatus {
    Good,
    Revoked {
        revocation_time: DateTime<Utc>,
        reason: Option<u8>,
    },
    Unknown,
}

impl CertStatus {
    /// Wire tag: 0 good, 1 revoked, 2 unknown
    pub fn code(&self) -> u8 {
        match self {
            Self::Good => 0,
            Self::Revoked { .. } => 1,
            Self::Unknown => 2,
        }
    }

    pub fn revocation_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Revoked {
                revocation_time, ..
            } => Some(*revocation_time),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Revoked { .. } => "revoked",
            Self::Unknown => "unknown",
        }
    }
}
