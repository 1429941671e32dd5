//! Capabilities shared by PKI messages
//!
//! Message types opt into what they support: every message is a
//! [`PkiMessage`], signed ones are also [`Signable`], and those that travel
//! over HTTP are [`HttpTransportable`](crate::transport::HttpTransportable).

use tracing::debug;

use crate::asn1::{Asn1Error, Selector, Tlv};
use crate::crypto;
use crate::error::MessageError;
use crate::oid;
use crate::x509::Certificate;

/// A DER-encoded PKI message
///
/// Messages are parsed exactly once, at construction, and keep the bytes
/// they were built from.
pub trait PkiMessage: Sized {
    /// Parse `der`, failing with the message family's malformed error
    fn from_der(der: Vec<u8>) -> Result<Self, MessageError>;

    /// The encoded message
    fn der(&self) -> &[u8];
}

/// A message carrying a signature over some of its content
///
/// Every accessor defaults to [`MessageError::Unimplemented`]; signed types
/// override them. [`Signable::verify_signature`] is generic over the
/// accessors.
pub trait Signable {
    /// Canonical DER of the signed portion
    fn signed_data(&self) -> Result<Vec<u8>, MessageError> {
        Err(MessageError::unimplemented("signed data"))
    }

    /// Signature value without the BIT STRING unused-bits octet
    fn signature_raw(&self) -> Result<Vec<u8>, MessageError> {
        Err(MessageError::unimplemented("signature value"))
    }

    /// Signature algorithm OID
    fn signature_algorithm(&self) -> Result<String, MessageError> {
        Err(MessageError::unimplemented("signature algorithm"))
    }

    /// DER certificates embedded alongside the signature
    fn signer_certs(&self) -> Result<Vec<Vec<u8>>, MessageError> {
        Err(MessageError::unimplemented("signer certificates"))
    }

    /// Verify the signature against `signer` (DER certificate) or, if
    /// `None`, against each embedded certificate in turn.
    ///
    /// Returns the certificates whose key verifies the signature; an empty
    /// list means nothing verified. Fails with
    /// [`MessageError::UnsupportedAlgorithm`] when no primitive exists for
    /// the signature algorithm.
    fn verify_signature(&self, signer: Option<&[u8]>) -> Result<Vec<Vec<u8>>, MessageError> {
        let algorithm_oid = self.signature_algorithm()?;
        let algorithm = oid::name(&algorithm_oid)
            .ok_or_else(|| MessageError::unsupported_algorithm(algorithm_oid.as_str()))?;
        crypto::ensure_supported(algorithm)?;

        let data = self.signed_data()?;
        let sig = self.signature_raw()?;
        let candidates = match signer {
            Some(der) => vec![der.to_vec()],
            None => self.signer_certs()?,
        };

        let mut verified = Vec::new();
        for der in candidates {
            let cert = match Certificate::from_der(der.clone()) {
                Ok(cert) => cert,
                Err(e) => {
                    debug!(error = %e, "Skipping undecodable signer certificate");
                    continue;
                }
            };
            if crypto::verify(algorithm, cert.public_key(), &data, &sig)? {
                verified.push(der);
            }
        }
        Ok(verified)
    }
}

/// Signature fields lifted out of a signed structure at parse time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureParts {
    pub signed_data: Vec<u8>,
    pub algorithm: String,
    pub value: Vec<u8>,
    pub certs: Vec<Vec<u8>>,
}

impl SignatureParts {
    /// `signed` is the signed structure, `algorithm` an AlgorithmIdentifier,
    /// `value` the signature BIT STRING and `certs` an optional
    /// `[0] EXPLICIT SEQUENCE OF Certificate`.
    pub(crate) fn from_fields(
        signed: &Tlv<'_>,
        algorithm: &Tlv<'_>,
        value: &Tlv<'_>,
        certs: Option<&Tlv<'_>>,
    ) -> Result<Self, Asn1Error> {
        let algorithm = algorithm.expect(&Selector::SEQUENCE)?.child(0)?.as_oid()?;
        let value = value.as_bit_string()?.to_vec();
        let certs = match certs {
            Some(wrapper) => wrapper
                .child(0)?
                .expect(&Selector::SEQUENCE)?
                .children()
                .iter()
                .map(|cert| cert.raw().to_vec())
                .collect(),
            None => Vec::new(),
        };

        Ok(Self {
            signed_data: signed.to_der(),
            algorithm,
            value,
            certs,
        })
    }
}
