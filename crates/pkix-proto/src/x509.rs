//! X.509 certificate view
//!
//! Only what status checking needs: serial number, issuer and subject names,
//! and the subject public key, plus the name and key hashes that identify a
//! certificate in an OCSP CertID.

use num_bigint::BigUint;

use crate::asn1::{Selector, Tlv};
use crate::crypto;
use crate::error::{MessageError, ParseFailure, Protocol};
use crate::message::PkiMessage;
use crate::oid;
use crate::util;

/// A parsed certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
    version: u64,
    serial_number: BigUint,
    issuer: Vec<u8>,
    subject: Vec<u8>,
    public_key_algorithm: String,
    public_key: Vec<u8>,
}

impl Certificate {
    /// Parse a PEM-armoured certificate
    pub fn from_pem(pem: &[u8]) -> Result<Self, MessageError> {
        let (_, parsed) = x509_parser::pem::parse_x509_pem(pem)
            .map_err(|e| MessageError::x509(format!("invalid PEM: {:?}", e)))?;
        if parsed.label != "CERTIFICATE" {
            return Err(MessageError::x509(format!(
                "expected CERTIFICATE PEM block, found {}",
                parsed.label
            )));
        }
        Self::from_der(parsed.contents)
    }

    /// Parse DER or PEM, whichever `data` holds
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, MessageError> {
        if data.starts_with(b"-----BEGIN") {
            Self::from_pem(&data)
        } else {
            Self::from_der(data)
        }
    }

    pub fn to_pem(&self) -> String {
        util::pemize(&self.der, "CERTIFICATE")
    }

    /// X.509 version field as encoded (0 for v1, 2 for v3)
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn serial_number(&self) -> &BigUint {
        &self.serial_number
    }

    /// Serial number as lowercase hex
    pub fn serial_number_hex(&self) -> String {
        format!("{:x}", self.serial_number)
    }

    /// DER of the issuer Name
    pub fn issuer(&self) -> &[u8] {
        &self.issuer
    }

    /// DER of the subject Name
    pub fn subject(&self) -> &[u8] {
        &self.subject
    }

    pub fn public_key_algorithm(&self) -> &str {
        &self.public_key_algorithm
    }

    /// Subject public key bits (BIT STRING payload)
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Hex digest of the issuer Name; SHA-1 when `algorithm` is `None`
    pub fn issuer_name_hash(&self, algorithm: Option<&str>) -> Result<String, MessageError> {
        crypto::digest_hex(algorithm.unwrap_or(oid::SHA1), &self.issuer)
    }

    /// Hex digest of the subject Name; SHA-1 when `algorithm` is `None`
    pub fn subject_name_hash(&self, algorithm: Option<&str>) -> Result<String, MessageError> {
        crypto::digest_hex(algorithm.unwrap_or(oid::SHA1), &self.subject)
    }

    /// Hex digest of the public key bits; SHA-1 when `algorithm` is `None`
    pub fn key_hash(&self, algorithm: Option<&str>) -> Result<String, MessageError> {
        crypto::digest_hex(algorithm.unwrap_or(oid::SHA1), &self.public_key)
    }

    fn parse(der: &[u8]) -> Result<Fields, ParseFailure> {
        let root = Tlv::parse(der)?;
        let tbs = root.expect(&Selector::SEQUENCE)?.child(0)?;
        tbs.expect(&Selector::SEQUENCE)?;

        // version [0] EXPLICIT is optional and shifts the remaining fields
        let (version, first) = match tbs.child(0)? {
            v if Selector::explicit(0).matches(v) => (v.child(0)?.as_u64()?, 1),
            _ => (0, 0),
        };

        let serial_number = tbs.child(first)?.as_biguint()?;
        let issuer = tbs.child(first + 2)?.expect(&Selector::SEQUENCE)?.to_der();
        let subject = tbs.child(first + 4)?.expect(&Selector::SEQUENCE)?.to_der();

        let spki = tbs.child(first + 5)?.expect(&Selector::SEQUENCE)?;
        let public_key_algorithm = spki.child(0)?.child(0)?.as_oid()?;
        let public_key = spki.child(1)?.as_bit_string()?.to_vec();

        Ok(Fields {
            version,
            serial_number,
            issuer,
            subject,
            public_key_algorithm,
            public_key,
        })
    }
}

struct Fields {
    version: u64,
    serial_number: BigUint,
    issuer: Vec<u8>,
    subject: Vec<u8>,
    public_key_algorithm: String,
    public_key: Vec<u8>,
}

impl PkiMessage for Certificate {
    fn from_der(der: Vec<u8>) -> Result<Self, MessageError> {
        let fields = Self::parse(&der).map_err(|e| e.into_message(Protocol::X509))?;
        Ok(Self {
            der,
            version: fields.version,
            serial_number: fields.serial_number,
            issuer: fields.issuer,
            subject: fields.subject,
            public_key_algorithm: fields.public_key_algorithm,
            public_key: fields.public_key,
        })
    }

    fn der(&self) -> &[u8] {
        &self.der
    }
}
