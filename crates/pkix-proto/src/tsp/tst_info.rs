use chrono::{DateTime, Utc};
use der_parser::asn1_rs::{Class, Tag};
use num_bigint::BigUint;

use crate::asn1::{Selector, Tlv};
use crate::error::{MessageError, ParseFailure, Protocol, TspErrorCode};
use crate::message::PkiMessage;

/// Accuracy of genTime; absent fields read as zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Accuracy {
    pub seconds: u64,
    pub millis: u64,
    pub micros: u64,
}

/// The signed content of a time-stamp token
#[derive(Debug, Clone)]
pub struct TstInfo {
    der: Vec<u8>,
    policy: String,
    imprint_algorithm: String,
    imprint: Vec<u8>,
    serial_number: BigUint,
    gen_time: DateTime<Utc>,
    accuracy: Option<Accuracy>,
    ordering: bool,
    nonce: Option<Vec<u8>>,
}

impl TstInfo {
    pub fn version(&self) -> u64 {
        1
    }

    /// TSA policy OID
    pub fn policy(&self) -> &str {
        &self.policy
    }

    /// messageImprint as (algorithm OID, digest)
    pub fn message_imprint(&self) -> (&str, &[u8]) {
        (&self.imprint_algorithm, &self.imprint)
    }

    pub fn serial_number(&self) -> &BigUint {
        &self.serial_number
    }

    pub fn gen_time(&self) -> DateTime<Utc> {
        self.gen_time
    }

    pub fn accuracy(&self) -> Option<Accuracy> {
        self.accuracy
    }

    pub fn ordering(&self) -> bool {
        self.ordering
    }

    /// Nonce content octets as encoded
    pub fn nonce(&self) -> Option<&[u8]> {
        self.nonce.as_deref()
    }

    fn parse(der: &[u8]) -> Result<TstInfo, ParseFailure> {
        let root = Tlv::parse(der)?;
        root.expect(&Selector::SEQUENCE)?;

        let version = root.child(0)?.as_u64()?;
        if version != 1 {
            return Err(MessageError::tsp(
                TspErrorCode::UnsupportedVersion,
                format!("unsupported TSTInfo version {}", version),
            )
            .into());
        }

        let policy = root.child(1)?.as_oid()?;
        let imprint = root.child(2)?.expect(&Selector::SEQUENCE)?;
        let imprint_algorithm = imprint.child(0)?.child(0)?.as_oid()?;
        let imprint_digest = imprint.child(1)?.as_octet_string()?.to_vec();
        let serial_number = root.child(3)?.as_biguint()?;
        let gen_time = root.child(4)?.as_generalized_time()?;

        let mut info = TstInfo {
            der: der.to_vec(),
            policy,
            imprint_algorithm,
            imprint: imprint_digest,
            serial_number,
            gen_time,
            accuracy: None,
            ordering: false,
            nonce: None,
        };

        for field in &root.children()[5..] {
            match (field.class(), field.tag()) {
                (Class::Universal, Tag::Sequence) => info.accuracy = Some(parse_accuracy(field)?),
                (Class::Universal, Tag::Boolean) => info.ordering = field.as_bool()?,
                (Class::Universal, Tag::Integer) => info.nonce = Some(field.content().to_vec()),
                // tsa [0] and extensions [1]
                (Class::ContextSpecific, Tag(0)) | (Class::ContextSpecific, Tag(1)) => {}
                (class, tag) => {
                    return Err(MessageError::tsp(
                        TspErrorCode::MalformedAsn1,
                        format!("unexpected TSTInfo field {:?} {:?}", class, tag),
                    )
                    .into())
                }
            }
        }

        Ok(info)
    }
}

fn parse_accuracy(node: &Tlv<'_>) -> Result<Accuracy, ParseFailure> {
    let seconds = match node.find(&Selector::INTEGER) {
        Some(n) => n.as_u64()?,
        None => 0,
    };
    let millis = match node.find(&Selector::context(0)) {
        Some(n) => n.content_u64()?,
        None => 0,
    };
    let micros = match node.find(&Selector::context(1)) {
        Some(n) => n.content_u64()?,
        None => 0,
    };
    Ok(Accuracy {
        seconds,
        millis,
        micros,
    })
}

impl PkiMessage for TstInfo {
    fn from_der(der: Vec<u8>) -> Result<Self, MessageError> {
        Self::parse(&der).map_err(|e| e.into_message(Protocol::Tsp))
    }

    fn der(&self) -> &[u8] {
        &self.der
    }
}
