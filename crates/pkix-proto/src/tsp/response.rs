use chrono::{DateTime, Utc};
use num_bigint::BigUint;

use super::{Accuracy, FailureInfo, PkiStatus, TstInfo, RESPONSE_MIME_TYPE};
use crate::asn1::{Selector, Tlv};
use crate::error::{MessageError, ParseFailure, Protocol, TspErrorCode};
use crate::message::{PkiMessage, Signable};
use crate::oid;
use crate::transport::HttpTransportable;

/// TimeStampResp
///
/// A granted response always carries a [`TstInfo`]; any other status always
/// carries failure bits and never a token.
#[derive(Debug, Clone)]
pub struct Response {
    der: Vec<u8>,
    status: PkiStatus,
    status_text: Vec<String>,
    fail_info: Option<Vec<u32>>,
    tst_info: Option<TstInfo>,
}

impl Response {
    pub fn status(&self) -> PkiStatus {
        self.status
    }

    /// statusString entries, if any
    pub fn status_text(&self) -> &[String] {
        &self.status_text
    }

    /// Set PKIFailureInfo bit numbers, for non-granted responses
    pub fn fail_info(&self) -> Option<&[u32]> {
        self.fail_info.as_deref()
    }

    /// Failure bits with a defined time-stamping meaning
    pub fn failures(&self) -> Vec<FailureInfo> {
        self.fail_info
            .iter()
            .flatten()
            .filter_map(|bit| FailureInfo::from_bit(*bit))
            .collect()
    }

    pub fn tst_info(&self) -> Option<&TstInfo> {
        self.tst_info.as_ref()
    }

    fn granted(&self) -> Result<&TstInfo, MessageError> {
        self.tst_info.as_ref().ok_or_else(|| {
            MessageError::tsp(
                TspErrorCode::MalformedAsn1,
                format!("no TSTInfo in {:?} response", self.status),
            )
        })
    }

    pub fn version(&self) -> Result<u64, MessageError> {
        Ok(self.granted()?.version())
    }

    pub fn policy_id(&self) -> Result<&str, MessageError> {
        Ok(self.granted()?.policy())
    }

    pub fn serial_number(&self) -> Result<&BigUint, MessageError> {
        Ok(self.granted()?.serial_number())
    }

    pub fn gen_time(&self) -> Result<DateTime<Utc>, MessageError> {
        Ok(self.granted()?.gen_time())
    }

    pub fn accuracy(&self) -> Result<Option<Accuracy>, MessageError> {
        Ok(self.granted()?.accuracy())
    }

    pub fn ordering(&self) -> Result<bool, MessageError> {
        Ok(self.granted()?.ordering())
    }

    pub fn nonce(&self) -> Result<Option<&[u8]>, MessageError> {
        Ok(self.granted()?.nonce())
    }

    fn parse(der: &[u8]) -> Result<Parsed, ParseFailure> {
        let root = Tlv::parse(der)?;
        root.expect(&Selector::SEQUENCE)?;

        let status_info = root.child(0)?.expect(&Selector::SEQUENCE)?;
        let code = status_info.child(0)?.as_u64()?;
        let status = PkiStatus::from_code(code)
            .ok_or_else(|| malformed(format!("unknown PKIStatus {}", code)))?;

        let status_text = match status_info.find(&Selector::SEQUENCE) {
            Some(text) => text
                .children()
                .iter()
                .map(|s| String::from_utf8_lossy(s.content()).into_owned())
                .collect(),
            None => Vec::new(),
        };

        let token = root.children().get(1);

        if !status.is_granted() {
            let bits = status_info
                .find(&Selector::BIT_STRING)
                .ok_or_else(|| malformed("failInfo missing from rejected response"))?;
            if token.is_some() {
                return Err(malformed("timeStampToken present in rejected response").into());
            }
            return Ok(Parsed {
                status,
                status_text,
                fail_info: Some(set_bits(bits.as_bit_string()?)),
                tst_info: None,
            });
        }

        if status_info.find(&Selector::BIT_STRING).is_some() {
            return Err(malformed("failInfo present in granted response").into());
        }
        let token = token.ok_or_else(|| malformed("timeStampToken missing from granted response"))?;
        let content_type = token.child(0)?.as_oid()?;
        if content_type != oid::SIGNED_DATA {
            return Err(malformed(format!("token content type {} is not signedData", content_type)).into());
        }

        let signed_data = token.require(&Selector::explicit(0))?.child(0)?;
        let encapsulated = signed_data.child(2)?.expect(&Selector::SEQUENCE)?;
        let e_content_type = encapsulated.child(0)?.as_oid()?;
        if e_content_type != oid::TST_INFO {
            return Err(malformed(format!("encapsulated content type {} is not TSTInfo", e_content_type)).into());
        }

        let e_content = encapsulated
            .require(&Selector::explicit(0))?
            .require(&Selector::OCTET_STRING)?;
        let tst_info = TstInfo::from_der(e_content.content().to_vec())?;

        Ok(Parsed {
            status,
            status_text,
            fail_info: None,
            tst_info: Some(tst_info),
        })
    }
}

struct Parsed {
    status: PkiStatus,
    status_text: Vec<String>,
    fail_info: Option<Vec<u32>>,
    tst_info: Option<TstInfo>,
}

#[track_caller]
fn malformed(message: impl Into<String>) -> MessageError {
    MessageError::tsp(TspErrorCode::MalformedAsn1, message)
}

/// Numbers of the set bits, most significant bit of the first octet being 0
fn set_bits(bytes: &[u8]) -> Vec<u32> {
    bytes
        .iter()
        .enumerate()
        .flat_map(|(i, byte)| {
            (0..8u32)
                .filter(move |bit| byte & (0x80 >> bit) != 0)
                .map(move |bit| i as u32 * 8 + bit)
        })
        .collect()
}

impl PkiMessage for Response {
    fn from_der(der: Vec<u8>) -> Result<Self, MessageError> {
        let parsed = Self::parse(&der).map_err(|e| e.into_message(Protocol::Tsp))?;
        Ok(Self {
            der,
            status: parsed.status,
            status_text: parsed.status_text,
            fail_info: parsed.fail_info,
            tst_info: parsed.tst_info,
        })
    }

    fn der(&self) -> &[u8] {
        &self.der
    }
}

// Token signatures (CMS SignerInfo) are not verified yet; every accessor
// reports Unimplemented.
impl Signable for Response {}

impl HttpTransportable for Response {
    const MIME_TYPE: &'static str = RESPONSE_MIME_TYPE;
}
