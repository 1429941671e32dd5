//! Time-Stamp Protocol (RFC 3161) request and response decoding
//!
//! ```asn1
//! TimeStampReq ::= SEQUENCE {
//!     version         INTEGER { v1(1) },
//!     messageImprint  MessageImprint,
//!     reqPolicy       TSAPolicyId OPTIONAL,
//!     nonce           INTEGER OPTIONAL,
//!     certReq         BOOLEAN DEFAULT FALSE,
//!     extensions      [0] IMPLICIT Extensions OPTIONAL
//! }
//!
//! TimeStampResp ::= SEQUENCE {
//!     status          PKIStatusInfo,
//!     timeStampToken  TimeStampToken OPTIONAL
//! }
//!
//! TSTInfo ::= SEQUENCE {
//!     version         INTEGER { v1(1) },
//!     policy          TSAPolicyId,
//!     messageImprint  MessageImprint,
//!     serialNumber    INTEGER,
//!     genTime         GeneralizedTime,
//!     accuracy        Accuracy OPTIONAL,
//!     ordering        BOOLEAN DEFAULT FALSE,
//!     nonce           INTEGER OPTIONAL,
//!     tsa             [0] GeneralName OPTIONAL,
//!     extensions      [1] IMPLICIT Extensions OPTIONAL
//! }
//! ```

mod request;
mod response;
mod tst_info;

pub use request::Request;
pub use response::Response;
pub use tst_info::{Accuracy, TstInfo};

pub const REQUEST_MIME_TYPE: &str = "application/timestamp-query";
pub const RESPONSE_MIME_TYPE: &str = "application/timestamp-reply";

/// PKIStatus values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkiStatus {
    Granted = 0,
    GrantedWithMods = 1,
    Rejection = 2,
    Waiting = 3,
    RevocationWarning = 4,
    RevocationNotification = 5,
}

impl PkiStatus {
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::Granted),
            1 => Some(Self::GrantedWithMods),
            2 => Some(Self::Rejection),
            3 => Some(Self::Waiting),
            4 => Some(Self::RevocationWarning),
            5 => Some(Self::RevocationNotification),
            _ => None,
        }
    }

    /// Whether a time-stamp token accompanies this status
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted | Self::GrantedWithMods)
    }
}

/// PKIFailureInfo bits defined for time-stamping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureInfo {
    BadAlg = 0,
    BadRequest = 2,
    BadDataFormat = 5,
    TimeNotAvailable = 14,
    UnacceptedPolicy = 15,
    UnacceptedExtension = 16,
    AddInfoNotAvailable = 17,
    SystemFailure = 25,
}

impl FailureInfo {
    pub fn from_bit(bit: u32) -> Option<Self> {
        match bit {
            0 => Some(Self::BadAlg),
            2 => Some(Self::BadRequest),
            5 => Some(Self::BadDataFormat),
            14 => Some(Self::TimeNotAvailable),
            15 => Some(Self::UnacceptedPolicy),
            16 => Some(Self::UnacceptedExtension),
            17 => Some(Self::AddInfoNotAvailable),
            25 => Some(Self::SystemFailure),
            _ => None,
        }
    }
}
