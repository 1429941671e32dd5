use super::REQUEST_MIME_TYPE;
use crate::asn1::{Node, Selector, Tlv};
use crate::error::{MessageError, ParseFailure, Protocol, TspErrorCode};
use crate::message::PkiMessage;
use crate::transport::HttpTransportable;

/// TimeStampReq
#[derive(Debug, Clone)]
pub struct Request {
    der: Vec<u8>,
    hash_algorithm: String,
    hashed_message: Vec<u8>,
}

impl Request {
    /// Build and parse a v1 request for a precomputed digest
    pub fn create_from_params(hash_algorithm: &str, hashed_message: &[u8]) -> Result<Self, MessageError> {
        let algorithm = Node::algorithm(hash_algorithm)
            .map_err(|e| MessageError::tsp(TspErrorCode::MalformedAsn1, e.to_string()))?;
        let der = Node::sequence(vec![
            Node::small_integer(1),
            Node::sequence(vec![algorithm, Node::octet_string(hashed_message)]),
        ])
        .to_der();
        Self::from_der(der)
    }

    pub fn version(&self) -> u64 {
        1
    }

    /// messageImprint hash algorithm OID
    pub fn hash_algorithm(&self) -> &str {
        &self.hash_algorithm
    }

    pub fn hashed_message(&self) -> &[u8] {
        &self.hashed_message
    }

    fn parse(der: &[u8]) -> Result<(String, Vec<u8>), ParseFailure> {
        let root = Tlv::parse(der)?;
        root.expect(&Selector::SEQUENCE)?;

        let version = root.child(0)?.as_u64()?;
        if version != 1 {
            return Err(MessageError::tsp(
                TspErrorCode::UnsupportedVersion,
                format!("unsupported request version {}", version),
            )
            .into());
        }

        let imprint = root.child(1)?.expect(&Selector::SEQUENCE)?;
        let hash_algorithm = imprint.child(0)?.child(0)?.as_oid()?;
        let hashed_message = imprint.child(1)?.as_octet_string()?.to_vec();
        Ok((hash_algorithm, hashed_message))
    }
}

impl PkiMessage for Request {
    fn from_der(der: Vec<u8>) -> Result<Self, MessageError> {
        let (hash_algorithm, hashed_message) =
            Self::parse(&der).map_err(|e| e.into_message(Protocol::Tsp))?;
        Ok(Self {
            der,
            hash_algorithm,
            hashed_message,
        })
    }

    fn der(&self) -> &[u8] {
        &self.der
    }
}

impl HttpTransportable for Request {
    const MIME_TYPE: &'static str = REQUEST_MIME_TYPE;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    #[test]
    fn test_create_from_params() {
        let digest = [0x11u8; 32];
        let req = Request::create_from_params(oid::SHA256, &digest).unwrap();
        assert_eq!(req.version(), 1);
        assert_eq!(req.hash_algorithm(), oid::SHA256);
        assert_eq!(req.hashed_message(), &digest);

        let again = Request::from_der(req.der().to_vec()).unwrap();
        assert_eq!(again.hashed_message(), &digest);
    }

    #[test]
    fn test_version_two_rejected() {
        let der = Node::sequence(vec![
            Node::small_integer(2),
            Node::sequence(vec![Node::algorithm(oid::SHA1).unwrap(), Node::octet_string(&[1; 20])]),
        ])
        .to_der();
        let err = Request::from_der(der).unwrap_err();
        assert!(matches!(
            err,
            MessageError::Tsp {
                code: TspErrorCode::UnsupportedVersion,
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_request() {
        let err = Request::from_der(vec![0x30, 0x03, 0x02, 0x01, 0x01]).unwrap_err();
        assert!(matches!(
            err,
            MessageError::Tsp {
                code: TspErrorCode::MalformedAsn1,
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_algorithm_param() {
        assert!(Request::create_from_params("sha256", &[0; 32]).is_err());
    }
}
