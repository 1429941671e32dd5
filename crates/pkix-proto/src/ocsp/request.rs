use tracing::debug;

use super::{CertId, REQUEST_MIME_TYPE};
use crate::asn1::{Node, Selector, Tlv};
use crate::error::{MessageError, OcspErrorCode, ParseFailure, Protocol};
use crate::message::{PkiMessage, SignatureParts, Signable};
use crate::transport::HttpTransportable;

/// A single-certificate OCSP request
#[derive(Debug, Clone)]
pub struct Request {
    der: Vec<u8>,
    cert_id: CertId,
    signature: Option<SignatureParts>,
}

impl Request {
    /// Build and parse a request for `cert_id`
    pub fn create_from_params(cert_id: &CertId) -> Result<Self, MessageError> {
        let der = Node::sequence(vec![Node::sequence(vec![Node::sequence(vec![
            Node::sequence(vec![cert_id.to_node()?]),
        ])])])
        .to_der();
        Self::from_der(der)
    }

    pub fn cert_id(&self) -> &CertId {
        &self.cert_id
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    fn parse(der: &[u8]) -> Result<(CertId, Option<SignatureParts>), ParseFailure> {
        let root = Tlv::parse(der)?;
        root.expect(&Selector::SEQUENCE)?;
        let tbs = root.child(0)?.expect(&Selector::SEQUENCE)?;

        if let Some(version) = tbs.find(&Selector::explicit(0)) {
            let version = version.child(0)?.as_u64()?;
            if version != 0 {
                return Err(MessageError::ocsp(
                    OcspErrorCode::UnsupportedVersion,
                    format!("unsupported request version {}", version),
                )
                .into());
            }
        }

        if let Some(extensions) = tbs.find(&Selector::explicit(2)) {
            reject_critical_extensions(extensions.child(0)?)?;
        }

        let list = tbs.require(&Selector::SEQUENCE)?;
        match list.len() {
            0 => {
                return Err(MessageError::ocsp(OcspErrorCode::ReqListEmpty, "request list is empty").into())
            }
            1 => {}
            n => {
                return Err(MessageError::ocsp(
                    OcspErrorCode::ReqListMulti,
                    format!("request list holds {} entries", n),
                )
                .into())
            }
        }

        let single = list.child(0)?.expect(&Selector::SEQUENCE)?;
        if let Some(extensions) = single.find(&Selector::explicit(0)) {
            reject_critical_extensions(extensions.child(0)?)?;
        }
        let cert_id = CertId::from_tlv(single.child(0)?)?;

        let signature = match root.find(&Selector::explicit(0)) {
            Some(wrapper) => {
                let sig = wrapper.child(0)?.expect(&Selector::SEQUENCE)?;
                Some(SignatureParts::from_fields(
                    tbs,
                    sig.child(0)?,
                    sig.child(1)?,
                    sig.find(&Selector::explicit(0)),
                )?)
            }
            None => None,
        };

        Ok((cert_id, signature))
    }

    fn signature(&self) -> Result<&SignatureParts, MessageError> {
        self.signature
            .as_ref()
            .ok_or_else(|| MessageError::ocsp(OcspErrorCode::SigRequired, "request is not signed"))
    }
}

/// Fail on any extension flagged critical
fn reject_critical_extensions(extensions: &Tlv<'_>) -> Result<(), ParseFailure> {
    for extension in extensions.expect(&Selector::SEQUENCE)?.children() {
        let id = extension.child(0)?.as_oid()?;
        let critical = match extension.find(&Selector::BOOLEAN) {
            Some(flag) => flag.as_bool()?,
            None => false,
        };
        if critical {
            return Err(MessageError::ocsp(
                OcspErrorCode::UnsupportedExtension,
                format!("unsupported critical extension {}", id),
            )
            .into());
        }
        debug!(extension = %id, "Ignoring non-critical extension");
    }
    Ok(())
}

impl PkiMessage for Request {
    fn from_der(der: Vec<u8>) -> Result<Self, MessageError> {
        let (cert_id, signature) = Self::parse(&der).map_err(|e| e.into_message(Protocol::Ocsp))?;
        Ok(Self {
            der,
            cert_id,
            signature,
        })
    }

    fn der(&self) -> &[u8] {
        &self.der
    }
}

/// Requests carry an optional signature; accessors on an unsigned request
/// fail with `SigRequired`.
impl Signable for Request {
    fn signed_data(&self) -> Result<Vec<u8>, MessageError> {
        Ok(self.signature()?.signed_data.clone())
    }

    fn signature_raw(&self) -> Result<Vec<u8>, MessageError> {
        Ok(self.signature()?.value.clone())
    }

    fn signature_algorithm(&self) -> Result<String, MessageError> {
        Ok(self.signature()?.algorithm.clone())
    }

    fn signer_certs(&self) -> Result<Vec<Vec<u8>>, MessageError> {
        Ok(self.signature()?.certs.clone())
    }
}

impl HttpTransportable for Request {
    const MIME_TYPE: &'static str = REQUEST_MIME_TYPE;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use ring::rand::SystemRandom;
    use ring::signature::{Ed25519KeyPair, KeyPair};

    fn cert_id() -> CertId {
        CertId {
            hash_algorithm: oid::SHA1.to_string(),
            issuer_name_hash: "01".repeat(20),
            issuer_key_hash: "02".repeat(20),
            serial_number: "1001".to_string(),
        }
    }

    fn single(extensions: Option<Node>) -> Node {
        let mut children = vec![cert_id().to_node().unwrap()];
        children.extend(extensions.map(|e| Node::explicit(0, e)));
        Node::sequence(children)
    }

    fn extension(critical: Option<bool>) -> Node {
        let mut children = vec![Node::oid("1.3.6.1.5.5.7.48.1.2").unwrap()];
        children.extend(critical.map(Node::boolean));
        children.push(Node::octet_string(&[0x04, 0x02, 0xAA, 0xBB]));
        Node::sequence(vec![Node::sequence(children)])
    }

    fn request(tbs_children: Vec<Node>) -> Vec<u8> {
        Node::sequence(vec![Node::sequence(tbs_children)]).to_der()
    }

    fn code(der: Vec<u8>) -> Option<OcspErrorCode> {
        Request::from_der(der).unwrap_err().ocsp_code()
    }

    #[test]
    fn test_create_from_params() {
        let req = Request::create_from_params(&cert_id()).unwrap();
        assert_eq!(req.cert_id(), &cert_id());
        assert!(!req.is_signed());

        // Re-parsing the bytes yields the same CertID
        let again = Request::from_der(req.der().to_vec()).unwrap();
        assert_eq!(again.cert_id(), &cert_id());
    }

    #[test]
    fn test_explicit_version_zero_accepted() {
        let der = request(vec![
            Node::explicit(0, Node::small_integer(0)),
            Node::sequence(vec![single(None)]),
        ]);
        assert_eq!(Request::from_der(der).unwrap().cert_id(), &cert_id());
    }

    #[test]
    fn test_unsupported_version() {
        let der = request(vec![
            Node::explicit(0, Node::small_integer(1)),
            Node::sequence(vec![single(None)]),
        ]);
        assert_eq!(code(der), Some(OcspErrorCode::UnsupportedVersion));
    }

    #[test]
    fn test_empty_request_list() {
        let der = request(vec![Node::sequence(vec![])]);
        assert_eq!(code(der), Some(OcspErrorCode::ReqListEmpty));
    }

    #[test]
    fn test_multiple_requests() {
        let der = request(vec![Node::sequence(vec![single(None), single(None)])]);
        assert_eq!(code(der), Some(OcspErrorCode::ReqListMulti));
    }

    #[test]
    fn test_critical_request_extension() {
        let der = request(vec![
            Node::sequence(vec![single(None)]),
            Node::explicit(2, extension(Some(true))),
        ]);
        assert_eq!(code(der), Some(OcspErrorCode::UnsupportedExtension));
    }

    #[test]
    fn test_non_critical_extensions_ignored() {
        let der = request(vec![
            Node::sequence(vec![single(Some(extension(Some(false))))]),
            Node::explicit(2, extension(None)),
        ]);
        assert!(Request::from_der(der).is_ok());
    }

    #[test]
    fn test_critical_single_request_extension() {
        let der = request(vec![Node::sequence(vec![single(Some(extension(Some(true))))])]);
        assert_eq!(code(der), Some(OcspErrorCode::UnsupportedExtension));
    }

    #[test]
    fn test_malformed_bytes() {
        assert_eq!(code(vec![0x01, 0x02, 0x03]), Some(OcspErrorCode::MalformedAsn1));
        assert_eq!(code(request(vec![])), Some(OcspErrorCode::MalformedAsn1));
        assert_eq!(code(vec![0x30, 0x00]), Some(OcspErrorCode::MalformedAsn1));
    }

    #[test]
    fn test_unsigned_request_requires_signature() {
        let req = Request::create_from_params(&cert_id()).unwrap();
        let err = req.verify_signature(None).unwrap_err();
        assert_eq!(err.ocsp_code(), Some(OcspErrorCode::SigRequired));
    }

    #[test]
    fn test_signed_request_verifies() {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
        let pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap();
        let signer = crate::x509::tests::build_certificate(5, "CA", "requestor", pair.public_key().as_ref());

        let tbs = Node::sequence(vec![Node::sequence(vec![single(None)])]);
        let sig = pair.sign(&tbs.to_der());
        let der = Node::sequence(vec![
            tbs,
            Node::explicit(
                0,
                Node::sequence(vec![
                    Node::sequence(vec![Node::oid(oid::ED25519).unwrap()]),
                    Node::bit_string(sig.as_ref()),
                    Node::explicit(0, Node::sequence(vec![Node::Primitive {
                        class_bits: 0,
                        tag: 5,
                        content: vec![],
                    }])),
                ]),
            ),
        ])
        .to_der();

        let req = Request::from_der(der).unwrap();
        assert!(req.is_signed());
        assert_eq!(req.signature_algorithm().unwrap(), oid::ED25519);

        // The embedded placeholder is not a certificate; an explicit signer is
        let verified = req.verify_signature(Some(signer.as_slice())).unwrap();
        assert_eq!(verified, vec![signer]);
        assert!(req.verify_signature(None).unwrap().is_empty());
    }
}
